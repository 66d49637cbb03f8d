//! Gesture recognition: single-pointer drawing versus two-pointer pan and undo.
//!
//! The machine owns the pointer map and the in-progress stroke. It never
//! touches the store, the viewport or the renderer directly; instead each
//! event yields a list of [`GestureIntent`]s for the caller to apply, in
//! order.
//!
//! ```text
//!            1st down                 up (0 left)
//!   Idle ─────────────► Drawing ─────────────────► Idle  (commit)
//!    │                     │
//!    │ 2nd down            │ 2nd down (stroke discarded)
//!    ▼                     ▼
//!   MultiTouchStart ◄──────┘
//!    │  midpoint moved > threshold          up before timeout
//!    ├──────────────────────► Panning      ───────────────────► Idle (undo once)
//!    │                          │ up
//!    │                          └────────► Idle
//! ```

use crate::input::{PointerEvent, PointerId, PointerPhase};
use crate::stroke::{Stroke, ToolStyle};
use kurbo::{Point, Vec2};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pointers beyond this count are ignored.
const MAX_TRACKED_POINTERS: usize = 2;

/// Externally visible gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Drawing,
    MultiTouchStart,
    Panning,
}

/// Effect requested by the gesture machine.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureIntent {
    /// The live stroke changed; repaint the live layer on the next frame.
    RequestRender,
    /// Drop any pending live-layer frame.
    CancelRender,
    /// A drawing gesture finished with this stroke.
    Commit(Stroke),
    /// Remove the most recent stroke.
    Undo,
    /// Scroll the document by this many pixels.
    ScrollBy(Vec2),
}

/// Per-event inputs the machine does not own.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext {
    /// Current scroll offset, to map client positions into document space.
    pub scroll_offset: Vec2,
    /// Style a stroke started by this event is seeded with.
    pub style: ToolStyle,
}

impl GestureContext {
    /// Map a viewport-local position into document coordinates.
    pub fn to_document(&self, position: Point) -> Point {
        position + self.scroll_offset
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Drawing {
        pointer: PointerId,
        stroke: Stroke,
    },
    MultiTouchStart {
        started_at: Duration,
        initial_mid: Point,
    },
    Panning {
        last_mid: Point,
    },
}

/// Pointer gesture state machine.
#[derive(Debug, Clone)]
pub struct GestureMachine {
    phase: Phase,
    /// Last known client position of each tracked pointer.
    pointers: BTreeMap<PointerId, Point>,
    /// Set once a two-finger tap has undone during the current sequence.
    undo_fired: bool,
    pan_threshold: f64,
    tap_timeout: Duration,
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new(15.0, Duration::from_millis(300))
    }
}

impl GestureMachine {
    /// Create a machine with a pan distance threshold and a two-finger tap timeout.
    pub fn new(pan_threshold: f64, tap_timeout: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            pointers: BTreeMap::new(),
            undo_fired: false,
            pan_threshold,
            tap_timeout,
        }
    }

    pub fn state(&self) -> GestureState {
        match self.phase {
            Phase::Idle => GestureState::Idle,
            Phase::Drawing { .. } => GestureState::Drawing,
            Phase::MultiTouchStart { .. } => GestureState::MultiTouchStart,
            Phase::Panning { .. } => GestureState::Panning,
        }
    }

    /// The stroke being drawn, if any.
    pub fn live_stroke(&self) -> Option<&Stroke> {
        match &self.phase {
            Phase::Drawing { stroke, .. } => Some(stroke),
            _ => None,
        }
    }

    /// Number of pointers currently tracked.
    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    /// Drop all tracking and any live stroke.
    pub fn reset(&mut self) -> Option<Stroke> {
        self.pointers.clear();
        self.undo_fired = false;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Drawing { stroke, .. } => Some(stroke),
            _ => None,
        }
    }

    /// Feed one pointer event.
    pub fn handle(&mut self, event: &PointerEvent, ctx: &GestureContext) -> Vec<GestureIntent> {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event, ctx),
            PointerPhase::Move => self.pointer_move(event, ctx),
            PointerPhase::Up | PointerPhase::Cancel | PointerPhase::Leave => self.pointer_up(event),
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, ctx: &GestureContext) -> Vec<GestureIntent> {
        if event.is_secondary_press()
            || self.pointers.contains_key(&event.id)
            || self.pointers.len() >= MAX_TRACKED_POINTERS
        {
            return Vec::new();
        }

        if self.pointers.is_empty() {
            self.undo_fired = false;
        }
        self.pointers.insert(event.id, event.position);

        match self.pointers.len() {
            1 => {
                if !matches!(self.phase, Phase::Idle) {
                    return Vec::new();
                }
                let start = ctx.to_document(event.position);
                log::debug!("Gesture: idle -> drawing ({})", ctx.style.tool().name());
                self.phase = Phase::Drawing {
                    pointer: event.id,
                    stroke: Stroke::begin(ctx.style, start),
                };
                vec![GestureIntent::RequestRender]
            }
            _ => {
                let mut intents = Vec::new();
                match self.phase {
                    Phase::Idle => {}
                    Phase::Drawing { .. } => {
                        log::debug!("Gesture: discarding live stroke for multi-touch");
                        intents.push(GestureIntent::CancelRender);
                        intents.push(GestureIntent::RequestRender);
                    }
                    Phase::MultiTouchStart { .. } | Phase::Panning { .. } => return intents,
                }

                log::debug!("Gesture: -> multi-touch-start");
                self.phase = Phase::MultiTouchStart {
                    started_at: event.timestamp,
                    initial_mid: self.midpoint(),
                };
                intents
            }
        }
    }

    fn pointer_move(&mut self, event: &PointerEvent, ctx: &GestureContext) -> Vec<GestureIntent> {
        let Some(position) = self.pointers.get_mut(&event.id) else {
            return Vec::new();
        };
        *position = event.position;

        let mid = self.midpoint();
        let two_pointers = self.pointers.len() == MAX_TRACKED_POINTERS;

        match &mut self.phase {
            Phase::Drawing { pointer, stroke } if *pointer == event.id => {
                stroke.push_point(ctx.to_document(event.position));
                vec![GestureIntent::RequestRender]
            }
            Phase::MultiTouchStart { initial_mid, .. } if two_pointers => {
                let moved = mid - *initial_mid;
                if moved.hypot() <= self.pan_threshold {
                    return Vec::new();
                }
                log::debug!("Gesture: multi-touch-start -> panning");
                self.phase = Phase::Panning { last_mid: mid };
                vec![GestureIntent::ScrollBy(-moved)]
            }
            Phase::Panning { last_mid } if two_pointers => {
                let delta = mid - *last_mid;
                *last_mid = mid;
                if delta == Vec2::ZERO {
                    Vec::new()
                } else {
                    vec![GestureIntent::ScrollBy(-delta)]
                }
            }
            _ => Vec::new(),
        }
    }

    fn pointer_up(&mut self, event: &PointerEvent) -> Vec<GestureIntent> {
        if self.pointers.remove(&event.id).is_none() {
            return Vec::new();
        }
        let remaining = self.pointers.len();
        let mut intents = Vec::new();

        match &self.phase {
            Phase::Idle => {}
            Phase::Drawing { pointer, .. } => {
                if *pointer == event.id && remaining == 0 {
                    if let Phase::Drawing { stroke, .. } =
                        std::mem::replace(&mut self.phase, Phase::Idle)
                    {
                        log::debug!("Gesture: drawing -> idle (commit)");
                        intents.push(GestureIntent::CancelRender);
                        intents.push(GestureIntent::Commit(stroke));
                    }
                }
            }
            Phase::MultiTouchStart { started_at, .. } => {
                let elapsed = event.timestamp.saturating_sub(*started_at);
                if elapsed < self.tap_timeout && !self.undo_fired {
                    log::debug!("Gesture: two-finger tap -> undo");
                    self.undo_fired = true;
                    intents.push(GestureIntent::Undo);
                }
                if remaining < MAX_TRACKED_POINTERS {
                    self.phase = Phase::Idle;
                }
            }
            Phase::Panning { .. } => {
                if remaining < MAX_TRACKED_POINTERS {
                    log::debug!("Gesture: panning -> idle");
                    self.phase = Phase::Idle;
                }
            }
        }

        if remaining == 0 {
            if let Phase::Drawing { .. } = self.phase {
                intents.push(GestureIntent::CancelRender);
            }
            self.phase = Phase::Idle;
            self.pointers.clear();
        }

        intents
    }

    /// Midpoint of the tracked pointers.
    fn midpoint(&self) -> Point {
        let mut positions = self.pointers.values();
        match (positions.next(), positions.next()) {
            (Some(a), Some(b)) => a.midpoint(*b),
            (Some(a), None) => *a,
            _ => Point::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MouseButton, PointerEvent, PointerPhase::*};
    use crate::stroke::{HIGHLIGHTER_OPACITY, Rgb, Tool};

    fn ctx() -> GestureContext {
        GestureContext {
            scroll_offset: Vec2::ZERO,
            style: ToolStyle::Pen {
                color: Rgb::black(),
                width: 2.0,
            },
        }
    }

    fn touch(id: i32, phase: PointerPhase, x: f64, y: f64, t: u64) -> PointerEvent {
        PointerEvent::touch(id, phase, x, y, t)
    }

    fn run(machine: &mut GestureMachine, events: &[PointerEvent]) -> Vec<GestureIntent> {
        events
            .iter()
            .flat_map(|event| machine.handle(event, &ctx()))
            .collect()
    }

    fn undos(intents: &[GestureIntent]) -> usize {
        intents.iter().filter(|i| **i == GestureIntent::Undo).count()
    }

    fn scrolled(intents: &[GestureIntent]) -> Vec2 {
        intents
            .iter()
            .filter_map(|i| match i {
                GestureIntent::ScrollBy(delta) => Some(*delta),
                _ => None,
            })
            .fold(Vec2::ZERO, |acc, d| acc + d)
    }

    #[test]
    fn test_draw_and_commit() {
        let mut machine = GestureMachine::default();
        let scrolled_ctx = GestureContext {
            scroll_offset: Vec2::new(0.0, 500.0),
            ..ctx()
        };

        machine.handle(&touch(1, Down, 10.0, 10.0, 0), &scrolled_ctx);
        assert_eq!(machine.state(), GestureState::Drawing);
        machine.handle(&touch(1, Move, 20.0, 15.0, 16), &scrolled_ctx);

        let intents = machine.handle(&touch(1, Up, 20.0, 15.0, 32), &scrolled_ctx);
        assert_eq!(machine.state(), GestureState::Idle);

        let Some(GestureIntent::Commit(stroke)) = intents.last() else {
            panic!("expected a commit, got {intents:?}");
        };
        assert_eq!(
            stroke.points(),
            &[Point::new(10.0, 510.0), Point::new(20.0, 515.0)]
        );
        assert!(intents.contains(&GestureIntent::CancelRender));
    }

    #[test]
    fn test_highlighter_live_stroke_has_two_points() {
        let mut machine = GestureMachine::default();
        let highlighter = GestureContext {
            scroll_offset: Vec2::ZERO,
            style: ToolStyle::Highlighter {
                color: Rgb::new(0, 255, 0),
                width: 20.0,
                opacity: HIGHLIGHTER_OPACITY,
            },
        };

        machine.handle(&touch(1, Down, 0.0, 0.0, 0), &highlighter);
        for i in 1..10 {
            machine.handle(&touch(1, Move, i as f64 * 3.0, i as f64, i * 16), &highlighter);
        }

        let stroke = machine.live_stroke().unwrap();
        assert_eq!(stroke.tool(), Tool::Highlighter);
        assert_eq!(stroke.points(), &[Point::new(0.0, 0.0), Point::new(27.0, 9.0)]);
    }

    #[test]
    fn test_second_pointer_discards_stroke() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 0.0, 0.0, 0),
                touch(1, Move, 5.0, 5.0, 10),
                touch(2, Down, 100.0, 0.0, 20),
            ],
        );

        assert_eq!(machine.state(), GestureState::MultiTouchStart);
        assert!(machine.live_stroke().is_none());
        assert!(intents.contains(&GestureIntent::CancelRender));
        assert!(!intents.iter().any(|i| matches!(i, GestureIntent::Commit(_))));
    }

    #[test]
    fn test_two_finger_tap_undoes_once() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 100.0, 100.0, 1000),
                touch(2, Down, 200.0, 100.0, 1005),
                touch(1, Move, 104.0, 102.0, 1050),
                touch(2, Move, 205.0, 103.0, 1060),
                touch(1, Up, 104.0, 102.0, 1100),
                touch(2, Up, 205.0, 103.0, 1102),
            ],
        );

        assert_eq!(undos(&intents), 1);
        assert_eq!(scrolled(&intents), Vec2::ZERO);
        assert_eq!(machine.state(), GestureState::Idle);
        assert_eq!(machine.active_pointers(), 0);
    }

    #[test]
    fn test_slow_two_finger_tap_does_not_undo() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 100.0, 100.0, 0),
                touch(2, Down, 200.0, 100.0, 0),
                touch(1, Up, 100.0, 100.0, 300),
                touch(2, Up, 200.0, 100.0, 301),
            ],
        );
        assert_eq!(undos(&intents), 0);
    }

    #[test]
    fn test_pan_scrolls_accumulated_delta() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 100.0, 300.0, 0),
                touch(2, Down, 200.0, 300.0, 10),
                touch(1, Move, 100.0, 290.0, 30),
                touch(2, Move, 200.0, 290.0, 40),
                touch(1, Move, 100.0, 280.0, 60),
                touch(2, Move, 200.0, 280.0, 70),
                touch(1, Up, 100.0, 280.0, 100),
                touch(2, Up, 200.0, 280.0, 110),
            ],
        );

        assert_eq!(undos(&intents), 0);
        // Midpoint moved up 20px; the page scrolls down by the same amount
        assert_eq!(scrolled(&intents), Vec2::new(0.0, 20.0));
    }

    #[test]
    fn test_pan_threshold_is_exclusive() {
        let mut machine = GestureMachine::default();
        run(
            &mut machine,
            &[
                touch(1, Down, 0.0, 0.0, 0),
                touch(2, Down, 0.0, 100.0, 0),
                touch(1, Move, 0.0, 30.0, 10),
            ],
        );
        // Midpoint moved exactly 15px
        assert_eq!(machine.state(), GestureState::MultiTouchStart);

        machine.handle(&touch(1, Move, 0.0, 31.0, 20), &ctx());
        assert_eq!(machine.state(), GestureState::Panning);
    }

    #[test]
    fn test_third_pointer_ignored() {
        let mut machine = GestureMachine::default();
        run(
            &mut machine,
            &[touch(1, Down, 0.0, 0.0, 0), touch(2, Down, 100.0, 0.0, 5)],
        );
        let intents = run(
            &mut machine,
            &[
                touch(3, Down, 50.0, 50.0, 10),
                touch(3, Move, 500.0, 500.0, 20),
                touch(3, Up, 500.0, 500.0, 30),
            ],
        );

        assert_eq!(machine.active_pointers(), 2);
        assert_eq!(machine.state(), GestureState::MultiTouchStart);
        assert!(intents.is_empty());
    }

    #[test]
    fn test_retouch_in_same_sequence_does_not_undo_twice() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 0.0, 0.0, 0),
                touch(2, Down, 100.0, 0.0, 10),
                touch(2, Up, 100.0, 0.0, 50),
                touch(3, Down, 100.0, 0.0, 80),
                touch(3, Up, 100.0, 0.0, 120),
                touch(1, Up, 0.0, 0.0, 130),
            ],
        );
        assert_eq!(undos(&intents), 1);

        // A fresh sequence may undo again
        let intents = run(
            &mut machine,
            &[
                touch(4, Down, 0.0, 0.0, 500),
                touch(5, Down, 100.0, 0.0, 510),
                touch(4, Up, 0.0, 0.0, 550),
                touch(5, Up, 100.0, 0.0, 560),
            ],
        );
        assert_eq!(undos(&intents), 1);
    }

    #[test]
    fn test_remaining_pointer_does_not_draw() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 0.0, 0.0, 0),
                touch(2, Down, 100.0, 0.0, 10),
                touch(2, Up, 100.0, 0.0, 400),
                touch(1, Move, 50.0, 50.0, 420),
                touch(1, Up, 50.0, 50.0, 440),
            ],
        );
        assert_eq!(machine.state(), GestureState::Idle);
        assert!(!intents.iter().any(|i| matches!(i, GestureIntent::Commit(_))));
    }

    #[test]
    fn test_mouse_secondary_button_ignored() {
        let mut machine = GestureMachine::default();
        let right = PointerEvent::mouse(Down, 10.0, 10.0, 0).with_button(Some(MouseButton::Right));
        assert!(machine.handle(&right, &ctx()).is_empty());
        assert_eq!(machine.state(), GestureState::Idle);

        // Hover moves without a press are ignored as well
        assert!(machine.handle(&PointerEvent::mouse(Move, 20.0, 20.0, 5), &ctx()).is_empty());
    }

    #[test]
    fn test_mouse_leave_commits() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                PointerEvent::mouse(Down, 10.0, 10.0, 0),
                PointerEvent::mouse(Move, 40.0, 10.0, 16),
                PointerEvent::mouse(Leave, 40.0, 10.0, 20),
            ],
        );
        assert!(matches!(intents.last(), Some(GestureIntent::Commit(_))));
        assert_eq!(machine.state(), GestureState::Idle);
    }

    #[test]
    fn test_cancel_commits_like_up() {
        let mut machine = GestureMachine::default();
        let intents = run(
            &mut machine,
            &[
                touch(1, Down, 10.0, 10.0, 0),
                touch(1, Move, 40.0, 10.0, 16),
                touch(1, Cancel, 40.0, 10.0, 20),
            ],
        );
        assert!(matches!(intents.last(), Some(GestureIntent::Commit(_))));
    }

    #[test]
    fn test_reset_returns_live_stroke() {
        let mut machine = GestureMachine::default();
        machine.handle(&touch(1, Down, 10.0, 10.0, 0), &ctx());
        assert!(machine.reset().is_some());
        assert_eq!(machine.state(), GestureState::Idle);
        assert_eq!(machine.active_pointers(), 0);
        assert!(machine.reset().is_none());
    }
}
