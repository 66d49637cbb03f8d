//! Recorded annotation sessions and their headless replay.
//!
//! A session is a JSON document describing a page (viewport and document
//! size) and a timeline of host events: pointer input, toolbar actions,
//! scrolling and layout changes. Replaying drives an [`Annotator`] against a
//! simulated page with vello scene layers, delivering animation frames as a
//! browser would between events.

use inkmark_core::{
    Annotator, AnnotatorConfig, KeyValueStorage, ManualFrames, MouseButton, PointerEvent,
    PointerKind, PointerPhase, RenderPipeline, Rgb, ScrollHost, SimulatedHost, Tool,
};
use inkmark_render::SceneSurface;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid session: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Annotator wired to a simulated page and vello layers.
pub type SceneAnnotator<K> = Annotator<SceneSurface, SimulatedHost, ManualFrames, K>;

/// A recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Page path, used for the storage key.
    pub page: String,
    pub viewport: Size,
    pub document: Size,
    /// Whether annotation mode is on before the first event.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub events: Vec<SessionEvent>,
}

fn default_active() -> bool {
    true
}

impl Session {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// One entry of a session timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Pointer(PointerRecord),
    Mode { active: bool },
    Tool { tool: Tool },
    Color { tool: Tool, color: Rgb },
    Width { tool: Tool, width: f64 },
    ScrollBy { dx: f64, dy: f64 },
    ScrollTo { x: f64, y: f64 },
    ResizeViewport { width: f64, height: f64 },
    ResizeDocument { width: f64, height: f64 },
    Undo,
    /// Clear everything; `confirm` is the user's answer to the prompt.
    Clear {
        #[serde(default = "default_confirm")]
        confirm: bool,
    },
}

fn default_confirm() -> bool {
    true
}

/// A pointer event as recorded from the DOM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointerRecord {
    /// Milliseconds since the start of the recording.
    pub t: u64,
    #[serde(default = "default_pointer_id")]
    pub id: i32,
    #[serde(default)]
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
    /// DOM `button` value for mouse presses.
    #[serde(default)]
    pub button: Option<i16>,
}

fn default_pointer_id() -> i32 {
    1
}

impl From<PointerRecord> for PointerEvent {
    fn from(record: PointerRecord) -> Self {
        let event = PointerEvent::new(
            record.id,
            record.kind,
            record.phase,
            Point::new(record.x, record.y),
            Duration::from_millis(record.t),
        );
        match record.button {
            Some(button) => event.with_button(MouseButton::from_dom(button)),
            None => event,
        }
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub storage_key: String,
    /// Committed strokes at the end of the session.
    pub strokes: usize,
    /// Live-layer frames painted.
    pub frames_painted: usize,
    /// Polylines on the committed layer.
    pub committed_paths: usize,
    pub scroll: Vec2,
    pub document: Size,
}

/// Drives an annotator through session events.
pub struct Replay<K: KeyValueStorage> {
    annotator: SceneAnnotator<K>,
    frames_painted: usize,
}

impl<K: KeyValueStorage> Replay<K> {
    /// Set up the page described by `session` and load its stored strokes.
    pub fn new(session: &Session, config: AnnotatorConfig, storage: K) -> Self {
        let pipeline = RenderPipeline::new(SceneSurface::default(), SceneSurface::default());
        let host = SimulatedHost::new(session.viewport, session.document);
        let mut annotator = Annotator::new(
            config,
            &session.page,
            pipeline,
            host,
            ManualFrames::default(),
            storage,
        );
        annotator.set_mode_active(session.active);

        let mut replay = Self {
            annotator,
            frames_painted: 0,
        };
        replay.deliver_frame();
        replay
    }

    /// Replay a whole session and report the final state.
    pub fn run(session: &Session, config: AnnotatorConfig, storage: K) -> ReplayReport {
        let mut replay = Self::new(session, config, storage);
        for event in &session.events {
            replay.apply(event);
        }
        log::info!(
            "Replayed {} events, {} strokes committed",
            session.events.len(),
            replay.annotator.strokes().len()
        );
        replay.report()
    }

    pub fn annotator(&self) -> &SceneAnnotator<K> {
        &self.annotator
    }

    /// Apply one event, then deliver the frame it scheduled, if any.
    pub fn apply(&mut self, event: &SessionEvent) {
        let annotator = &mut self.annotator;
        match *event {
            SessionEvent::Pointer(record) => annotator.handle_pointer(&record.into()),
            SessionEvent::Mode { active } => annotator.set_mode_active(active),
            SessionEvent::Tool { tool } => annotator.select_tool(tool),
            SessionEvent::Color { tool, color } => {
                if !annotator.set_color(tool, color) {
                    log::warn!("{} has no color", tool.name());
                }
            }
            SessionEvent::Width { tool, width } => {
                annotator.set_line_width(tool, width);
            }
            SessionEvent::ScrollBy { dx, dy } => {
                annotator.host_mut().scroll_by(Vec2::new(dx, dy));
                annotator.on_viewport_tick();
            }
            SessionEvent::ScrollTo { x, y } => {
                annotator.host_mut().scroll_to(Point::new(x, y), false);
                annotator.on_viewport_tick();
            }
            SessionEvent::ResizeViewport { width, height } => {
                annotator.host_mut().set_viewport_size(Size::new(width, height));
                annotator.on_viewport_tick();
            }
            SessionEvent::ResizeDocument { width, height } => {
                annotator.host_mut().set_document_size(Size::new(width, height));
                annotator.on_viewport_tick();
            }
            SessionEvent::Undo => {
                annotator.undo();
            }
            SessionEvent::Clear { confirm } => {
                annotator.clear_all(&mut |_: &str| confirm);
            }
        }
        self.deliver_frame();
    }

    fn deliver_frame(&mut self) {
        if self.annotator.frames_mut().deliver() && self.annotator.on_animation_frame() {
            self.frames_painted += 1;
        }
    }

    pub fn report(&self) -> ReplayReport {
        let metrics = self.annotator.metrics();
        ReplayReport {
            storage_key: self.annotator.storage_key().to_string(),
            strokes: self.annotator.strokes().len(),
            frames_painted: self.frames_painted,
            committed_paths: self.annotator.pipeline().committed().stroke_count(),
            scroll: metrics.scroll,
            document: metrics.document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkmark_core::MemoryStorage;
    use std::rc::Rc;

    const SESSION: &str = r##"{
        "page": "/notes/week-1.html",
        "viewport": { "width": 800, "height": 600 },
        "document": { "width": 800, "height": 4000 },
        "events": [
            { "type": "pointer", "t": 0, "kind": "touch", "phase": "down", "x": 10, "y": 10 },
            { "type": "pointer", "t": 16, "kind": "touch", "phase": "move", "x": 60, "y": 40 },
            { "type": "pointer", "t": 32, "kind": "touch", "phase": "move", "x": 120, "y": 10 },
            { "type": "pointer", "t": 48, "kind": "touch", "phase": "up", "x": 120, "y": 10 },
            { "type": "tool", "tool": "highlighter" },
            { "type": "color", "tool": "highlighter", "color": "#ffcc00" },
            { "type": "scroll_by", "dx": 0, "dy": 500 },
            { "type": "pointer", "t": 500, "phase": "down", "x": 100, "y": 100, "button": 0 },
            { "type": "pointer", "t": 520, "phase": "move", "x": 300, "y": 104 },
            { "type": "pointer", "t": 540, "phase": "up", "x": 300, "y": 104 }
        ]
    }"##;

    #[test]
    fn test_parse_session() {
        let session = Session::from_json(SESSION).unwrap();
        assert_eq!(session.page, "/notes/week-1.html");
        assert!(session.active);
        assert_eq!(session.events.len(), 10);
        assert!(matches!(
            session.events[4],
            SessionEvent::Tool { tool: Tool::Highlighter }
        ));
    }

    #[test]
    fn test_clear_confirms_by_default() {
        let event: SessionEvent = serde_json::from_str(r#"{"type": "clear"}"#).unwrap();
        assert!(matches!(event, SessionEvent::Clear { confirm: true }));

        let event: SessionEvent =
            serde_json::from_str(r#"{"type": "clear", "confirm": false}"#).unwrap();
        assert!(matches!(event, SessionEvent::Clear { confirm: false }));
    }

    #[test]
    fn test_pointer_record_conversion() {
        let record = PointerRecord {
            t: 250,
            id: 3,
            kind: PointerKind::Mouse,
            phase: PointerPhase::Down,
            x: 1.0,
            y: 2.0,
            button: Some(2),
        };
        let event: PointerEvent = record.into();
        assert_eq!(event.timestamp, Duration::from_millis(250));
        assert_eq!(event.button, Some(MouseButton::Right));
        assert!(event.is_secondary_press());
    }

    #[test]
    fn test_replay_commits_and_persists() {
        let storage = Rc::new(MemoryStorage::new());
        let session = Session::from_json(SESSION).unwrap();
        let report = Replay::run(&session, AnnotatorConfig::default(), storage.clone());

        assert_eq!(report.storage_key, "pageAnnotations__notes_week-1_html");
        assert_eq!(report.strokes, 2);
        assert_eq!(report.committed_paths, 2);
        assert_eq!(report.scroll, Vec2::new(0.0, 500.0));
        assert!(report.frames_painted > 0);

        let stored = storage.get(&report.storage_key).unwrap().unwrap();
        assert!(stored.contains("\"highlighter\""));
        assert!(stored.contains("#ffcc00"));

        // Highlighter points land in document space
        let replay = Replay::new(&session, AnnotatorConfig::default(), storage);
        let highlight = &replay.annotator().strokes()[1];
        assert_eq!(highlight.points()[0], Point::new(100.0, 600.0));
    }

    #[test]
    fn test_inactive_session_ignores_pointers() {
        let mut session = Session::from_json(SESSION).unwrap();
        session.active = false;
        let report = Replay::run(&session, AnnotatorConfig::default(), MemoryStorage::new());
        assert_eq!(report.strokes, 0);
    }

    #[test]
    fn test_clear_respects_answer() {
        let storage = Rc::new(MemoryStorage::new());
        let mut session = Session::from_json(SESSION).unwrap();
        session.events.push(SessionEvent::Clear { confirm: false });
        assert_eq!(
            Replay::run(&session, AnnotatorConfig::default(), storage.clone()).strokes,
            2
        );

        let mut session = Session::from_json(SESSION).unwrap();
        session.events = vec![SessionEvent::Clear { confirm: true }];
        let report = Replay::run(&session, AnnotatorConfig::default(), storage.clone());
        assert_eq!(report.strokes, 0);
        assert!(storage.get(&report.storage_key).unwrap().is_none());
    }

    #[test]
    fn test_document_growth_in_session() {
        let mut session = Session::from_json(SESSION).unwrap();
        session.events.push(SessionEvent::ResizeDocument {
            width: 800.0,
            height: 9000.0,
        });
        let report = Replay::run(&session, AnnotatorConfig::default(), MemoryStorage::new());
        assert_eq!(report.document, Size::new(800.0, 9000.0));
        assert_eq!(report.committed_paths, 2);
    }
}
