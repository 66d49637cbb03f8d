//! Pointer input events for mouse, touch and pen.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Host-assigned pointer identifier, unique while the pointer is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointerId(pub i32);

/// Device that produced a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
    Pen,
}

impl FromStr for PointerKind {
    type Err = UnknownPointerKind;

    /// Parse a DOM `pointerType` string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mouse" => Ok(PointerKind::Mouse),
            "touch" => Ok(PointerKind::Touch),
            "pen" => Ok(PointerKind::Pen),
            other => Err(UnknownPointerKind(other.to_string())),
        }
    }
}

/// Error for unrecognized pointer type strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown pointer type: {0}")]
pub struct UnknownPointerKind(pub String);

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

impl MouseButton {
    /// Map a DOM `button` value; negative means "no button".
    pub fn from_dom(button: i16) -> Option<Self> {
        match button {
            0 => Some(MouseButton::Left),
            1 => Some(MouseButton::Middle),
            2 => Some(MouseButton::Right),
            b if b > 2 => Some(MouseButton::Other(b as u16)),
            _ => None,
        }
    }
}

/// Lifecycle phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// The host took the pointer away (e.g. a system gesture).
    Cancel,
    /// The pointer left the overlay.
    Leave,
}

/// A single pointer event in client (viewport) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: PointerId,
    pub kind: PointerKind,
    pub phase: PointerPhase,
    /// Position relative to the viewport's top-left corner.
    pub position: Point,
    /// Button that changed state, for down/up of a mouse.
    pub button: Option<MouseButton>,
    /// Host timestamp since an arbitrary origin.
    pub timestamp: Duration,
}

impl PointerEvent {
    pub fn new(id: i32, kind: PointerKind, phase: PointerPhase, position: Point, timestamp: Duration) -> Self {
        Self {
            id: PointerId(id),
            kind,
            phase,
            position,
            button: (kind == PointerKind::Mouse && phase == PointerPhase::Down)
                .then_some(MouseButton::Left),
            timestamp,
        }
    }

    /// Touch event shorthand.
    pub fn touch(id: i32, phase: PointerPhase, x: f64, y: f64, millis: u64) -> Self {
        Self::new(id, PointerKind::Touch, phase, Point::new(x, y), Duration::from_millis(millis))
    }

    /// Mouse event shorthand, pressing the left button on down.
    pub fn mouse(phase: PointerPhase, x: f64, y: f64, millis: u64) -> Self {
        Self::new(1, PointerKind::Mouse, phase, Point::new(x, y), Duration::from_millis(millis))
    }

    pub fn with_button(mut self, button: Option<MouseButton>) -> Self {
        self.button = button;
        self
    }

    /// A mouse press with anything but the primary button.
    pub fn is_secondary_press(&self) -> bool {
        self.kind == PointerKind::Mouse
            && self.phase == PointerPhase::Down
            && !matches!(self.button, None | Some(MouseButton::Left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_kind_from_dom() {
        assert_eq!("touch".parse::<PointerKind>(), Ok(PointerKind::Touch));
        assert_eq!("pen".parse::<PointerKind>(), Ok(PointerKind::Pen));
        assert!("stylus".parse::<PointerKind>().is_err());
    }

    #[test]
    fn test_mouse_button_from_dom() {
        assert_eq!(MouseButton::from_dom(0), Some(MouseButton::Left));
        assert_eq!(MouseButton::from_dom(2), Some(MouseButton::Right));
        assert_eq!(MouseButton::from_dom(4), Some(MouseButton::Other(4)));
        assert_eq!(MouseButton::from_dom(-1), None);
    }

    #[test]
    fn test_secondary_press() {
        let left = PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0, 0);
        assert!(!left.is_secondary_press());
        assert!(left.with_button(Some(MouseButton::Right)).is_secondary_press());

        let touch = PointerEvent::touch(3, PointerPhase::Down, 0.0, 0.0, 0);
        assert!(!touch.with_button(Some(MouseButton::Right)).is_secondary_press());
    }
}
