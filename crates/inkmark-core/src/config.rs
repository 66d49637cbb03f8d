//! Annotator configuration and per-tool style settings.

use crate::spatial::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS};
use crate::stroke::{HIGHLIGHTER_OPACITY, Rgb, Tool, ToolStyle};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

/// Allowed pen widths.
pub const PEN_WIDTH_RANGE: RangeInclusive<f64> = 1.0..=20.0;

/// Allowed highlighter widths.
pub const HIGHLIGHTER_WIDTH_RANGE: RangeInclusive<f64> = 5.0..=50.0;

/// Pixels of slider drag per unit of line width.
const DRAG_SENSITIVITY: f64 = 10.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Current color and width for each tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub pen_color: Rgb,
    pub pen_width: f64,
    pub highlighter_color: Rgb,
    pub highlighter_width: f64,
    pub highlighter_opacity: f64,
    pub eraser_width: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            pen_color: Rgb::black(),
            pen_width: 2.0,
            highlighter_color: Rgb::new(0, 255, 0),
            highlighter_width: 20.0,
            highlighter_opacity: HIGHLIGHTER_OPACITY,
            eraser_width: 15.0,
        }
    }
}

impl ToolSettings {
    /// Style a new stroke of `tool` is seeded with.
    pub fn style_for(&self, tool: Tool) -> ToolStyle {
        match tool {
            Tool::Pen => ToolStyle::Pen {
                color: self.pen_color,
                width: self.pen_width,
            },
            Tool::Highlighter => ToolStyle::Highlighter {
                color: self.highlighter_color,
                width: self.highlighter_width,
                opacity: self.highlighter_opacity,
            },
            Tool::Eraser => ToolStyle::Eraser {
                width: self.eraser_width,
            },
        }
    }

    /// Current default width of `tool`.
    pub fn line_width(&self, tool: Tool) -> f64 {
        match tool {
            Tool::Pen => self.pen_width,
            Tool::Highlighter => self.highlighter_width,
            Tool::Eraser => self.eraser_width,
        }
    }

    /// Current color of `tool`, if it has one.
    pub fn color(&self, tool: Tool) -> Option<Rgb> {
        match tool {
            Tool::Pen => Some(self.pen_color),
            Tool::Highlighter => Some(self.highlighter_color),
            Tool::Eraser => None,
        }
    }

    /// Default opacity for a stroke of `tool`.
    pub fn opacity(&self, tool: Tool) -> f64 {
        match tool {
            Tool::Highlighter => self.highlighter_opacity,
            Tool::Pen | Tool::Eraser => 1.0,
        }
    }

    /// Width range accepted for `tool`.
    pub fn width_range(tool: Tool) -> RangeInclusive<f64> {
        match tool {
            Tool::Pen => PEN_WIDTH_RANGE,
            Tool::Highlighter => HIGHLIGHTER_WIDTH_RANGE,
            Tool::Eraser => 1.0..=f64::MAX,
        }
    }

    /// Set a tool's width, clamped to its range. Returns the stored width.
    pub fn set_line_width(&mut self, tool: Tool, width: f64) -> f64 {
        let range = Self::width_range(tool);
        let width = if width.is_finite() {
            width.clamp(*range.start(), *range.end())
        } else {
            self.line_width(tool)
        };
        match tool {
            Tool::Pen => self.pen_width = width,
            Tool::Highlighter => self.highlighter_width = width,
            Tool::Eraser => self.eraser_width = width,
        }
        width
    }

    /// Width for a slider drag of `delta_x` pixels that started at `start_width`.
    pub fn drag_line_width(&mut self, tool: Tool, start_width: f64, delta_x: f64) -> f64 {
        self.set_line_width(tool, (start_width + delta_x / DRAG_SENSITIVITY).round())
    }

    /// Set a tool's color. Ignored for the eraser; returns whether it applied.
    pub fn set_color(&mut self, tool: Tool, color: Rgb) -> bool {
        match tool {
            Tool::Pen => self.pen_color = color,
            Tool::Highlighter => self.highlighter_color = color,
            Tool::Eraser => return false,
        }
        true
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Two-pointer midpoint travel that turns a tap into a pan.
    pub pan_move_threshold: f64,
    /// Maximum duration of a two-finger tap that undoes.
    pub two_finger_tap_timeout_ms: u64,
    /// Douglas-Peucker tolerance for pen strokes, in document pixels.
    pub simplify_tolerance: f64,
    pub quadtree_max_objects: usize,
    pub quadtree_max_depth: usize,
    /// Prefix of the per-page storage key.
    pub storage_key_prefix: String,
    /// Initial tool styles.
    pub tools: ToolSettings,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            pan_move_threshold: 15.0,
            two_finger_tap_timeout_ms: 300,
            simplify_tolerance: 1.0,
            quadtree_max_objects: DEFAULT_MAX_OBJECTS,
            quadtree_max_depth: DEFAULT_MAX_DEPTH,
            storage_key_prefix: "pageAnnotations".to_string(),
            tools: ToolSettings::default(),
        }
    }
}

impl AnnotatorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn two_finger_tap_timeout(&self) -> Duration {
        Duration::from_millis(self.two_finger_tap_timeout_ms)
    }
}
