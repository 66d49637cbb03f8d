//! Stroke model: tools, per-tool styles and the stroke envelope.

use crate::geometry::{bounding_box, simplify};
use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Fixed translucency of highlighter strokes.
pub const HIGHLIGHTER_OPACITY: f64 = 0.4;

/// Unique identifier for strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeId(Uuid);

impl StrokeId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for StrokeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for StrokeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Annotation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Highlighter,
    Eraser,
}

impl Tool {
    /// Stable lowercase name, as used in persisted records.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Pen => "pen",
            Tool::Highlighter => "highlighter",
            Tool::Eraser => "eraser",
        }
    }
}

/// Error for unrecognized tool names or color strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

impl FromStr for Tool {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pen" => Ok(Tool::Pen),
            "highlighter" => Ok(Tool::Highlighter),
            "eraser" => Ok(Tool::Eraser),
            other => Err(ParseError::UnknownTool(other.to_string())),
        }
    }
}

/// Opaque RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Convert to a peniko color with the given alpha.
    pub fn with_alpha(self, alpha: f64) -> Color {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::from_rgba8(self.r, self.g, self.b, a)
    }
}

impl FromStr for Rgb {
    type Err = ParseError;

    /// Parse `#rgb` or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);

        match hex.len() {
            3 => {
                let r = channel(0..1).map_err(|_| invalid())?;
                let g = channel(1..2).map_err(|_| invalid())?;
                let b = channel(2..3).map_err(|_| invalid())?;
                Ok(Rgb::new(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = channel(0..2).map_err(|_| invalid())?;
                let g = channel(2..4).map_err(|_| invalid())?;
                let b = channel(4..6).map_err(|_| invalid())?;
                Ok(Rgb::new(r, g, b))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Color::from_rgb8(color.r, color.g, color.b)
    }
}

/// Tool-specific style payload, fixed when a stroke is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolStyle {
    Pen { color: Rgb, width: f64 },
    Highlighter { color: Rgb, width: f64, opacity: f64 },
    Eraser { width: f64 },
}

impl ToolStyle {
    pub fn tool(&self) -> Tool {
        match self {
            ToolStyle::Pen { .. } => Tool::Pen,
            ToolStyle::Highlighter { .. } => Tool::Highlighter,
            ToolStyle::Eraser { .. } => Tool::Eraser,
        }
    }

    /// Stroke color; erasers have none.
    pub fn color(&self) -> Option<Rgb> {
        match self {
            ToolStyle::Pen { color, .. } | ToolStyle::Highlighter { color, .. } => Some(*color),
            ToolStyle::Eraser { .. } => None,
        }
    }

    pub fn line_width(&self) -> f64 {
        match self {
            ToolStyle::Pen { width, .. }
            | ToolStyle::Highlighter { width, .. }
            | ToolStyle::Eraser { width } => *width,
        }
    }

    pub fn opacity(&self) -> f64 {
        match self {
            ToolStyle::Highlighter { opacity, .. } => *opacity,
            ToolStyle::Pen { .. } | ToolStyle::Eraser { .. } => 1.0,
        }
    }
}

/// A committed or in-progress annotation path in document space.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    id: StrokeId,
    points: Vec<Point>,
    style: ToolStyle,
    /// Cached at commit, never persisted.
    bounds: Option<Rect>,
}

impl Stroke {
    /// Start a new stroke at `start`.
    pub fn begin(style: ToolStyle, start: Point) -> Self {
        Self {
            id: StrokeId::new(),
            points: vec![start],
            style,
            bounds: None,
        }
    }

    /// Rebuild a stroke from stored parts. Returns `None` for an empty point list.
    pub fn from_parts(id: StrokeId, style: ToolStyle, points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let bounds = bounding_box(&points);
        Some(Self {
            id,
            points,
            style,
            bounds,
        })
    }

    pub fn id(&self) -> StrokeId {
        self.id
    }

    pub fn tool(&self) -> Tool {
        self.style.tool()
    }

    pub fn style(&self) -> &ToolStyle {
        &self.style
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn color(&self) -> Option<Rgb> {
        self.style.color()
    }

    pub fn line_width(&self) -> f64 {
        self.style.line_width()
    }

    pub fn opacity(&self) -> f64 {
        self.style.opacity()
    }

    /// Axis-aligned bounds; cached after commit, computed otherwise.
    pub fn bounds(&self) -> Rect {
        self.bounds
            .or_else(|| bounding_box(&self.points))
            .unwrap_or(Rect::ZERO)
    }

    /// Bounds grown by half the line width: the area the stroke paints.
    pub fn ink_bounds(&self) -> Rect {
        let half = self.line_width() / 2.0;
        self.bounds().inflate(half, half)
    }

    /// Append a live point.
    ///
    /// Highlighters keep at most two points: the press point and the
    /// current point, so they always render as a straight band.
    pub fn push_point(&mut self, point: Point) {
        match self.style {
            ToolStyle::Highlighter { .. } => {
                if self.points.len() <= 1 {
                    self.points.push(point);
                } else {
                    self.points[1] = point;
                }
            }
            ToolStyle::Pen { .. } | ToolStyle::Eraser { .. } => self.points.push(point),
        }
    }

    /// Finalize the point list for commit and cache the bounds.
    ///
    /// Returns `false` if the stroke is degenerate (fewer than two points, or
    /// no movement at all) and must be discarded. Eraser strokes are left as
    /// drawn: they are a query shape, not a committed stroke.
    pub fn finalize(&mut self, tolerance: f64) -> bool {
        match self.style {
            ToolStyle::Highlighter { .. } => {
                if let (Some(&first), Some(&last)) = (self.points.first(), self.points.last()) {
                    self.points = vec![first, last];
                }
            }
            ToolStyle::Pen { .. } => self.points = simplify(&self.points, tolerance),
            ToolStyle::Eraser { .. } => {}
        }
        self.bounds = bounding_box(&self.points);
        !self.is_degenerate()
    }

    /// Fewer than two points, or every point in the same place.
    pub fn is_degenerate(&self) -> bool {
        match self.points.split_first() {
            Some((first, rest)) => rest.iter().all(|p| p == first),
            None => true,
        }
    }
}
