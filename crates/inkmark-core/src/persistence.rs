//! Persisted stroke records.
//!
//! The stored value is a JSON array of
//! `{tool, points: [{x, y}], color?, lineWidth, opacity}` records under a
//! per-page key. Bounding boxes are never written and ids are not written
//! either; both are rebuilt on load.

use crate::config::ToolSettings;
use crate::storage::{KeyValueStorage, StorageResult};
use crate::stroke::{Rgb, Stroke, StrokeId, Tool, ToolStyle};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding stored annotations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Malformed annotation data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid stroke record: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PointRecord {
    x: f64,
    y: f64,
}

/// Stroke record as written.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StrokeRecord {
    tool: Tool,
    points: Vec<PointRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Rgb>,
    line_width: f64,
    opacity: f64,
}

/// Stroke record as read; every style field may be missing in older data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    tool: String,
    points: Vec<PointRecord>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    line_width: Option<f64>,
    #[serde(default)]
    opacity: Option<f64>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Storage key for a page: `<prefix>_<path>` with every character outside
/// `[A-Za-z0-9_-]` replaced by `_`.
pub fn page_storage_key(prefix: &str, path: &str) -> String {
    let sanitized: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}", prefix, sanitized)
}

/// Serialize strokes to the stored JSON form. Eraser strokes are skipped.
pub fn encode_strokes<'a, I>(strokes: I) -> Result<String, PersistError>
where
    I: IntoIterator<Item = &'a Stroke>,
{
    let records: Vec<StrokeRecord> = strokes
        .into_iter()
        .filter(|stroke| stroke.tool() != Tool::Eraser)
        .map(|stroke| StrokeRecord {
            tool: stroke.tool(),
            points: stroke
                .points()
                .iter()
                .map(|p| PointRecord { x: p.x, y: p.y })
                .collect(),
            color: stroke.color(),
            line_width: stroke.line_width(),
            opacity: stroke.opacity(),
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

/// Parse stored JSON into strokes.
///
/// The top level must be an array, or the whole value is rejected. A record
/// that cannot be turned into a stroke (unknown or eraser tool, no points)
/// is dropped on its own. Missing style fields take the current defaults
/// from `defaults`.
pub fn decode_strokes(json: &str, defaults: &ToolSettings) -> Result<Vec<Stroke>, PersistError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut strokes = Vec::with_capacity(values.len());

    for (i, value) in values.into_iter().enumerate() {
        match decode_record(value, defaults) {
            Ok(stroke) => strokes.push(stroke),
            Err(e) => log::warn!("Dropping stored stroke {}: {}", i, e),
        }
    }

    Ok(strokes)
}

fn decode_record(value: serde_json::Value, defaults: &ToolSettings) -> Result<Stroke, PersistError> {
    let record: StoredRecord = serde_json::from_value(value)?;

    let tool: Tool = record
        .tool
        .parse()
        .map_err(|e| PersistError::InvalidRecord(format!("{}", e)))?;

    let width = record
        .line_width
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or_else(|| defaults.line_width(tool));

    let color = |fallback: Rgb| {
        record
            .color
            .as_deref()
            .and_then(|c| c.parse::<Rgb>().ok())
            .unwrap_or(fallback)
    };

    let style = match tool {
        Tool::Pen => ToolStyle::Pen {
            color: color(defaults.pen_color),
            width,
        },
        Tool::Highlighter => ToolStyle::Highlighter {
            color: color(defaults.highlighter_color),
            width,
            opacity: record
                .opacity
                .filter(|o| (0.0..=1.0).contains(o))
                .unwrap_or(defaults.highlighter_opacity),
        },
        Tool::Eraser => {
            return Err(PersistError::InvalidRecord(
                "eraser strokes are never stored".to_string(),
            ));
        }
    };

    let id = record
        .id
        .as_ref()
        .and_then(|id| id.as_str())
        .and_then(|id| id.parse().ok())
        .map(StrokeId::from_uuid)
        .unwrap_or_default();

    let points = record
        .points
        .into_iter()
        .map(|p| Point::new(p.x, p.y))
        .collect();

    Stroke::from_parts(id, style, points)
        .ok_or_else(|| PersistError::InvalidRecord("stroke has no points".to_string()))
}

/// Load the strokes stored under `key`.
///
/// Never fails: a read error yields no strokes, and unparsable data is
/// removed from storage before returning no strokes.
pub fn load_strokes<S>(storage: &S, key: &str, defaults: &ToolSettings) -> Vec<Stroke>
where
    S: KeyValueStorage + ?Sized,
{
    let json = match storage.get(key) {
        Ok(Some(json)) => json,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::warn!("Failed to read annotations for {}: {}", key, e);
            return Vec::new();
        }
    };

    match decode_strokes(&json, defaults) {
        Ok(strokes) => {
            log::info!("Loaded {} strokes from {}", strokes.len(), key);
            strokes
        }
        Err(e) => {
            log::warn!("Discarding stored annotations for {}: {}", key, e);
            if let Err(e) = storage.remove(key) {
                log::warn!("Failed to clear {}: {}", key, e);
            }
            Vec::new()
        }
    }
}

/// Write `strokes` under `key`.
pub fn save_strokes<'a, S, I>(storage: &S, key: &str, strokes: I) -> StorageResult<()>
where
    S: KeyValueStorage + ?Sized,
    I: IntoIterator<Item = &'a Stroke>,
{
    let json = encode_strokes(strokes)
        .map_err(|e| crate::storage::StorageError::Serialization(e.to_string()))?;
    storage.set(key, &json)
}
