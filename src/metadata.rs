use crate::config::ScanConfig;
use crate::error::{TidyError, TidyResult};
use crate::utils;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use walkdir::WalkDir;

/// Author substituted for naming when the sidecar lists none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRef {
    pub name: String,
    /// Kept as text; may be fractional ("1.5") or non-numeric
    pub sequence: Option<String>,
}

/// One item's metadata as read from its sidecar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub series: Option<SeriesRef>,
    /// Seconds
    pub duration: f64,
    /// Bytes across the item's media files
    pub size: u64,
}

impl ItemMetadata {
    /// Read the sidecar inside `dir`
    pub fn from_dir(dir: &Path, scan: &ScanConfig) -> TidyResult<Self> {
        let sidecar = dir.join(&scan.sidecar_name);
        if !sidecar.is_file() {
            return Err(TidyError::MissingMetadata {
                path: dir.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(&sidecar)
            .map_err(|e| TidyError::malformed(&sidecar, "<document>", e.to_string()))?;

        let (mut meta, size) = Self::parse(&text, &sidecar)?;
        meta.size = match size {
            Some(size) => size,
            None => media_size(dir, scan),
        };
        Ok(meta)
    }

    /// Parse sidecar JSON. The size is returned separately since it falls back
    /// to measuring files on disk.
    pub fn parse(text: &str, path: &Path) -> TidyResult<(Self, Option<u64>)> {
        let json: Value = serde_json::from_str(text)
            .map_err(|e| TidyError::malformed(path, "<document>", e.to_string()))?;
        let obj = json
            .as_object()
            .ok_or_else(|| TidyError::malformed(path, "<document>", "expected a JSON object"))?;

        let title = match obj.get("title") {
            None | Some(Value::Null) => {
                return Err(TidyError::malformed(path, "title", "missing"));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(TidyError::malformed(path, "title", "empty"));
            }
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => return Err(TidyError::malformed(path, "title", "expected a string")),
        };

        let authors = string_list(obj, "authors", path)?;
        let narrators = string_list(obj, "narrators", path)?;
        let series = parse_series(obj.get("series"), path)?;

        let duration = match obj.get("duration") {
            None | Some(Value::Null) => chapters_end(obj, path)?,
            Some(v) => match v.as_f64() {
                Some(d) if d.is_finite() && d >= 0.0 => d,
                _ => {
                    return Err(TidyError::malformed(
                        path,
                        "duration",
                        "expected a non-negative number",
                    ))
                }
            },
        };

        let size = match obj.get("size") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| {
                TidyError::malformed(path, "size", "expected a non-negative integer")
            })?),
        };

        Ok((
            ItemMetadata {
                title,
                authors,
                narrators,
                series,
                duration,
                size: size.unwrap_or(0),
            },
            size,
        ))
    }

    /// First listed author, or "Unknown"
    pub fn primary_author(&self) -> &str {
        self.authors
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn is_standalone(&self) -> bool {
        self.series.is_none()
    }
}

fn string_list(obj: &Map<String, Value>, field: &str, path: &Path) -> TidyResult<Vec<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) if s.trim().is_empty() => {}
                    Value::String(s) => out.push(s.trim().to_string()),
                    _ => {
                        return Err(TidyError::malformed(
                            path,
                            &format!("{}[{}]", field, idx),
                            "expected a string",
                        ))
                    }
                }
            }
            Ok(out)
        }
        Some(_) => Err(TidyError::malformed(path, field, "expected an array of strings")),
    }
}

/// Accepts `"Name #2"`, `{"name": .., "sequence": ..}` or an array of those
/// (first entry wins)
fn parse_series(value: Option<&Value>, path: &Path) -> TidyResult<Option<SeriesRef>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => match items.iter().find(|v| !v.is_null()) {
            Some(first) => first,
            None => return Ok(None),
        },
        Some(v) => v,
    };

    match value {
        Value::String(s) => Ok(series_from_text(s)),
        Value::Object(obj) => {
            let name = match obj.get("name") {
                Some(Value::String(s)) => s.trim().to_string(),
                _ => return Err(TidyError::malformed(path, "series.name", "expected a string")),
            };
            if name.is_empty() {
                return Ok(None);
            }
            let sequence = match obj.get("sequence") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(number_text(n)),
                Some(_) => {
                    return Err(TidyError::malformed(
                        path,
                        "series.sequence",
                        "expected a string or number",
                    ))
                }
            };
            Ok(Some(SeriesRef { name, sequence }))
        }
        _ => Err(TidyError::malformed(
            path,
            "series",
            "expected a string, object or array",
        )),
    }
}

fn series_from_text(text: &str) -> Option<SeriesRef> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.rsplit_once('#') {
        Some((name, seq)) if !name.trim().is_empty() => {
            let seq = seq.trim();
            Some(SeriesRef {
                name: name.trim().to_string(),
                sequence: (!seq.is_empty()).then(|| seq.to_string()),
            })
        }
        _ => Some(SeriesRef {
            name: text.to_string(),
            sequence: None,
        }),
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_u64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Largest chapter end, used when the sidecar has no duration
fn chapters_end(obj: &Map<String, Value>, path: &Path) -> TidyResult<f64> {
    let chapters = match obj.get("chapters") {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(TidyError::malformed(path, "chapters", "expected an array")),
    };

    let mut end = 0.0_f64;
    for (idx, chapter) in chapters.iter().enumerate() {
        match chapter.get("end").and_then(Value::as_f64) {
            Some(e) if e.is_finite() && e >= 0.0 => end = end.max(e),
            _ => {
                return Err(TidyError::malformed(
                    path,
                    &format!("chapters[{}].end", idx),
                    "expected a non-negative number",
                ))
            }
        }
    }
    Ok(end)
}

/// Total bytes of media files under `dir`, leaving out nested items
pub fn media_size(dir: &Path, scan: &ScanConfig) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !utils::has_sidecar(e.path(), &scan.sidecar_name)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| utils::is_media_file(e.path(), &scan.media_extensions))
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
