//! Locating the row array inside an arbitrarily shaped JSON document.
//!
//! Supports:
//! - `a.b.c` (dot notation)
//! - `a.b[0].c` (bracket index, rewritten to `a.b.0.c`)
//! - `.a.b` (one leading dot is ignored)
//!
//! Does NOT support wildcards, filters, slices or recursive descent. An
//! absent path is a normal outcome (`None`), never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conventional locations tried when no explicit array path is configured.
pub const DEFAULT_CANDIDATES: [&str; 3] = ["items", "data", "results"];

/// Configured array location: one path, or an ordered list of fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayPath {
    Single(String),
    Candidates(Vec<String>),
}

impl ArrayPath {
    /// Candidates in caller order. First match wins.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            ArrayPath::Single(path) => vec![path.as_str()],
            ArrayPath::Candidates(paths) => paths.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ArrayPath::Single(path) => path.is_empty(),
            ArrayPath::Candidates(paths) => paths.is_empty(),
        }
    }
}

impl From<&str> for ArrayPath {
    fn from(path: &str) -> Self {
        ArrayPath::Single(path.to_string())
    }
}

impl From<Vec<String>> for ArrayPath {
    fn from(paths: Vec<String>) -> Self {
        ArrayPath::Candidates(paths)
    }
}

/// Rewrite `[n]` to `.n` and drop one leading dot.
///
/// Brackets that do not hold a plain non-negative integer are left as-is,
/// so they end up as literal key characters.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if close > 0 && after[..close].bytes().all(|b| b.is_ascii_digit()) => {
                out.push('.');
                out.push_str(&after[..close]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    match out.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => out,
    }
}

/// Split a path into its normalized segments.
pub fn path_segments(path: &str) -> Vec<String> {
    let normalized = normalize_path(path);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split('.').map(str::to_string).collect()
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    let numeric = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    match node {
        Value::Array(items) if numeric => items.get(segment.parse::<usize>().ok()?),
        // Digit segments still work as keys on objects ({"0": ...}).
        Value::Object(map) => map.get(segment),
        _ => None,
    }
}

/// Walk `path` against `document`.
///
/// An empty path returns the document itself. A `null` document, a missing
/// key or index, or a `null` at any step yields `None`.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if document.is_null() {
        return None;
    }

    let mut current = document;
    for segment in path_segments(path) {
        current = step(current, &segment)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// `[[a, b]]` becomes `[a, b]`; anything else is returned unchanged.
pub fn unwrap_single_nested_array(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 && items[0].is_array() => &items[0],
        _ => value,
    }
}

/// Try each candidate in order and return the first that resolves to an array
/// (after one singleton unwrap).
pub fn resolve_array_with_fallbacks<'a, S: AsRef<str>>(
    document: &'a Value,
    candidates: &[S],
) -> Option<&'a Vec<Value>> {
    candidates.iter().find_map(|candidate| {
        let found = resolve_path(document, candidate.as_ref())?;
        unwrap_single_nested_array(found).as_array()
    })
}

/// Locate the row array for a panel.
///
/// Explicit candidates are used when configured, the [`DEFAULT_CANDIDATES`]
/// otherwise. When none match, the whole document is unwrapped once and used
/// if it is an array. `None` means "no data".
pub fn resolve_items_from_config<'a>(
    document: &'a Value,
    explicit: Option<&ArrayPath>,
) -> Option<&'a Vec<Value>> {
    let found = match explicit.filter(|path| !path.is_empty()) {
        Some(path) => resolve_array_with_fallbacks(document, &path.candidates()),
        None => resolve_array_with_fallbacks(document, &DEFAULT_CANDIDATES),
    };

    found.or_else(|| unwrap_single_nested_array(document).as_array())
}
