//! # Response Envelopes
//!
//! The stage services do not agree on a list response shape. All of these
//! are seen in practice and normalize to the same list:
//!
//! - a bare array `[...]`
//! - `{"data": [...]}`
//! - `{"success": true, "data": [...]}`
//! - a single record object, treated as a one-element list
//!
//! `{"success": false, ...}` and `null` normalize to an empty list. For a
//! create, the same flag means the service refused the record; see
//! [`rejection`].

use crate::StageRecord;
use serde::Deserialize;
use serde_json::Value;

/// Known list response shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope {
    Bare(Vec<Value>),
    Wrapped {
        #[serde(default)]
        success: Option<bool>,
        data: Value,
    },
    Single(serde_json::Map<String, Value>),
    Other(Value),
}

impl ListEnvelope {
    /// Flatten into the list of items.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        match self {
            ListEnvelope::Bare(items) => items,
            ListEnvelope::Wrapped {
                success: Some(false),
                ..
            } => Vec::new(),
            ListEnvelope::Wrapped { data, .. } => match data {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                item @ Value::Object(_) => vec![item],
                _ => Vec::new(),
            },
            ListEnvelope::Single(map) if map.get("success") == Some(&Value::Bool(false)) => {
                Vec::new()
            }
            ListEnvelope::Single(map) => vec![Value::Object(map)],
            ListEnvelope::Other(_) => Vec::new(),
        }
    }
}

/// Normalize a response body to a list of items.
#[must_use]
pub fn normalize(body: Value) -> Vec<Value> {
    match serde_json::from_value::<ListEnvelope>(body) {
        Ok(envelope) => envelope.into_items(),
        Err(_) => Vec::new(),
    }
}

/// The reason a write response reports failure, if it does.
///
/// Only an explicit `"success": false` counts; the reason is the body's
/// `message` or `error` text.
#[must_use]
pub fn rejection(body: &Value) -> Option<String> {
    if body.get("success") != Some(&Value::Bool(false)) {
        return None;
    }
    let reason = ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .unwrap_or("request refused");
    Some(reason.to_string())
}

/// Normalize a response body and keep the items that are records.
#[must_use]
pub fn records_from_body(body: Value, link_field: Option<&str>) -> Vec<StageRecord> {
    normalize(body)
        .into_iter()
        .filter_map(|item| StageRecord::from_json(item, link_field))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
