//! # Roster
//!
//! The roster maps each user to the stages they may reach. It arrives
//! either as a Google Visualization (`gviz`) JSON response from a shared
//! spreadsheet, or as plain rows from a local file.
//!
//! ## gviz layout
//!
//! The response is JavaScript, not JSON:
//!
//! ```text
//! /*O_o*/
//! google.visualization.Query.setResponse({"table":{"rows":[{"c":[...]}]}});
//! ```
//!
//! Each row is a list of cells `{"v": value}` (a cell may be `null`).
//! Column 2 holds the username, column 4 the role, column 7 the step access.

use crate::{Role, TrackError, UserAccess};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapper call emitted around the gviz JSON payload.
pub const GVIZ_PREFIX: &str = "google.visualization.Query.setResponse(";

const COL_USERNAME: usize = 2;
const COL_ROLE: usize = 4;
const COL_STEPS: usize = 7;

// =============================================================================
// ROW
// =============================================================================

/// One roster row before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub steps: String,
}

impl RosterRow {
    /// Validate into a [`UserAccess`]. `None` when the username is blank or
    /// the role is neither admin nor user.
    #[must_use]
    pub fn into_access(self) -> Option<UserAccess> {
        let username = self.username.trim();
        if username.is_empty() {
            return None;
        }
        let role = self.role.parse::<Role>().ok()?;
        Some(UserAccess::new(username, role, &self.steps))
    }
}

// =============================================================================
// ROSTER
// =============================================================================

/// A parsed roster snapshot.
///
/// `version` orders snapshots of the same source: a snapshot is only
/// applied over an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Roster {
    pub version: u64,
    pub users: Vec<UserAccess>,
}

impl Roster {
    #[must_use]
    pub fn new(version: u64, users: Vec<UserAccess>) -> Self {
        Self { version, users }
    }

    /// Build from unvalidated rows. Invalid rows are skipped.
    #[must_use]
    pub fn from_rows(version: u64, rows: Vec<RosterRow>) -> Self {
        Self::new(
            version,
            rows.into_iter().filter_map(RosterRow::into_access).collect(),
        )
    }

    /// Parse a gviz response body.
    pub fn from_gviz(text: &str, version: u64) -> Result<Self, TrackError> {
        let payload = gviz_payload(text)?;
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| TrackError::RosterParse(format!("invalid JSON: {}", e)))?;

        let rows = value
            .pointer("/table/rows")
            .and_then(Value::as_array)
            .ok_or_else(|| TrackError::RosterParse("missing table.rows".to_string()))?;

        let rows = rows
            .iter()
            .filter_map(|row| {
                let cells = row.get("c")?.as_array()?;
                Some(RosterRow {
                    username: cell_text(cells, COL_USERNAME)?,
                    role: cell_text(cells, COL_ROLE)?,
                    steps: cell_text(cells, COL_STEPS).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Self::from_rows(version, rows))
    }

    /// First row matching username (case-insensitive) and role.
    #[must_use]
    pub fn lookup(&self, username: &str, role: Role) -> Option<&UserAccess> {
        self.users.iter().find(|row| row.matches(username, role))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Extract the JSON object from a gviz response.
///
/// Strips the `setResponse(` wrapper when present; otherwise falls back to
/// the span between the first `{` and the last `}`.
fn gviz_payload(text: &str) -> Result<&str, TrackError> {
    let body = match text.find(GVIZ_PREFIX) {
        Some(start) => &text[start + GVIZ_PREFIX.len()..],
        None => text,
    };
    match (body.find('{'), body.rfind('}')) {
        (Some(open), Some(close)) if open < close => Ok(&body[open..=close]),
        _ => Err(TrackError::RosterParse(
            "no JSON object in roster response".to_string(),
        )),
    }
}

/// Text of cell `index`. Numbers are rendered in decimal.
fn cell_text(cells: &[Value], index: usize) -> Option<String> {
    match cells.get(index)?.get("v")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
