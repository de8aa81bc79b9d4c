//! # Core Type Definitions
//!
//! This module contains the shared types of the stagetrack core:
//! - Stage records as delivered by the per-stage CRUD API (`StageRecord`)
//! - Session identity (`Role`, `Session`)
//! - Roster entries (`StepAccess`, `UserAccess`)
//! - Error types (`TrackError`)
//!
//! ## Emptiness
//!
//! Upstream services are inconsistent about missing values: a field may be
//! absent, `null`, or an empty string. Every accessor here treats all three
//! the same way, so callers only ever see `None`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// RESERVED FIELD NAMES
// =============================================================================

/// Wire key of the record identifier.
pub const FIELD_ID: &str = "id";

/// Wire key of the stored canonical code.
pub const FIELD_UNIQUE_CODE: &str = "unique_code";

/// Wire key of the creation timestamp (camelCase as sent by the API).
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Snake-case alias of the creation timestamp, also accepted.
pub const FIELD_CREATED_AT_ALT: &str = "created_at";

// =============================================================================
// STAGE RECORD
// =============================================================================

/// One record of one stage.
///
/// The record is a read-only snapshot of what the API returned. The
/// reconciler derives views from it but never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StageRecord {
    /// Record identifier (numeric ids are kept in their decimal form).
    pub id: Option<String>,
    /// Stored canonical code. Authoritative when present.
    pub unique_code: Option<String>,
    /// Raw creation timestamp as sent by the API.
    pub created_at: Option<String>,
    /// Every other field of the record, in wire order.
    pub attributes: Map<String, Value>,
    /// Code of the upstream record this one was created from.
    pub upstream_reference: Option<String>,
}

impl StageRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the stored unique code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.unique_code = non_empty(code.into());
        self
    }

    /// Builder: set the record id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = non_empty(id.into());
        self
    }

    /// Builder: set the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = non_empty(created_at.into());
        self
    }

    /// Builder: set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: set the upstream reference.
    ///
    /// The reference is also written to `link_field` so that the record looks
    /// the same as one parsed from the wire.
    #[must_use]
    pub fn with_reference(mut self, link_field: &str, code: impl Into<String>) -> Self {
        let code = code.into();
        self.attributes
            .insert(link_field.to_string(), Value::String(code.clone()));
        self.upstream_reference = non_empty(code);
        self
    }

    /// Build a record from one JSON value of a list response.
    ///
    /// Returns `None` for anything that is not a JSON object. `link_field`
    /// names the attribute that references the upstream stage, if the owning
    /// stage has one.
    #[must_use]
    pub fn from_json(value: Value, link_field: Option<&str>) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };

        let id = map.shift_remove(FIELD_ID).as_ref().and_then(scalar_text);
        let unique_code = map.shift_remove(FIELD_UNIQUE_CODE).as_ref().and_then(scalar_text);
        let created_at = map
            .shift_remove(FIELD_CREATED_AT)
            .as_ref()
            .and_then(scalar_text)
            .or_else(|| map.shift_remove(FIELD_CREATED_AT_ALT).as_ref().and_then(scalar_text));
        let upstream_reference =
            link_field.and_then(|field| map.get(field).and_then(scalar_text));

        Some(Self {
            id,
            unique_code,
            created_at,
            attributes: map,
            upstream_reference,
        })
    }

    /// Textual value of a field, with the reserved names resolved first.
    ///
    /// Returns `None` for absent, `null` and empty values. Numbers and
    /// booleans are rendered in their JSON form; arrays and objects are not
    /// considered scalar and yield `None`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            FIELD_ID => self.id.clone(),
            FIELD_UNIQUE_CODE => self.unique_code.clone(),
            FIELD_CREATED_AT | FIELD_CREATED_AT_ALT => self.created_at.clone(),
            _ => self.attributes.get(name).and_then(scalar_text),
        }
    }

    /// Borrowed string attribute, if the attribute is a non-empty JSON string.
    #[must_use]
    pub fn str_attribute(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the record back to its wire shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert(FIELD_ID.to_string(), Value::String(id.clone()));
        }
        if let Some(code) = &self.unique_code {
            map.insert(FIELD_UNIQUE_CODE.to_string(), Value::String(code.clone()));
        }
        if let Some(created_at) = &self.created_at {
            map.insert(
                FIELD_CREATED_AT.to_string(),
                Value::String(created_at.clone()),
            );
        }
        for (key, value) in &self.attributes {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Scalar JSON value as text, `None` when empty or not a scalar.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// =============================================================================
// ROLE & SESSION
// =============================================================================

/// Role carried by the session token and by each roster row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unconditional access to every stage.
    Admin,
    /// Access driven by the roster.
    User,
}

impl Role {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("admin") {
            Ok(Role::Admin)
        } else if trimmed.eq_ignore_ascii_case("user") {
            Ok(Role::User)
        } else {
            Err(TrackError::UnknownRole(trimmed.to_string()))
        }
    }
}

/// The authenticated identity of one session view.
///
/// Passed explicitly to every call that needs it; the core never reads
/// identity from anywhere else and never changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    /// Bearer token forwarded to the stage API. Never logged.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            token: None,
        }
    }

    /// Builder: attach the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(token.into());
        self
    }
}

// =============================================================================
// ROSTER ENTRIES
// =============================================================================

/// Sentinel granting every stage.
pub const STEP_ACCESS_ALL: &str = "all";

/// Step access value of one roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAccess {
    /// The `"all"` sentinel.
    All,
    /// Explicit access tags.
    Steps(BTreeSet<String>),
}

impl StepAccess {
    /// Parse a raw step-access cell.
    ///
    /// Exactly `"all"` (surrounding whitespace ignored) is the sentinel;
    /// anything else is split on commas and trimmed, empty pieces dropped.
    /// `"ALL"` is therefore a tag that names no stage.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == STEP_ACCESS_ALL {
            return StepAccess::All;
        }
        StepAccess::Steps(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|step| !step.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Check whether an access tag is granted.
    #[must_use]
    pub fn grants(&self, access_tag: &str) -> bool {
        match self {
            StepAccess::All => true,
            StepAccess::Steps(steps) => steps.contains(access_tag),
        }
    }
}

/// One row of the roster: who may reach which stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    pub username: String,
    pub role: Role,
    pub step_access: StepAccess,
}

impl UserAccess {
    #[must_use]
    pub fn new(username: impl Into<String>, role: Role, steps: &str) -> Self {
        Self {
            username: username.into(),
            role,
            step_access: StepAccess::parse(steps),
        }
    }

    /// Case-insensitive match on both username and role.
    #[must_use]
    pub fn matches(&self, username: &str, role: Role) -> bool {
        self.role == role && self.username.trim().eq_ignore_ascii_case(username.trim())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the stagetrack system.
///
/// None of these is fatal: callers degrade to an empty or restricted view
/// plus a visible message.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A fetch was rejected or returned a non-2xx status.
    #[error("Network failure on {stage}: {reason}")]
    Network { stage: String, reason: String },

    /// The stage service answered a create with `{"success": false}`.
    #[error("{stage} service rejected the record: {reason}")]
    Rejected { stage: String, reason: String },

    /// Required submission fields are missing. Never transmitted.
    #[error("Missing required fields for {stage}: {}", missing.join(", "))]
    Validation { stage: String, missing: Vec<String> },

    /// The roster payload could not be parsed.
    #[error("Roster parse failure: {0}")]
    RosterParse(String),

    /// The named stage is not in the registry.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// The named stage is the first stage and has nothing upstream.
    #[error("Stage {0} has no predecessor")]
    NoPredecessor(String),

    /// The session may not view or act on the stage.
    #[error("Access to stage {0} denied")]
    AccessDenied(String),

    /// A role string other than admin/user.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// A submission for this form is already in flight.
    #[error("A submission for {0} is already in flight")]
    SubmissionInFlight(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
