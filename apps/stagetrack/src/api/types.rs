//! # API Request/Response Types
//!
//! This module defines the JSON structures for the view server.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stagetrack_core::registry::DropdownSet;
use stagetrack_core::{Role, StageAccess, StageDefinition, TrackError};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STAGES RESPONSE
// =============================================================================

/// One stage as described to clients.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub name: String,
    pub slug: String,
    pub access_tag: String,
    pub predecessor: Option<String>,
    pub link_field: Option<String>,
    pub code_prefix: String,
    pub required_fields: Vec<String>,
    pub searchable_fields: Vec<String>,
    pub dropdowns: Vec<DropdownSet>,
}

impl From<&StageDefinition> for StageSummary {
    fn from(stage: &StageDefinition) -> Self {
        Self {
            name: stage.name.to_string(),
            slug: stage.slug.to_string(),
            access_tag: stage.access_tag.to_string(),
            predecessor: stage.predecessor.map(str::to_string),
            link_field: stage.link_field.map(str::to_string),
            code_prefix: stage.code.prefix.to_string(),
            required_fields: stage.required_fields.iter().map(|f| f.to_string()).collect(),
            searchable_fields: stage.searchable_fields.iter().map(|f| f.to_string()).collect(),
            dropdowns: stage.dropdowns.to_vec(),
        }
    }
}

/// Stage catalog response.
#[derive(Debug, Clone, Serialize)]
pub struct StagesResponse {
    pub landing: String,
    pub stages: Vec<StageSummary>,
}

// =============================================================================
// ACCESS RESPONSE
// =============================================================================

/// Stages reachable by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub username: String,
    pub role: Role,
    pub landing: String,
    /// Reachable stages in pipeline order, landing first.
    pub stages: Vec<String>,
}

impl AccessResponse {
    #[must_use]
    pub fn new(username: &str, role: Role, access: StageAccess, ordered: Vec<String>) -> Self {
        Self {
            username: username.to_string(),
            role,
            landing: access.landing,
            stages: ordered,
        }
    }
}

// =============================================================================
// SEARCH PARAMS
// =============================================================================

/// `?q=` of the pending and history views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

impl SearchParams {
    #[must_use]
    pub fn query(&self) -> &str {
        self.q.as_deref().unwrap_or("")
    }
}

// =============================================================================
// SUBMIT REQUEST/RESPONSE
// =============================================================================

/// New record of a stage; field names follow the stage's form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub fields: Map<String, Value>,
}

/// Outcome of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Required fields left blank (validation failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl SubmitResponse {
    #[must_use]
    pub fn success(record: Value) -> Self {
        Self {
            success: true,
            record: Some(record),
            error: None,
            missing: Vec::new(),
        }
    }

    #[must_use]
    pub fn error(err: &TrackError) -> Self {
        let missing = match err {
            TrackError::Validation { missing, .. } => missing.clone(),
            _ => Vec::new(),
        };
        Self {
            success: false,
            record: None,
            error: Some(err.to_string()),
            missing,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body of the view endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP status of a core error.
#[must_use]
pub fn status_for(err: &TrackError) -> StatusCode {
    match err {
        TrackError::UnknownStage(_) => StatusCode::NOT_FOUND,
        TrackError::NoPredecessor(_) => StatusCode::BAD_REQUEST,
        TrackError::AccessDenied(_) => StatusCode::FORBIDDEN,
        TrackError::Validation { .. } | TrackError::Rejected { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TrackError::SubmissionInFlight(_) => StatusCode::CONFLICT,
        TrackError::Network { .. } => StatusCode::BAD_GATEWAY,
        TrackError::RosterParse(_)
        | TrackError::UnknownRole(_)
        | TrackError::Config(_)
        | TrackError::Serialization(_)
        | TrackError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
