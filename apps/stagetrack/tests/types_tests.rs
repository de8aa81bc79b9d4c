//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use stagetrack::api::{
    HealthResponse, SearchParams, StageSummary, StagesResponse, SubmitRequest, SubmitResponse,
    status_for,
};
use stagetrack_core::{StageRegistry, TrackError};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let health: HealthResponse =
        serde_json::from_str(r#"{"status":"ok","version":"0.4.2"}"#).unwrap();
    assert_eq!(health.version, "0.4.2");
}

// =============================================================================
// STAGE CATALOG TESTS
// =============================================================================

#[test]
fn test_stage_summary_of_hot_coil() {
    let registry = StageRegistry::standard();
    let summary = StageSummary::from(registry.get("Hot Coil").unwrap());

    assert_eq!(summary.slug, "hot-coil");
    assert_eq!(summary.code_prefix, "HC");
    assert_eq!(summary.predecessor.as_deref(), Some("Register"));
    assert!(summary.required_fields.iter().any(|f| f == "size"));

    let json = serde_json::to_value(&summary).unwrap();
    let dropdown = &json["dropdowns"][1];
    assert_eq!(dropdown["field"], "quality_supervisor");
    assert_eq!(dropdown["other_field"], "quality_supervisor_other");
    assert!(dropdown["options"][0]["localized_label"].is_string());
}

#[test]
fn test_first_stage_summary_has_no_link() {
    let registry = StageRegistry::standard();
    let response = StagesResponse {
        landing: registry.landing().to_string(),
        stages: registry.stages().iter().map(StageSummary::from).collect(),
    };

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["stages"][0]["predecessor"].is_null());
    assert!(json["stages"][0]["link_field"].is_null());
}

// =============================================================================
// REQUEST TESTS
// =============================================================================

#[test]
fn test_search_params_default_to_empty_query() {
    let params: SearchParams = serde_json::from_str("{}").unwrap();
    assert_eq!(params.query(), "");

    let params: SearchParams = serde_json::from_str(r#"{"q":"HC24"}"#).unwrap();
    assert_eq!(params.query(), "HC24");
}

#[test]
fn test_submit_request_keeps_field_order() {
    let request: SubmitRequest =
        serde_json::from_str(r#"{"fields":{"size":"2.5","sms_short_code":"A2"}}"#).unwrap();
    let keys: Vec<&String> = request.fields.keys().collect();
    assert_eq!(keys, vec!["size", "sms_short_code"]);
}

#[test]
fn test_submit_request_requires_fields() {
    assert!(serde_json::from_str::<SubmitRequest>(r#"{"size":"2.5"}"#).is_err());
}

// =============================================================================
// SUBMIT RESPONSE TESTS
// =============================================================================

#[test]
fn test_submit_success_omits_error() {
    let json = serde_json::to_string(&SubmitResponse::success(serde_json::json!({"id": 5})))
        .unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(!json.contains("error"));
    assert!(!json.contains("missing"));
}

#[test]
fn test_submit_validation_lists_missing_fields() {
    let err = TrackError::Validation {
        stage: "Recoiler".to_string(),
        missing: vec!["welder_name".to_string(), "contractor".to_string()],
    };
    let response = SubmitResponse::error(&err);
    assert!(!response.success);
    assert_eq!(response.missing, vec!["welder_name", "contractor"]);
    assert!(response.error.unwrap().contains("welder_name"));
}

// =============================================================================
// STATUS MAPPING TESTS
// =============================================================================

#[test]
fn test_status_mapping() {
    assert_eq!(
        status_for(&TrackError::UnknownStage("x".to_string())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_for(&TrackError::AccessDenied("Tundish".to_string())),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status_for(&TrackError::SubmissionInFlight("Ladle".to_string())),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&TrackError::Network {
            stage: "Ladle".to_string(),
            reason: "timeout".to_string(),
        }),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        status_for(&TrackError::Rejected {
            stage: "Hot Coil".to_string(),
            reason: "duplicate sms_short_code".to_string(),
        }),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        status_for(&TrackError::Config("bad".to_string())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
