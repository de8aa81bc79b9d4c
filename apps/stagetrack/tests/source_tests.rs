//! Integration tests for the HTTP stage source.
//!
//! A small axum app stands in for the stage services on a loopback port.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header},
    routing::get,
};
use serde_json::{Map, Value, json};
use stagetrack::client::StageApiClient;
use stagetrack::config::{RosterSource, StagetrackConfig};
use stagetrack::source::{HttpStageSource, StageSource};
use stagetrack::view::Tracker;
use stagetrack_core::{Role, Session, StageRegistry, TrackError};
use std::io::Write;
use std::time::Duration;

// =============================================================================
// MOCK STAGE SERVICES
// =============================================================================

async fn register_list() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": [
            { "id": 1, "unique_code": "A1", "sequence_number": "960", "laddle_number": "3" },
            { "id": 2, "sequence_number": "961", "laddle_number": "4",
              "createdAt": "2024-01-15T10:05:00.000Z" }
        ]
    }))
}

async fn hot_coil_list() -> Json<Value> {
    Json(json!([
        { "id": 10, "unique_code": "HC1", "sms_short_code": "A1" }
    ]))
}

async fn hot_coil_get(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "10" {
        Ok(Json(json!({ "data": { "id": 10, "unique_code": "HC1", "sms_short_code": "A1" } })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Echoes the payload and the bearer token it arrived with.
async fn hot_coil_create(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": body, "auth": auth })),
    )
}

async fn recoiler_list() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database offline")
}

async fn spawn_services() -> String {
    let router = Router::new()
        .route("/sms-register", get(register_list))
        .route("/hot-coil", get(hot_coil_list).post(hot_coil_create))
        .route("/hot-coil/{id}", get(hot_coil_get))
        .route("/re-coiler", get(recoiler_list));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn source_for(base_url: &str, roster: Option<RosterSource>) -> HttpStageSource {
    let client = StageApiClient::new(base_url, Duration::from_secs(5)).unwrap();
    HttpStageSource::new(client, roster)
}

fn stage(name: &str) -> stagetrack_core::StageDefinition {
    *StageRegistry::standard().require(name).unwrap()
}

fn session() -> Session {
    Session::new("root", Role::Admin).with_token("jwt-abc")
}

/// A roster file granting `asha` Hot Coil only.
fn hot_coil_roster() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
version = 1

[[users]]
username = "asha"
role = "user"
steps = "Hot Coil"
"#
    )
    .unwrap();
    file
}

// =============================================================================
// LIST / GET / CREATE
// =============================================================================

#[tokio::test]
async fn list_unwraps_both_envelopes() {
    let base = spawn_services().await;
    let source = source_for(&base, None);

    let register = source.list(&stage("Register"), &session()).await.unwrap();
    assert_eq!(register.len(), 2);
    assert_eq!(register[0].unique_code.as_deref(), Some("A1"));
    assert_eq!(
        register[1].created_at.as_deref(),
        Some("2024-01-15T10:05:00.000Z")
    );

    let hot_coil = source.list(&stage("Hot Coil"), &session()).await.unwrap();
    assert_eq!(hot_coil.len(), 1);
    assert_eq!(hot_coil[0].upstream_reference.as_deref(), Some("A1"));
}

#[tokio::test]
async fn server_error_is_network_failure() {
    let base = spawn_services().await;
    let source = source_for(&base, None);

    let err = source.list(&stage("Recoiler"), &session()).await.unwrap_err();
    assert!(matches!(
        &err,
        TrackError::Network { stage, reason } if stage == "Recoiler" && reason.contains("500")
    ));
}

#[tokio::test]
async fn unreachable_service_is_network_failure() {
    let source = source_for("http://127.0.0.1:1", None);
    let err = source.list(&stage("Register"), &session()).await.unwrap_err();
    assert!(matches!(err, TrackError::Network { .. }));
}

#[tokio::test]
async fn get_maps_404_to_none() {
    let base = spawn_services().await;
    let source = source_for(&base, None);
    let hot_coil = stage("Hot Coil");

    let found = source.get(&hot_coil, "10", &session()).await.unwrap();
    assert_eq!(found.and_then(|r| r.unique_code).as_deref(), Some("HC1"));
    assert!(source.get(&hot_coil, "77", &session()).await.unwrap().is_none());
}

#[tokio::test]
async fn get_sends_the_id_as_one_segment() {
    let base = spawn_services().await;
    let source = source_for(&base, None);
    let hot_coil = stage("Hot Coil");

    // Reaches `/hot-coil/{id}` with the id intact, never `/sms-register`.
    for id in ["../sms-register", "..%2Fsms-register", "10/../../sms-register"] {
        let found = source.get(&hot_coil, id, &session()).await.unwrap();
        assert!(found.is_none(), "{id}");
    }
}

#[tokio::test]
async fn create_forwards_payload_and_token() {
    let base = spawn_services().await;
    let source = source_for(&base, None);

    let mut payload = Map::new();
    payload.insert("sms_short_code".to_string(), json!("A2"));
    let body = source
        .create(&stage("Hot Coil"), payload, &session())
        .await
        .unwrap();

    assert_eq!(body["data"]["sms_short_code"], "A2");
    assert_eq!(body["auth"], "Bearer jwt-abc");
}

// =============================================================================
// ROSTER
// =============================================================================

#[tokio::test]
async fn roster_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
version = 3

[[users]]
username = "asha"
role = "user"
steps = "Hot Coil"
"#
    )
    .unwrap();

    let source = source_for(
        "http://127.0.0.1:1",
        Some(RosterSource::File {
            path: file.path().to_path_buf(),
        }),
    );
    let roster = source.roster().await.unwrap();
    assert_eq!(roster.version, 3);
    assert!(roster.lookup("ASHA", Role::User).is_some());
}

#[tokio::test]
async fn no_roster_source_is_config_error() {
    let source = source_for("http://127.0.0.1:1", None);
    assert!(matches!(source.roster().await, Err(TrackError::Config(_))));
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn tracker_over_http_reports_pending() {
    let base = spawn_services().await;
    let config = StagetrackConfig::default().with_overrides(Some(base), None);
    let source = HttpStageSource::from_config(&config).unwrap();
    let tracker = Tracker::new(source, StageRegistry::standard(), config.notice_ttl());

    let view = tracker.pending(&session(), "Hot Coil", "").await.unwrap();
    assert_eq!(view.total_pending, 1);
    assert_eq!(view.completed, 1);
    // The second batch stored no code and is listed under its derived one.
    assert!(view.pending[0].code.is_derived());
    assert_eq!(view.pending[0].code.as_str(), "SMS202401159614");
}

#[tokio::test]
async fn record_lookup_stays_inside_the_granted_stage() {
    let base = spawn_services().await;
    let roster = hot_coil_roster();
    let source = source_for(
        &base,
        Some(RosterSource::File {
            path: roster.path().to_path_buf(),
        }),
    );
    let tracker = Tracker::new(source, StageRegistry::standard(), Duration::from_secs(2));
    let asha = Session::new("asha", Role::User).with_token("jwt-asha");

    assert!(matches!(
        tracker.history(&asha, "Register", "").await,
        Err(TrackError::AccessDenied(_))
    ));

    for id in ["../sms-register", "..", ".", "", "10?id=1", "10#x", "%2E%2E"] {
        let found = tracker.record(&asha, "Hot Coil", id).await.unwrap();
        assert!(found.is_none(), "{id:?}");
    }

    let own = tracker.record(&asha, "Hot Coil", "10").await.unwrap();
    assert_eq!(own.and_then(|r| r.unique_code).as_deref(), Some("HC1"));
}
