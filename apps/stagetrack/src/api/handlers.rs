//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        AccessResponse, ErrorResponse, HealthResponse, SearchParams, StageSummary, StagesResponse,
        SubmitRequest, SubmitResponse, status_for,
    },
};
use crate::source::StageSource;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stagetrack_core::{Session, TrackError};

fn error_response(err: &TrackError) -> Response {
    (
        status_for(err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// CATALOG HANDLERS
// =============================================================================

/// Stage catalog.
pub async fn stages_handler<S: StageSource>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let registry = state.tracker.registry();
    let response = StagesResponse {
        landing: registry.landing().to_string(),
        stages: registry.stages().iter().map(StageSummary::from).collect(),
    };
    (StatusCode::OK, Json(response))
}

/// Stages reachable by the caller.
pub async fn access_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
) -> impl IntoResponse {
    let access = state.tracker.access(&session).await;
    let ordered = access.ordered(state.tracker.registry());
    let response = AccessResponse::new(&session.username, session.role, access, ordered);
    (StatusCode::OK, Json(response))
}

/// Notices still visible to the caller.
pub async fn notices_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(state.tracker.notices(&session)))
}

// =============================================================================
// VIEW HANDLERS
// =============================================================================

/// Pending view of a stage.
pub async fn pending_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
    Path(stage): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state
        .tracker
        .pending(&session, &stage, params.query())
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// History view of a stage.
pub async fn history_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
    Path(stage): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state
        .tracker
        .history(&session, &stage, params.query())
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// One record of a stage.
pub async fn record_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
    Path((stage, id)): Path<(String, String)>,
) -> Response {
    match state.tracker.record(&session, &stage, &id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No record {} in {}", id, stage),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// SUBMIT HANDLER
// =============================================================================

/// Create a record of a stage.
pub async fn submit_handler<S: StageSource>(
    State(state): State<AppState<S>>,
    Extension(session): Extension<Session>,
    Path(stage): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    match state.tracker.submit(&session, &stage, request.fields).await {
        Ok(record) => (StatusCode::CREATED, Json(SubmitResponse::success(record))),
        Err(e) => (status_for(&e), Json(SubmitResponse::error(&e))),
    }
}
