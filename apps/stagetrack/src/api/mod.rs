//! # Stagetrack HTTP API Module
//!
//! JSON views over the stage services, served with axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (no token required)
//! - `GET /stages` - Stage catalog
//! - `GET /access` - Stages reachable by the caller
//! - `GET /notices` - The caller's active notices
//! - `GET /stages/{stage}/pending?q=` - Upstream records waiting on a stage
//! - `GET /stages/{stage}/history?q=` - A stage's own records
//! - `GET /stages/{stage}/records/{id}` - One record
//! - `POST /stages/{stage}/records` - Submit a new record
//!
//! `{stage}` is the stage name, URL-encoded (`/stages/Hot%20Coil/pending`),
//! or its slug (`/stages/hot-coil/pending`).
//!
//! ## Configuration (Environment Variables)
//!
//! - `STAGETRACK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `STAGETRACK_RATE_LIMIT`: Requests per second (default: 50, 0 to disable)

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::session_from_token;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `stagetrack::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    access_handler, health_handler, history_handler, notices_handler, pending_handler,
    record_handler, stages_handler, submit_handler,
};
#[allow(unused_imports)]
pub use types::{
    AccessResponse, ErrorResponse, HealthResponse, SearchParams, StageSummary, StagesResponse,
    SubmitRequest, SubmitResponse, status_for,
};

use crate::source::StageSource;
use crate::view::Tracker;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use stagetrack_core::TrackError;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: one tracker for every caller.
pub struct AppState<S> {
    pub tracker: Arc<Tracker<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<S: StageSource> AppState<S> {
    #[must_use]
    pub fn new(tracker: Tracker<S>) -> Self {
        Self {
            tracker: Arc::new(tracker),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `STAGETRACK_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    match std::env::var("STAGETRACK_CORS_ORIGINS").ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (STAGETRACK_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in STAGETRACK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => build_localhost_cors(),
    }
}

/// Localhost origins of the plant dashboard dev servers.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing, CORS and body limit
/// 2. Rate limiting (if enabled)
/// 3. Session extraction from the bearer token
pub fn create_router<S: StageSource>(state: AppState<S>) -> Router {
    let rate_limit = get_rate_limit_from_env();

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stages", get(handlers::stages_handler::<S>))
        .route("/access", get(handlers::access_handler::<S>))
        .route("/notices", get(handlers::notices_handler::<S>))
        .route("/stages/{stage}/pending", get(handlers::pending_handler::<S>))
        .route("/stages/{stage}/history", get(handlers::history_handler::<S>))
        .route("/stages/{stage}/records", post(handlers::submit_handler::<S>))
        .route(
            "/stages/{stage}/records/{id}",
            get(handlers::record_handler::<S>),
        )
        .layer(axum_middleware::from_fn(auth::session_middleware));

    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
///
/// With `roster_refresh` set, the roster is re-fetched on that period for
/// as long as the server runs; the first fetch happens at startup.
pub async fn run_server<S: StageSource>(
    addr: &str,
    tracker: Tracker<S>,
    roster_refresh: Option<Duration>,
) -> Result<(), TrackError> {
    let state = AppState::new(tracker);

    if let Some(period) = roster_refresh {
        let tracker = Arc::clone(&state.tracker);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            loop {
                ticks.tick().await;
                tracker.refresh_roster().await;
            }
        });
    }

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TrackError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Stagetrack view server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
        })
        .await
        .map_err(|e| TrackError::Io(format!("Server error: {}", e)))
}
