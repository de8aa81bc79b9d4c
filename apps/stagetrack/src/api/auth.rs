//! # Session Authentication
//!
//! Derives the [`Session`] of a request from its bearer token.
//!
//! The token is the JWT issued by the plant's login service. Its payload
//! names the user (`username`, or `user_name` on older tokens) and the role
//! (`role`, `user` when absent). The signature is verified by the stage
//! services on every forwarded call, so the view server only reads the
//! payload and never trusts it for anything the services would not also
//! enforce.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <jwt>
//! ```

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde_json::Value;
use stagetrack_core::{Role, Session, TrackError};

// =============================================================================
// TOKEN DECODING
// =============================================================================

/// Build a session from a JWT.
///
/// Unknown role strings resolve to [`Role::User`], so an unexpected role
/// can never widen access.
pub fn session_from_token(token: &str) -> Result<Session, TrackError> {
    let token = token.trim();
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| TrackError::Serialization("token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|e| TrackError::Serialization(format!("token payload: {}", e)))?;
    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| TrackError::Serialization(format!("token payload: {}", e)))?;

    let username = ["username", "user_name"]
        .iter()
        .find_map(|key| claims.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TrackError::Serialization("token names no user".to_string()))?;

    let role = claims
        .get("role")
        .and_then(Value::as_str)
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or(Role::User);

    Ok(Session::new(username, role).with_token(token))
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Session middleware.
///
/// - `/health` is always allowed (for load balancer health checks)
/// - Every other route requires `Authorization: Bearer <jwt>`; the decoded
///   [`Session`] is attached to the request extensions
pub async fn session_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).to_string());

    let Some(token) = token else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    match session_from_token(&token) {
        Ok(session) => {
            request.extensions_mut().insert(session);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_token",
                "Authentication failed: {}",
                e
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
