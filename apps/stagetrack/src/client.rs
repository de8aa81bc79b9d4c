//! # Stage API Client
//!
//! Wrapper around the per-stage CRUD services and the roster sheet export.
//!
//! Every stage is served under its slug: `GET /{slug}` lists records,
//! `GET /{slug}/{id}` reads one and `POST /{slug}` creates one. The services
//! also accept `PUT` and `DELETE` on `/{slug}/{id}`; records are never
//! edited from here. Requests carry the session's bearer token when one is
//! set.

use serde_json::Value;
use stagetrack_core::TrackError;
use std::time::Duration;

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the stage service.
    ConnectionFailed(String),
    /// 401 Unauthorized - invalid or expired session token.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// The service rejected the request (4xx other than 401/429).
    Rejected(u16, String),
    /// Server returned a 5xx error.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to stage service at {url}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or expired session token"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::Rejected(status, msg) => write!(f, "Request rejected ({status}): {msg}"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// Wrap as a network failure of `stage`.
    #[must_use]
    pub fn into_track_error(self, stage: &str) -> TrackError {
        TrackError::Network {
            stage: stage.to_string(),
            reason: self.to_string(),
        }
    }
}

const SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// Google Sheets gviz export URL of one sheet.
///
/// The id is one path segment and the sheet name a query value, both
/// percent-encoded.
pub fn sheet_url(sheet_id: &str, sheet_name: &str) -> Result<reqwest::Url, ClientError> {
    let mut url = reqwest::Url::parse(SHEETS_BASE)
        .map_err(|e| ClientError::ConnectionFailed(format!("{SHEETS_BASE}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::ConnectionFailed(format!("{SHEETS_BASE}: not a base URL")))?
        .extend([sheet_id, "gviz", "tq"]);
    url.query_pairs_mut()
        .append_pair("tqx", "out:json")
        .append_pair("sheet", sheet_name);
    Ok(url)
}

/// HTTP client for the stage services.
#[derive(Clone)]
pub struct StageApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl StageApiClient {
    /// Create a client for the services rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(format!("{base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of `segments` under the base URL, each one percent-encoded.
    ///
    /// A segment never adds path structure: `/` becomes `%2F` and `.` or `..`
    /// segments are skipped.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::ConnectionFailed(format!("{}: not a base URL", self.base_url))
            })?
            .extend(segments);
        Ok(url)
    }

    /// Build a request with optional Bearer auth.
    fn request(
        &self,
        method: reqwest::Method,
        url: reqwest::Url,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Check the status code; the body is returned untouched on success.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Rejected(status.as_u16(), body));
        }
        Ok(resp)
    }

    /// Handle HTTP response: check status codes and parse JSON.
    ///
    /// An empty success body (e.g. `204`) parses as `null`.
    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let resp = Self::check_status(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        req.send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))
    }

    /// GET /{slug} → raw list body (any envelope shape).
    pub async fn list(&self, slug: &str, token: Option<&str>) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, self.endpoint(&[slug])?, token);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /{slug}/{id}
    pub async fn get(&self, slug: &str, id: &str, token: Option<&str>) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, self.endpoint(&[slug, id])?, token);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// POST /{slug} → create a record.
    pub async fn create(
        &self,
        slug: &str,
        payload: &Value,
        token: Option<&str>,
    ) -> Result<Value, ClientError> {
        let req = self
            .request(reqwest::Method::POST, self.endpoint(&[slug])?, token)
            .json(payload);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET an absolute URL as text (the roster export is JavaScript, not JSON).
    pub async fn fetch_text(&self, url: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{url}: {e}")))?;
        let resp = Self::check_status(resp).await?;
        resp.text()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
