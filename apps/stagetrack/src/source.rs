//! # Stage Sources
//!
//! The seam between the view layer and wherever stage records live.
//!
//! [`HttpStageSource`] talks to the real stage services. Tests plug in an
//! in-memory source instead.

use crate::client::{ClientError, StageApiClient, sheet_url};
use crate::config::{RosterSource, StagetrackConfig, parse_roster_file};
use serde_json::{Map, Value};
use stagetrack_core::{Roster, Session, StageDefinition, StageRecord, TrackError, records_from_body};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Access to stage records and the roster.
pub trait StageSource: Send + Sync + 'static {
    /// All records of `stage`, any envelope shape already normalized.
    fn list(
        &self,
        stage: &StageDefinition,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<StageRecord>, TrackError>> + Send;

    /// One record of `stage` by id.
    fn get(
        &self,
        stage: &StageDefinition,
        id: &str,
        session: &Session,
    ) -> impl Future<Output = Result<Option<StageRecord>, TrackError>> + Send;

    /// Create a record; returns the service's response body.
    fn create(
        &self,
        stage: &StageDefinition,
        payload: Map<String, Value>,
        session: &Session,
    ) -> impl Future<Output = Result<Value, TrackError>> + Send;

    /// Current roster snapshot.
    fn roster(&self) -> impl Future<Output = Result<Roster, TrackError>> + Send;
}

// =============================================================================
// HTTP SOURCE
// =============================================================================

/// Stage records from the CRUD services, roster from the configured feed.
pub struct HttpStageSource {
    client: StageApiClient,
    roster: Option<RosterSource>,
    /// Sheet snapshots carry no version of their own; fetches are numbered.
    sheet_fetches: AtomicU64,
}

impl HttpStageSource {
    pub fn new(client: StageApiClient, roster: Option<RosterSource>) -> Self {
        Self {
            client,
            roster,
            sheet_fetches: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &StagetrackConfig) -> Result<Self, TrackError> {
        let client = StageApiClient::new(&config.api_base_url, config.request_timeout())
            .map_err(|e| TrackError::Config(e.to_string()))?;
        Ok(Self::new(client, config.roster.clone()))
    }
}

impl StageSource for HttpStageSource {
    async fn list(
        &self,
        stage: &StageDefinition,
        session: &Session,
    ) -> Result<Vec<StageRecord>, TrackError> {
        let body = self
            .client
            .list(stage.slug, session.token.as_deref())
            .await
            .map_err(|e| e.into_track_error(stage.name))?;
        Ok(records_from_body(body, stage.link_field))
    }

    async fn get(
        &self,
        stage: &StageDefinition,
        id: &str,
        session: &Session,
    ) -> Result<Option<StageRecord>, TrackError> {
        let body = match self.client.get(stage.slug, id, session.token.as_deref()).await {
            Ok(body) => body,
            Err(ClientError::Rejected(404, _)) => return Ok(None),
            Err(e) => return Err(e.into_track_error(stage.name)),
        };
        Ok(records_from_body(body, stage.link_field).into_iter().next())
    }

    async fn create(
        &self,
        stage: &StageDefinition,
        payload: Map<String, Value>,
        session: &Session,
    ) -> Result<Value, TrackError> {
        self.client
            .create(stage.slug, &Value::Object(payload), session.token.as_deref())
            .await
            .map_err(|e| e.into_track_error(stage.name))
    }

    async fn roster(&self) -> Result<Roster, TrackError> {
        match &self.roster {
            Some(RosterSource::Sheet {
                sheet_id,
                sheet_name,
            }) => {
                let url = sheet_url(sheet_id, sheet_name)
                    .map_err(|e| TrackError::Config(e.to_string()))?;
                let text = self
                    .client
                    .fetch_text(url.as_str())
                    .await
                    .map_err(|e| TrackError::RosterParse(e.to_string()))?;
                let version = self.sheet_fetches.fetch_add(1, Ordering::SeqCst) + 1;
                Roster::from_gviz(&text, version)
            }
            Some(RosterSource::File { path }) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    TrackError::Io(format!("Cannot read roster {}: {}", path.display(), e))
                })?;
                parse_roster_file(&contents)
            }
            None => Err(TrackError::Config("no roster source configured".to_string())),
        }
    }
}
