//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Cli;
use crate::api;
use crate::config::StagetrackConfig;
use crate::source::HttpStageSource;
use crate::view::{HistoryView, PendingView, Tracker};
use serde::Serialize;
use serde_json::{Map, Value};
use stagetrack_core::{Role, Session, StageRegistry, TrackError};
use std::path::Path;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a submission file (1 MB).
const MAX_SUBMIT_FILE_SIZE: u64 = 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TrackError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TrackError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TrackError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Read a submission file: one JSON object of form fields.
pub fn read_submission_file(path: &Path) -> Result<Map<String, Value>, TrackError> {
    validate_file_size(path, MAX_SUBMIT_FILE_SIZE)?;
    let contents = std::fs::read_to_string(path)
        .map_err(|e| TrackError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
    match serde_json::from_str(&contents) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(TrackError::Serialization(
            "Submission file must hold a JSON object".to_string(),
        )),
        Err(e) => Err(TrackError::Serialization(format!("Invalid JSON: {}", e))),
    }
}

// =============================================================================
// COMMAND CONTEXT
// =============================================================================

/// Configuration, session and output mode shared by every command.
pub struct CommandContext {
    pub config: StagetrackConfig,
    pub session: Option<Session>,
    pub json_mode: bool,
}

impl CommandContext {
    /// Load the configuration and resolve the session of the invocation.
    pub fn from_cli(cli: &Cli) -> Result<Self, TrackError> {
        let config = StagetrackConfig::load(&cli.config)?;
        let session = resolve_session(cli.token.as_deref(), cli.user.as_deref(), &cli.role)?;
        Ok(Self {
            config,
            session,
            json_mode: cli.json_mode,
        })
    }

    fn session(&self) -> Result<&Session, TrackError> {
        self.session.as_ref().ok_or_else(|| {
            TrackError::Config("No session: pass --token or --user".to_string())
        })
    }

    fn tracker(&self) -> Result<Tracker<HttpStageSource>, TrackError> {
        let source = HttpStageSource::from_config(&self.config)?;
        Ok(Tracker::new(
            source,
            StageRegistry::standard(),
            self.config.notice_ttl(),
        ))
    }
}

/// A token wins over `--user`; a role given with `--user` must be valid.
pub fn resolve_session(
    token: Option<&str>,
    user: Option<&str>,
    role: &str,
) -> Result<Option<Session>, TrackError> {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        return api::session_from_token(token).map(Some);
    }
    match user.map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => Ok(Some(Session::new(user, role.parse::<Role>()?))),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TrackError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TrackError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_notices(tracker: &Tracker<HttpStageSource>, session: &Session) {
    for notice in tracker.notices(session) {
        eprintln!("[{:?}] {}", notice.kind, notice.message);
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the view server.
pub async fn cmd_serve(ctx: &CommandContext, host: &str, port: u16) -> Result<(), TrackError> {
    let tracker = ctx.tracker()?;

    println!("Stagetrack View Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Services:  {}", ctx.config.api_base_url);
    match ctx.config.roster_refresh() {
        Some(period) => println!("  Roster:    refreshed every {}s", period.as_secs()),
        None => println!("  Roster:    loaded on first use"),
    }
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, tracker, ctx.config.roster_refresh()).await
}

// =============================================================================
// CATALOG COMMANDS
// =============================================================================

/// List the pipeline stages.
pub fn cmd_stages(ctx: &CommandContext) -> Result<(), TrackError> {
    let registry = StageRegistry::standard();
    if ctx.json_mode {
        let stages: Vec<api::StageSummary> =
            registry.stages().iter().map(api::StageSummary::from).collect();
        return print_json(&api::StagesResponse {
            landing: registry.landing().to_string(),
            stages,
        });
    }

    println!("Landing: {}", registry.landing());
    println!();
    for stage in registry.stages() {
        let upstream = stage.predecessor.unwrap_or("-");
        println!(
            "  {:<20} after {:<20} code {}",
            stage.name, upstream, stage.code.prefix
        );
    }
    Ok(())
}

/// Show the stages the session may reach.
pub async fn cmd_access(ctx: &CommandContext) -> Result<(), TrackError> {
    let session = ctx.session()?;
    let tracker = ctx.tracker()?;
    let access = tracker.access(session).await;
    let ordered = access.ordered(tracker.registry());
    let response = api::AccessResponse::new(&session.username, session.role, access, ordered);

    if ctx.json_mode {
        return print_json(&response);
    }
    println!("{} ({})", response.username, response.role.as_str());
    for stage in &response.stages {
        println!("  {}", stage);
    }
    Ok(())
}

// =============================================================================
// VIEW COMMANDS
// =============================================================================

/// Upstream records waiting on a stage.
pub async fn cmd_pending(ctx: &CommandContext, stage: &str, query: &str) -> Result<(), TrackError> {
    let session = ctx.session()?;
    let tracker = ctx.tracker()?;
    let view = tracker.pending(session, stage, query).await?;
    print_notices(&tracker, session);

    if ctx.json_mode {
        return print_json(&view);
    }
    print_pending(&view);
    Ok(())
}

fn print_pending(view: &PendingView) {
    println!(
        "{}: {} pending from {} ({} completed)",
        view.stage, view.total_pending, view.upstream_stage, view.completed
    );
    if !view.query.is_empty() {
        println!("  matching \"{}\": {}", view.query, view.pending.len());
    }
    for entry in &view.pending {
        println!(
            "  {:<28} {}",
            entry.code,
            entry.created_at_display.as_deref().unwrap_or("")
        );
    }
    for collision in &view.collisions {
        println!(
            "  ! code {} is shared by {} records",
            collision.code,
            collision.positions.len()
        );
    }
}

/// Records of a stage.
pub async fn cmd_history(ctx: &CommandContext, stage: &str, query: &str) -> Result<(), TrackError> {
    let session = ctx.session()?;
    let tracker = ctx.tracker()?;
    let view = tracker.history(session, stage, query).await?;
    print_notices(&tracker, session);

    if ctx.json_mode {
        return print_json(&view);
    }
    print_history(&view);
    Ok(())
}

fn print_history(view: &HistoryView) {
    println!(
        "{}: {} of {} records",
        view.stage,
        view.records.len(),
        view.total
    );
    for entry in &view.records {
        println!(
            "  {:<28} {}",
            entry.code,
            entry.created_at_display.as_deref().unwrap_or("")
        );
    }
}

/// Show one record.
pub async fn cmd_show(ctx: &CommandContext, stage: &str, id: &str) -> Result<(), TrackError> {
    let session = ctx.session()?;
    let tracker = ctx.tracker()?;
    match tracker.record(session, stage, id).await? {
        Some(record) => print_json(&record),
        None => {
            if ctx.json_mode {
                print_json(&Value::Null)
            } else {
                println!("No record {} in {}", id, stage);
                Ok(())
            }
        }
    }
}

// =============================================================================
// SUBMIT COMMAND
// =============================================================================

/// Submit a new record from a JSON file.
pub async fn cmd_submit(ctx: &CommandContext, stage: &str, file: &Path) -> Result<(), TrackError> {
    let session = ctx.session()?;
    let fields = read_submission_file(file)?;
    let tracker = ctx.tracker()?;

    let result = tracker.submit(session, stage, fields).await;
    print_notices(&tracker, session);

    let response = match &result {
        Ok(record) => api::SubmitResponse::success(record.clone()),
        Err(e) => api::SubmitResponse::error(e),
    };
    if ctx.json_mode {
        print_json(&response)?;
    } else if response.success {
        println!("Submitted to {}", stage);
    }
    result.map(|_| ())
}

// =============================================================================
// TESTS
// =============================================================================
