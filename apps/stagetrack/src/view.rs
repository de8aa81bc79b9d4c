//! # Session Views
//!
//! Per-user view state and the fetch/reconcile/submit flows built on it.
//!
//! ## Flow of a pending view
//!
//! ```text
//! begin_fetch(upstream), begin_fetch(stage)       (generations stamped)
//!        │
//!        ▼
//! join!(roster, list(upstream), list(stage))      (concurrent)
//!        │
//!        ▼
//! access check ── denied ──► AccessDenied
//!        │
//!        ▼
//! store(...) per side                             (stale results dropped)
//!        │
//!        ▼
//! reconcile ─► search filter ─► PendingView
//! ```
//!
//! A failed fetch is not fatal: the side is treated as empty and a warning
//! notice is raised. Locks are held only between awaits, never across them.
//!
//! A submit holds its form's latch through a [`SubmitGuard`], so a submit
//! future dropped mid-request still releases it.

use crate::source::StageSource;
use serde::Serialize;
use serde_json::{Map, Value};
use stagetrack_core::code::CodeCollision;
use stagetrack_core::{
    AccessGate, EffectiveCode, Generation, NoticeBoard, NoticeKind, ReconciledRecord, RosterState,
    SearchFilter, Session, StageAccess, StageDatasets, StageDefinition, StageReconciler,
    StageRecord, StageRegistry, SubmitLatch, TrackError, derive_code, format_display_timestamp,
    prefill, prepare_submission, rejection,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

// =============================================================================
// VIEW STATE
// =============================================================================

/// Mutable state owned by one user's view.
#[derive(Debug)]
pub struct SessionView {
    datasets: StageDatasets,
    notices: NoticeBoard,
    latch: SubmitLatch,
}

impl SessionView {
    fn new(notice_ttl: Duration) -> Self {
        Self {
            datasets: StageDatasets::new(),
            notices: NoticeBoard::new(notice_ttl),
            latch: SubmitLatch::new(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Holds one form's submit latch; dropping it releases the latch.
struct SubmitGuard<'a> {
    views: &'a Mutex<BTreeMap<String, SessionView>>,
    user: String,
    stage: &'static str,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if let Some(view) = lock(self.views).get_mut(&self.user) {
            view.latch.finish(self.stage);
        }
    }
}

/// Whether `id` names a single record and nothing else.
fn is_record_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '?', '#', '%'])
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Upstream records still waiting on a stage.
#[derive(Debug, Clone, Serialize)]
pub struct PendingView {
    pub stage: String,
    pub upstream_stage: String,
    pub query: String,
    /// Pending records before the search filter.
    pub total_pending: usize,
    pub completed: usize,
    pub pending: Vec<PendingEntry>,
    pub collisions: Vec<CodeCollision>,
}

/// One pending record with the form values to act on it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEntry {
    pub code: EffectiveCode,
    pub created_at_display: Option<String>,
    pub record: StageRecord,
    pub prefill: Map<String, Value>,
}

/// A stage's own records.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub stage: String,
    pub query: String,
    pub total: usize,
    pub records: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub code: EffectiveCode,
    pub created_at_display: Option<String>,
    pub record: StageRecord,
}

/// A notice as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    pub kind: NoticeKind,
    pub message: String,
}

// =============================================================================
// TRACKER
// =============================================================================

/// Shared entry point: one source, one roster, one view per user.
pub struct Tracker<S> {
    source: S,
    registry: StageRegistry,
    roster: Mutex<RosterState>,
    /// Serializes on-demand roster loads.
    roster_load: tokio::sync::Mutex<()>,
    /// On-demand roster loads finished so far.
    roster_loads: AtomicU64,
    views: Mutex<BTreeMap<String, SessionView>>,
    notice_ttl: Duration,
}

impl<S: StageSource> Tracker<S> {
    pub fn new(source: S, registry: StageRegistry, notice_ttl: Duration) -> Self {
        Self {
            source,
            registry,
            roster: Mutex::new(RosterState::Loading),
            roster_load: tokio::sync::Mutex::new(()),
            roster_loads: AtomicU64::new(0),
            views: Mutex::new(BTreeMap::new()),
            notice_ttl,
        }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Run `f` against the view of `session`, creating it on first use.
    fn with_view<R>(&self, session: &Session, f: impl FnOnce(&mut SessionView) -> R) -> R {
        let mut views = lock(&self.views);
        let view = views
            .entry(session.username.to_lowercase())
            .or_insert_with(|| SessionView::new(self.notice_ttl));
        f(view)
    }

    fn warn(&self, session: &Session, message: String) {
        self.with_view(session, |view| view.notices.warning(message, Instant::now()));
    }

    /// Take the submit latch of `stage` for `session`.
    fn begin_submit(
        &self,
        session: &Session,
        stage: &'static str,
    ) -> Result<SubmitGuard<'_>, TrackError> {
        self.with_view(session, |view| view.latch.try_begin(stage))?;
        Ok(SubmitGuard {
            views: &self.views,
            user: session.username.to_lowercase(),
            stage,
        })
    }

    // -------------------------------------------------------------------------
    // Roster & access
    // -------------------------------------------------------------------------

    /// Fetch the roster and apply it unless a newer one is already held.
    ///
    /// A failure keeps a previously loaded roster; with none loaded yet the
    /// state becomes `Failed` and access fails closed.
    pub async fn refresh_roster(&self) {
        let fetched = self.source.roster().await;
        let mut state = lock(&self.roster);
        match fetched {
            Ok(roster) => {
                if state.version().is_some_and(|current| roster.version < current) {
                    tracing::debug!(
                        version = roster.version,
                        "Discarding roster older than the one held"
                    );
                    return;
                }
                tracing::info!(version = roster.version, users = roster.len(), "Roster loaded");
                *state = RosterState::Loaded(roster);
            }
            Err(e) => {
                tracing::warn!(event = "roster_failure", "Roster unavailable: {}", e);
                if !state.is_loaded() {
                    *state = RosterState::Failed(e.to_string());
                }
            }
        }
    }

    /// Load the roster unless one is held.
    ///
    /// A `Failed` roster is retried. Requests that arrive while a load is
    /// running wait for it instead of starting their own.
    async fn ensure_roster(&self) {
        if lock(&self.roster).is_loaded() {
            return;
        }
        let observed = self.roster_loads.load(Ordering::Acquire);
        let _loading = self.roster_load.lock().await;
        if self.roster_loads.load(Ordering::Acquire) != observed {
            return;
        }
        self.refresh_roster().await;
        self.roster_loads.fetch_add(1, Ordering::AcqRel);
    }

    /// Stages `session` may reach.
    pub async fn access(&self, session: &Session) -> StageAccess {
        self.ensure_roster().await;
        self.current_access(session)
    }

    fn current_access(&self, session: &Session) -> StageAccess {
        AccessGate::for_session(session, &lock(&self.roster), &self.registry)
    }

    fn require_access(&self, session: &Session, stage: &StageDefinition) -> Result<(), TrackError> {
        if self.current_access(session).permits(stage.name) {
            Ok(())
        } else {
            tracing::warn!(
                event = "access_denied",
                user = %session.username,
                stage = stage.name,
                "Stage access denied"
            );
            Err(TrackError::AccessDenied(stage.name.to_string()))
        }
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Store a fetch result; a failed fetch counts as an empty dataset.
    fn settle_fetch(
        &self,
        session: &Session,
        stage: &StageDefinition,
        generation: Generation,
        fetched: Result<Vec<StageRecord>, TrackError>,
    ) {
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(event = "fetch_failure", stage = stage.name, "{}", e);
                self.warn(
                    session,
                    format!(
                        "Failed to load {} data / {} डेटा लोड नहीं हो सका",
                        stage.name, stage.name
                    ),
                );
                Vec::new()
            }
        };
        let stored = self.with_view(session, |view| {
            view.datasets.store(stage.name, generation, records)
        });
        if !stored {
            tracing::debug!(
                stage = stage.name,
                generation = generation.0,
                "Discarded stale fetch"
            );
        }
    }

    /// Re-fetch `stage` and its predecessor concurrently.
    async fn fetch_pair(
        &self,
        session: &Session,
        stage: &StageDefinition,
        upstream: &StageDefinition,
    ) -> Result<(), TrackError> {
        let (up_gen, down_gen) = self.with_view(session, |view| {
            (
                view.datasets.begin_fetch(upstream.name),
                view.datasets.begin_fetch(stage.name),
            )
        });

        let ((), up, down) = tokio::join!(
            self.ensure_roster(),
            self.source.list(upstream, session),
            self.source.list(stage, session),
        );

        self.require_access(session, stage)?;
        self.settle_fetch(session, upstream, up_gen, up);
        self.settle_fetch(session, stage, down_gen, down);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// Upstream records not yet acted on by `stage_name`, filtered by `query`.
    pub async fn pending(
        &self,
        session: &Session,
        stage_name: &str,
        query: &str,
    ) -> Result<PendingView, TrackError> {
        let stage = *self.registry.require(stage_name)?;
        let upstream = *self
            .registry
            .predecessor_of(stage.name)
            .ok_or_else(|| TrackError::NoPredecessor(stage.name.to_string()))?;

        self.fetch_pair(session, &stage, &upstream).await?;

        let reconciliation = self.with_view(session, |view| {
            StageReconciler::new(&self.registry).reconcile(
                stage.name,
                view.datasets.records(upstream.name),
                view.datasets.records(stage.name),
            )
        })?;

        for collision in &reconciliation.collisions {
            tracing::warn!(
                event = "code_collision",
                stage = upstream.name,
                code = %collision.code,
                records = collision.positions.len(),
                "Several records share one short code"
            );
        }

        let filter = SearchFilter::new(&upstream, query);
        let total_pending = reconciliation.pending.len();
        let pending = reconciliation
            .pending
            .into_iter()
            .filter(|entry| filter.matches(&entry.record))
            .map(|ReconciledRecord { code, record }| PendingEntry {
                prefill: prefill(&stage, Some(code.as_str()), session),
                created_at_display: record
                    .created_at
                    .as_deref()
                    .and_then(format_display_timestamp),
                code,
                record,
            })
            .collect();

        Ok(PendingView {
            stage: stage.name.to_string(),
            upstream_stage: upstream.name.to_string(),
            query: query.trim().to_string(),
            total_pending,
            completed: reconciliation.completed.len(),
            pending,
            collisions: reconciliation.collisions,
        })
    }

    /// Records of `stage_name` itself, filtered by `query`.
    pub async fn history(
        &self,
        session: &Session,
        stage_name: &str,
        query: &str,
    ) -> Result<HistoryView, TrackError> {
        let stage = *self.registry.require(stage_name)?;
        let generation = self.with_view(session, |view| view.datasets.begin_fetch(stage.name));

        let ((), fetched) =
            tokio::join!(self.ensure_roster(), self.source.list(&stage, session));

        self.require_access(session, &stage)?;
        self.settle_fetch(session, &stage, generation, fetched);

        let filter = SearchFilter::new(&stage, query);
        let (total, records) = self.with_view(session, |view| {
            let all = view.datasets.records(stage.name);
            let records: Vec<HistoryEntry> = filter
                .apply(all)
                .into_iter()
                .map(|record| HistoryEntry {
                    code: derive_code(record, &stage.code),
                    created_at_display: record
                        .created_at
                        .as_deref()
                        .and_then(format_display_timestamp),
                    record: record.clone(),
                })
                .collect();
            (all.len(), records)
        });

        Ok(HistoryView {
            stage: stage.name.to_string(),
            query: query.trim().to_string(),
            total,
            records,
        })
    }

    /// One record of `stage_name` by id.
    pub async fn record(
        &self,
        session: &Session,
        stage_name: &str,
        id: &str,
    ) -> Result<Option<StageRecord>, TrackError> {
        let stage = *self.registry.require(stage_name)?;
        self.ensure_roster().await;
        self.require_access(session, &stage)?;
        if !is_record_id(id) {
            tracing::debug!(stage = stage.name, id, "Ignoring malformed record id");
            return Ok(None);
        }
        self.source.get(&stage, id, session).await
    }

    /// Validate and send a new record of `stage_name`.
    ///
    /// A response of `{"success": false}` is a [`TrackError::Rejected`]. On
    /// success the stage and its predecessor are re-fetched so the next
    /// pending view starts from fresh data.
    pub async fn submit(
        &self,
        session: &Session,
        stage_name: &str,
        fields: Map<String, Value>,
    ) -> Result<Value, TrackError> {
        let stage = *self.registry.require(stage_name)?;
        self.ensure_roster().await;
        self.require_access(session, &stage)?;

        let payload = prepare_submission(&stage, session, fields)?;
        let guard = self.begin_submit(session, stage.name)?;

        let created = self
            .source
            .create(&stage, payload, session)
            .await
            .and_then(|body| match rejection(&body) {
                Some(reason) => Err(TrackError::Rejected {
                    stage: stage.name.to_string(),
                    reason,
                }),
                None => Ok(body),
            });
        drop(guard);

        match created {
            Ok(body) => {
                tracing::info!(user = %session.username, stage = stage.name, "Record submitted");
                self.with_view(session, |view| {
                    view.notices.success(
                        format!(
                            "{} saved successfully / {} सफलतापूर्वक सहेजा गया",
                            stage.name, stage.name
                        ),
                        Instant::now(),
                    );
                });
                if let Some(upstream) = self.registry.predecessor_of(stage.name).copied() {
                    self.fetch_pair(session, &stage, &upstream).await?;
                } else {
                    let generation =
                        self.with_view(session, |view| view.datasets.begin_fetch(stage.name));
                    let fetched = self.source.list(&stage, session).await;
                    self.settle_fetch(session, &stage, generation, fetched);
                }
                Ok(body)
            }
            Err(e) => {
                tracing::warn!(event = "submit_failure", stage = stage.name, "{}", e);
                self.warn(
                    session,
                    format!(
                        "Failed to save {} / {} सहेजा नहीं जा सका",
                        stage.name, stage.name
                    ),
                );
                Err(e)
            }
        }
    }

    /// Notices still visible for `session`.
    pub fn notices(&self, session: &Session) -> Vec<NoticeView> {
        self.with_view(session, |view| {
            view.notices
                .active(Instant::now())
                .iter()
                .map(|n| NoticeView {
                    kind: n.kind,
                    message: n.message.clone(),
                })
                .collect()
        })
    }
}
