//! # stagetrack-core
//!
//! Production-stage tracking logic for Stagetrack - THE LOGIC.
//!
//! A steel plant moves each batch through an ordered chain of stages
//! (Register, Hot Coil, Recoiler, Pipe Mill, QC Lab, Tundish, Ladle). Every
//! stage owns its own records; a downstream record points back at the
//! upstream record it was made from through a short code. This crate works
//! out, for every adjacent pair of stages, which upstream records are still
//! waiting on the next stage, and which stages a given user may act on.
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no logging
//! - Stage knowledge lives in one table ([`registry::STANDARD_STAGES`]);
//!   the algorithms only read descriptors
//! - Records are read-only snapshots; derived views never mutate them
//! - Identity is passed in explicitly ([`Session`]), never read ambiently

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod code;
pub mod dataset;
pub mod envelope;
pub mod notice;
pub mod reconcile;
pub mod registry;
pub mod roster;
pub mod search;
pub mod submission;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Role, Session, StageRecord, StepAccess, TrackError, UserAccess};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use access::{AccessGate, RosterState, StageAccess, resolve_accessible_stages};
pub use code::{CodeCollision, EffectiveCode, derive_code, find_collisions};
pub use dataset::{Generation, StageDatasets};
pub use envelope::{ListEnvelope, normalize, records_from_body, rejection};
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use reconcile::{Reconciliation, ReconciledRecord, StageReconciler, compute_pending};
pub use registry::{CodeScheme, StageDefinition, StageRegistry};
pub use roster::{Roster, RosterRow};
pub use search::{Debouncer, SearchFilter, format_display_timestamp};
pub use submission::{SubmitLatch, prefill, prepare_submission};
