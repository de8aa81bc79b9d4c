//! # Stage Reconciler
//!
//! Splits an upstream stage's records into those already acted on by the
//! next stage (completed) and those still waiting (pending).
//!
//! ## Algorithm
//!
//! 1. Collect the link-field values of every downstream record into a set,
//!    skipping null and empty values.
//! 2. Resolve each upstream record's effective code (stored, or derived).
//! 3. An upstream record is pending exactly when its code is not in the set.
//!
//! Upstream order is preserved. Duplicate downstream references collapse
//! under set membership, and a downstream reference that matches nothing is
//! inert. Membership uses a `HashSet`, which is only ever queried, never
//! iterated, so output stays deterministic.
//!
//! The reconciler knows nothing about particular stages: stage *k*'s records
//! are the upstream argument when reconciling against stage *k+1*.

use crate::code::{CodeCollision, EffectiveCode, derive_code, find_collisions};
use crate::registry::{CodeScheme, StageRegistry};
use crate::{StageRecord, TrackError};
use serde::Serialize;
use std::collections::HashSet;

// =============================================================================
// SET-DIFFERENCE PRIMITIVES
// =============================================================================

/// Link values present on downstream records.
///
/// Numeric link values are kept in their decimal form.
#[must_use]
pub fn linked_codes(downstream: &[StageRecord], match_field: &str) -> HashSet<String> {
    downstream
        .iter()
        .filter_map(|record| record.field(match_field))
        .collect()
}

/// Upstream records not yet referenced by any downstream record, in
/// upstream order.
#[must_use]
pub fn compute_pending<'a>(
    upstream: &'a [StageRecord],
    downstream: &[StageRecord],
    match_field: &str,
    scheme: &CodeScheme,
) -> Vec<&'a StageRecord> {
    let linked = linked_codes(downstream, match_field);
    upstream
        .iter()
        .filter(|record| !linked.contains(derive_code(record, scheme).as_str()))
        .collect()
}

// =============================================================================
// PARTITION
// =============================================================================

/// An upstream record together with the code it was matched under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRecord {
    pub code: EffectiveCode,
    pub record: StageRecord,
}

/// Result of reconciling one adjacent pair of stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Stage whose records were partitioned.
    pub upstream_stage: String,
    /// Stage whose records did the referencing.
    pub downstream_stage: String,
    /// Upstream records with no downstream reference, upstream order.
    pub pending: Vec<ReconciledRecord>,
    /// Upstream records referenced at least once, upstream order.
    pub completed: Vec<ReconciledRecord>,
    /// Upstream codes shared by several records (see [`find_collisions`]).
    pub collisions: Vec<CodeCollision>,
}

impl Reconciliation {
    /// Pending records without their codes.
    pub fn pending_records(&self) -> impl Iterator<Item = &StageRecord> {
        self.pending.iter().map(|r| &r.record)
    }
}

/// Partition upstream records into pending and completed.
///
/// Every upstream record lands in exactly one of the two lists.
#[must_use]
pub fn partition(
    upstream: &[StageRecord],
    downstream: &[StageRecord],
    match_field: &str,
    scheme: &CodeScheme,
) -> (Vec<ReconciledRecord>, Vec<ReconciledRecord>) {
    let linked = linked_codes(downstream, match_field);
    let mut pending = Vec::new();
    let mut completed = Vec::new();

    for record in upstream {
        let code = derive_code(record, scheme);
        let entry = ReconciledRecord {
            record: record.clone(),
            code,
        };
        if linked.contains(entry.code.as_str()) {
            completed.push(entry);
        } else {
            pending.push(entry);
        }
    }

    (pending, completed)
}

// =============================================================================
// REGISTRY-DRIVEN RECONCILER
// =============================================================================

/// Reconciles adjacent stages using the descriptors of a registry.
pub struct StageReconciler<'r> {
    registry: &'r StageRegistry,
}

impl<'r> StageReconciler<'r> {
    #[must_use]
    pub fn new(registry: &'r StageRegistry) -> Self {
        Self { registry }
    }

    /// Reconcile `downstream_stage` against its predecessor.
    ///
    /// `upstream` holds the predecessor's records, `downstream` the records
    /// of `downstream_stage` itself.
    pub fn reconcile(
        &self,
        downstream_stage: &str,
        upstream: &[StageRecord],
        downstream: &[StageRecord],
    ) -> Result<Reconciliation, TrackError> {
        let stage = self.registry.require(downstream_stage)?;
        let (Some(upstream_def), Some(link_field)) =
            (self.registry.predecessor_of(stage.name), stage.link_field)
        else {
            return Err(TrackError::NoPredecessor(stage.name.to_string()));
        };

        let (pending, completed) = partition(upstream, downstream, link_field, &upstream_def.code);

        Ok(Reconciliation {
            upstream_stage: upstream_def.name.to_string(),
            downstream_stage: stage.name.to_string(),
            pending,
            completed,
            collisions: find_collisions(upstream, &upstream_def.code),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
