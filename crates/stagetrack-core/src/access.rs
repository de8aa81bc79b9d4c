//! # Access Gate
//!
//! Resolves which stages a user may view or act on.
//!
//! - Admins reach every stage, whatever the roster says.
//! - Everyone else needs a roster row matching BOTH username and role.
//!   No row, a roster that is still loading, or a roster that failed to
//!   parse all resolve to the landing stage alone (fail-closed).
//! - A row grants either `"all"` or a comma-separated list of access tags.
//!
//! The gate holds no state. It is a pure function of role, username and
//! roster, recomputed whenever the roster or role changes.

use crate::registry::StageRegistry;
use crate::roster::Roster;
use crate::{Role, Session, StepAccess};
use serde::Serialize;
use std::collections::BTreeSet;

// =============================================================================
// ROSTER STATE
// =============================================================================

/// Load state of the roster for one session view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RosterState {
    /// Fetch not finished yet.
    #[default]
    Loading,
    Loaded(Roster),
    /// Fetch or parse failed; the message is for display only.
    Failed(String),
}

impl RosterState {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, RosterState::Loaded(_))
    }

    /// Version of the loaded roster, if any.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        match self {
            RosterState::Loaded(roster) => Some(roster.version),
            _ => None,
        }
    }
}

// =============================================================================
// STAGE ACCESS
// =============================================================================

/// Stages reachable by one session.
///
/// The landing view is always reachable and kept apart from the declared
/// stages, so `stages` is exactly the granted subset of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageAccess {
    pub landing: String,
    pub stages: BTreeSet<String>,
}

impl StageAccess {
    /// Landing stage only.
    #[must_use]
    pub fn landing_only(registry: &StageRegistry) -> Self {
        Self {
            landing: registry.landing().to_string(),
            stages: BTreeSet::new(),
        }
    }

    /// Every declared stage.
    #[must_use]
    pub fn full(registry: &StageRegistry) -> Self {
        Self {
            landing: registry.landing().to_string(),
            stages: registry.names().map(str::to_string).collect(),
        }
    }

    /// Check whether a stage (or the landing view) is reachable.
    #[must_use]
    pub fn permits(&self, stage: &str) -> bool {
        stage == self.landing || self.stages.contains(stage)
    }

    /// Reachable stages in pipeline order, landing first.
    #[must_use]
    pub fn ordered(&self, registry: &StageRegistry) -> Vec<String> {
        std::iter::once(self.landing.clone())
            .chain(
                registry
                    .names()
                    .filter(|name| self.stages.contains(*name))
                    .map(str::to_string),
            )
            .collect()
    }
}

// =============================================================================
// GATE
// =============================================================================

/// Resolve the stages reachable by `username` acting as `role`.
#[must_use]
pub fn resolve_accessible_stages(
    role: Role,
    username: &str,
    roster: &RosterState,
    registry: &StageRegistry,
) -> StageAccess {
    if role.is_admin() {
        return StageAccess::full(registry);
    }

    let RosterState::Loaded(roster) = roster else {
        return StageAccess::landing_only(registry);
    };
    let Some(row) = roster.lookup(username, role) else {
        return StageAccess::landing_only(registry);
    };

    match &row.step_access {
        StepAccess::All => StageAccess::full(registry),
        steps @ StepAccess::Steps(_) => StageAccess {
            landing: registry.landing().to_string(),
            stages: registry
                .stages()
                .iter()
                .filter(|stage| steps.grants(stage.access_tag))
                .map(|stage| stage.name.to_string())
                .collect(),
        },
    }
}

/// Session-level convenience over [`resolve_accessible_stages`].
pub struct AccessGate;

impl AccessGate {
    #[must_use]
    pub fn for_session(
        session: &Session,
        roster: &RosterState,
        registry: &StageRegistry,
    ) -> StageAccess {
        resolve_accessible_stages(session.role, &session.username, roster, registry)
    }
}

// =============================================================================
// TESTS
// =============================================================================
