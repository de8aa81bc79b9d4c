//! # Property-Based Tests
//!
//! Invariants of the reconciler, code deriver and access gate, checked with
//! proptest over generated record sets.

use proptest::collection::vec;
use proptest::prelude::*;
use stagetrack_core::registry::CodeScheme;
use stagetrack_core::{
    Role, Roster, RosterState, StageRecord, StageRegistry, UserAccess, compute_pending,
    derive_code, resolve_accessible_stages,
};
use std::collections::BTreeSet;

const SCHEME: CodeScheme = CodeScheme {
    prefix: "SMS",
    sequence_field: "sequence_number",
    secondary_field: "laddle_number",
};

const LINK: &str = "sms_short_code";

fn upstream_records(codes: &[u16]) -> Vec<StageRecord> {
    codes
        .iter()
        .map(|c| StageRecord::new().with_code(format!("SMS{}", c)))
        .collect()
}

fn downstream_records(codes: &[u16]) -> Vec<StageRecord> {
    codes
        .iter()
        .map(|c| StageRecord::new().with_reference(LINK, format!("SMS{}", c)))
        .collect()
}

fn code_of(record: &StageRecord) -> String {
    derive_code(record, &SCHEME).into_string()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Pending is exactly the upstream records whose code no downstream
    /// record references.
    #[test]
    fn pending_is_set_difference(
        up in vec(0u16..200, 0..60),
        down in vec(0u16..200, 0..60),
    ) {
        let upstream = upstream_records(&up);
        let downstream = downstream_records(&down);
        let referenced: BTreeSet<u16> = down.iter().copied().collect();

        let pending = compute_pending(&upstream, &downstream, LINK, &SCHEME);
        let expected: Vec<String> = up
            .iter()
            .filter(|c| !referenced.contains(c))
            .map(|c| format!("SMS{}", c))
            .collect();
        let actual: Vec<String> = pending.iter().map(|r| code_of(r)).collect();

        prop_assert_eq!(actual, expected);
    }

    /// Pending preserves upstream order: positions are strictly increasing.
    #[test]
    fn pending_preserves_upstream_order(
        up in vec(0u16..500, 0..60),
        down in vec(0u16..500, 0..60),
    ) {
        let upstream = upstream_records(&up);
        let downstream = downstream_records(&down);
        let pending = compute_pending(&upstream, &downstream, LINK, &SCHEME);

        let positions: Vec<usize> = pending
            .iter()
            .filter_map(|p| upstream.iter().position(|u| std::ptr::eq(u, *p)))
            .collect();
        prop_assert_eq!(positions.len(), pending.len());
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    /// Repeating downstream references changes nothing.
    #[test]
    fn duplicate_references_are_idempotent(
        up in vec(0u16..100, 0..40),
        down in vec(0u16..100, 0..40),
        repeat in 2usize..4,
    ) {
        let upstream = upstream_records(&up);
        let once = downstream_records(&down);
        let many: Vec<StageRecord> = (0..repeat).flat_map(|_| once.clone()).collect();

        let a: Vec<String> = compute_pending(&upstream, &once, LINK, &SCHEME)
            .iter().map(|r| code_of(r)).collect();
        let b: Vec<String> = compute_pending(&upstream, &many, LINK, &SCHEME)
            .iter().map(|r| code_of(r)).collect();
        prop_assert_eq!(a, b);
    }

    /// Fallback codes depend only on record contents.
    #[test]
    fn derived_code_is_pure(
        date in "[0-9]{4}-[0-9]{2}-[0-9]{2}",
        sequence in "[A-Z]?",
        laddle in proptest::option::of(0u32..100),
    ) {
        let build = || {
            let mut record = StageRecord::new()
                .with_created_at(date.clone())
                .with_attribute("sequence_number", sequence.clone());
            if let Some(l) = laddle {
                record = record.with_attribute("laddle_number", l);
            }
            record
        };
        let first = derive_code(&build(), &SCHEME);
        let second = derive_code(&build(), &SCHEME);
        prop_assert!(first.is_derived());
        prop_assert!(first.as_str().starts_with("SMS"));
        prop_assert_eq!(first, second);
    }

    /// A stored code always wins over the fallback.
    #[test]
    fn stored_code_is_returned_unchanged(code in "[A-Za-z0-9-]{1,20}") {
        let record = StageRecord::new()
            .with_code(code.clone())
            .with_created_at("2024-01-15")
            .with_attribute("sequence_number", "A");
        let effective = derive_code(&record, &SCHEME);
        prop_assert!(!effective.is_derived());
        prop_assert_eq!(effective.as_str(), code.as_str());
    }

    /// Admins reach every stage whatever the roster holds.
    #[test]
    fn admin_reaches_every_stage(
        username in "[a-z]{1,8}",
        steps in "[A-Za-z ,]{0,30}",
        loaded in any::<bool>(),
    ) {
        let registry = StageRegistry::standard();
        let roster = if loaded {
            RosterState::Loaded(Roster::new(1, vec![UserAccess::new(username.clone(), Role::Admin, &steps)]))
        } else {
            RosterState::Loading
        };
        let access = resolve_accessible_stages(Role::Admin, &username, &roster, &registry);
        prop_assert_eq!(access.stages.len(), registry.len());
    }

    /// Non-admins never reach a stage their row does not grant.
    #[test]
    fn user_access_is_bounded_by_row(
        picks in vec(0usize..7, 0..7),
    ) {
        let registry = StageRegistry::standard();
        let tags: Vec<&str> = picks
            .iter()
            .filter_map(|&i| registry.stages().get(i).map(|s| s.access_tag))
            .collect();
        let roster = RosterState::Loaded(Roster::new(
            1,
            vec![UserAccess::new("asha", Role::User, &tags.join(","))],
        ));

        let access = resolve_accessible_stages(Role::User, "asha", &roster, &registry);
        let expected: BTreeSet<String> = picks
            .iter()
            .filter_map(|&i| registry.stages().get(i).map(|s| s.name.to_string()))
            .collect();
        prop_assert_eq!(access.stages, expected);
    }
}
