//! # Pipeline Scenario Tests (P0-P3)
//!
//! End-to-end scenarios over the public API of the core.
//!
//! ## Tiers
//! - P0: Set Difference
//! - P1: Access Gate
//! - P2: Search and History
//! - P3: Full Chain (all seven stages, wire-shaped input)

use serde_json::json;
use stagetrack_core::{
    Role, Roster, RosterState, SearchFilter, Session, StageReconciler, StageRecord, StageRegistry,
    UserAccess, compute_pending, records_from_body, resolve_accessible_stages,
};
use stagetrack_core::registry::CodeScheme;

const SCHEME: CodeScheme = CodeScheme {
    prefix: "SMS",
    sequence_field: "sequence_number",
    secondary_field: "laddle_number",
};

// =============================================================================
// TIER P0: SET DIFFERENCE
// =============================================================================

mod p0_set_difference {
    use super::*;

    /// A referenced upstream record leaves the pending set.
    #[test]
    fn referenced_record_leaves_pending() {
        let upstream = vec![
            StageRecord::new().with_code("A1"),
            StageRecord::new().with_code("A2"),
        ];
        let downstream = vec![StageRecord::new().with_reference("sms_short_code", "A1")];

        let pending = compute_pending(&upstream, &downstream, "sms_short_code", &SCHEME);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].unique_code.as_deref(), Some("A2"));
    }

    /// Nothing downstream means everything is pending.
    #[test]
    fn empty_downstream() {
        let upstream = vec![StageRecord::new().with_code("A1")];
        let pending = compute_pending(&upstream, &[], "sms_short_code", &SCHEME);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].unique_code.as_deref(), Some("A1"));
    }

    /// Reconciling unchanged inputs twice gives the same sequence.
    #[test]
    fn reconciliation_is_idempotent() {
        let registry = StageRegistry::standard();
        let reconciler = StageReconciler::new(&registry);
        let upstream: Vec<StageRecord> = (0..20)
            .map(|i| StageRecord::new().with_code(format!("SMS{}", i)))
            .collect();
        let downstream: Vec<StageRecord> = (0..20)
            .filter(|i| i % 3 == 0)
            .map(|i| StageRecord::new().with_reference("sms_short_code", format!("SMS{}", i)))
            .collect();

        let first = reconciler
            .reconcile("Hot Coil", &upstream, &downstream)
            .expect("reconcile");
        let second = reconciler
            .reconcile("Hot Coil", &upstream, &downstream)
            .expect("reconcile");
        assert_eq!(first, second);
        assert_eq!(first.completed.len(), 7);
        assert_eq!(first.pending.len(), 13);
    }
}

// =============================================================================
// TIER P1: ACCESS GATE
// =============================================================================

mod p1_access_gate {
    use super::*;

    fn roster() -> RosterState {
        RosterState::Loaded(Roster::new(
            4,
            vec![
                UserAccess::new("asha", Role::User, "Hot Coil,QC Lab"),
                UserAccess::new("ravi", Role::User, "all"),
            ],
        ))
    }

    /// Listed steps grant exactly those declared stages.
    #[test]
    fn listed_steps() {
        let registry = StageRegistry::standard();
        let access = resolve_accessible_stages(Role::User, "asha", &roster(), &registry);
        let names: Vec<&str> = access.stages.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["Hot Coil", "QC Lab"]);
    }

    /// The "all" sentinel grants every stage.
    #[test]
    fn all_sentinel() {
        let registry = StageRegistry::standard();
        let access = resolve_accessible_stages(Role::User, "ravi", &roster(), &registry);
        assert_eq!(access.stages.len(), 7);
    }

    /// A user without a roster row reaches only the landing stage.
    #[test]
    fn unknown_user_gets_landing_only() {
        let registry = StageRegistry::standard();
        let access = resolve_accessible_stages(Role::User, "bob", &roster(), &registry);
        assert!(access.stages.is_empty());
        assert_eq!(access.ordered(&registry), vec!["Dashboard"]);
    }

    /// A malformed roster feed fails closed.
    #[test]
    fn malformed_roster_fails_closed() {
        let registry = StageRegistry::standard();
        let state = match Roster::from_gviz("<!doctype html>", 1) {
            Ok(roster) => RosterState::Loaded(roster),
            Err(e) => RosterState::Failed(e.to_string()),
        };
        let access = resolve_accessible_stages(Role::User, "asha", &state, &registry);
        assert!(access.stages.is_empty());
    }
}

// =============================================================================
// TIER P2: SEARCH AND HISTORY
// =============================================================================

mod p2_search {
    use super::*;

    /// A query hits only the record holding the value.
    #[test]
    fn temperature_query() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let history = records_from_body(
            json!({ "success": true, "data": [
                { "id": 1, "strand1_temperature": "960", "size": "2.5" },
                { "id": 2, "strand1_temperature": "955", "size": "3.0" },
                { "id": 3, "strand1_temperature": "940", "size": "3.2" }
            ]}),
            stage.link_field,
        );
        let hits = SearchFilter::new(stage, "960").apply(&history);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_deref(), Some("1"));
    }

    /// Search over the pending view composes with reconciliation.
    #[test]
    fn search_within_pending() {
        let registry = StageRegistry::standard();
        let register = registry.get("Register").expect("stage");
        let upstream = vec![
            StageRecord::new().with_code("SMS1").with_attribute("furnace_number", "F1"),
            StageRecord::new().with_code("SMS2").with_attribute("furnace_number", "F2"),
            StageRecord::new().with_code("SMS3").with_attribute("furnace_number", "F1"),
        ];
        let downstream = vec![StageRecord::new().with_reference("sms_short_code", "SMS1")];
        let pending = compute_pending(&upstream, &downstream, "sms_short_code", &register.code);

        let hits = SearchFilter::new(register, "f1").apply(pending.iter().copied());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unique_code.as_deref(), Some("SMS3"));
    }
}

// =============================================================================
// TIER P3: FULL CHAIN
// =============================================================================

mod p3_full_chain {
    use super::*;

    /// Every adjacent pair reconciles through its own link field.
    ///
    /// One batch is carried all the way to Ladle; a second stalls after Hot
    /// Coil. The stalled batch is the only pending record anywhere, and it
    /// shows up at Recoiler.
    #[test]
    fn batch_traverses_every_stage() {
        let registry = StageRegistry::standard();
        let reconciler = StageReconciler::new(&registry);

        let mut datasets: Vec<Vec<StageRecord>> = Vec::new();
        let mut carried = vec!["SMS-A".to_string(), "SMS-B".to_string()];

        for (index, stage) in registry.stages().iter().enumerate() {
            let records: Vec<StageRecord> = carried
                .iter()
                .enumerate()
                .map(|(n, upstream_code)| {
                    let own = if index == 0 {
                        upstream_code.clone()
                    } else {
                        format!("{}-{}", stage.code.prefix, n)
                    };
                    let mut record = StageRecord::new().with_code(own);
                    if let Some(link) = stage.link_field {
                        record = record.with_reference(link, upstream_code.clone());
                    }
                    record
                })
                .collect();

            carried = records
                .iter()
                .filter_map(|r| r.unique_code.clone())
                .collect();
            // Batch B stalls after Hot Coil.
            if stage.name == "Hot Coil" {
                carried.truncate(1);
            }
            datasets.push(records);
        }

        let lengths: Vec<usize> = datasets.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![2, 2, 1, 1, 1, 1, 1]);

        for (position, (upstream, downstream)) in registry.links().enumerate() {
            let result = reconciler
                .reconcile(downstream.name, &datasets[position], &datasets[position + 1])
                .expect("reconcile");
            assert_eq!(result.upstream_stage, upstream.name);
            let expected_pending = if downstream.name == "Recoiler" { 1 } else { 0 };
            assert_eq!(
                result.pending.len(),
                expected_pending,
                "pending at {}",
                downstream.name
            );
        }

        let hot_coil_pending = reconciler
            .reconcile("Recoiler", &datasets[1], &datasets[2])
            .expect("reconcile");
        assert_eq!(
            hot_coil_pending.pending[0].record.unique_code.as_deref(),
            Some("HC-1")
        );
    }

    /// Wire-shaped input with derived codes links through the chain.
    #[test]
    fn derived_codes_link_across_stages() {
        let registry = StageRegistry::standard();
        let reconciler = StageReconciler::new(&registry);

        let register = records_from_body(
            json!([
                { "id": 1, "createdAt": "2024-01-15T06:00:00Z", "sequence_number": "A", "laddle_number": 1 },
                { "id": 2, "createdAt": "2024-01-15T07:00:00Z", "sequence_number": "B", "laddle_number": 2 }
            ]),
            None,
        );
        let hot_coil = records_from_body(
            json!({ "data": { "id": 9, "sms_short_code": "SMS20240115B2" } }),
            Some("sms_short_code"),
        );

        let result = reconciler
            .reconcile("Hot Coil", &register, &hot_coil)
            .expect("reconcile");
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].code.as_str(), "SMS20240115A1");
        assert!(result.pending[0].code.is_derived());
        assert_eq!(result.completed[0].code.as_str(), "SMS20240115B2");
    }

    /// A submission prefilled from a pending record closes it.
    #[test]
    fn prefilled_submission_closes_pending() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let session = Session::new("asha", Role::User);
        let upstream = vec![StageRecord::new().with_code("SMS20240115A1")];

        let mut form = stagetrack_core::prefill(stage, Some("SMS20240115A1"), &session);
        for field in stage.required_fields {
            form.entry(field.to_string()).or_insert_with(|| json!("x"));
        }
        let payload =
            stagetrack_core::prepare_submission(stage, &session, form).expect("valid payload");
        let created = StageRecord::from_json(serde_json::Value::Object(payload), stage.link_field)
            .expect("object");

        let pending = compute_pending(&upstream, &[created], "sms_short_code", &SCHEME);
        assert!(pending.is_empty());
    }
}
