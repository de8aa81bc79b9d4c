//! # Submission
//!
//! Builds and validates the payload of a stage form before it is sent.
//!
//! - [`prefill`] seeds a form from the pending upstream record the user
//!   picked: the link field gets the upstream code, the operator field gets
//!   the session username.
//! - [`prepare_submission`] checks required fields, resolves the `Other`
//!   dropdown escape and stamps `submission_type`. A payload that fails here
//!   is never transmitted.
//! - [`SubmitLatch`] keeps a second submit of the same form out while the
//!   first is in flight.

use crate::registry::{OTHER_OPTION, StageDefinition};
use crate::{Session, TrackError};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Payload key naming the form the record came from.
pub const FIELD_SUBMISSION_TYPE: &str = "submission_type";

/// Free-text remarks, sent as `""` when left blank.
pub const FIELD_REMARKS: &str = "remarks";

// =============================================================================
// PREFILL
// =============================================================================

/// Initial form values for a new record of `stage`.
#[must_use]
pub fn prefill(
    stage: &StageDefinition,
    upstream_code: Option<&str>,
    session: &Session,
) -> Map<String, Value> {
    let mut fields = Map::new();
    if let (Some(link_field), Some(code)) = (stage.link_field, upstream_code) {
        fields.insert(link_field.to_string(), Value::String(code.to_string()));
    }
    if let Some(operator_field) = stage.operator_field {
        fields.insert(
            operator_field.to_string(),
            Value::String(session.username.clone()),
        );
    }
    fields
}

// =============================================================================
// VALIDATION
// =============================================================================

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Validate `fields` and return the payload to send.
///
/// Fields the session supplies (the operator field) are filled in when the
/// form left them blank. Every missing required field is reported at once,
/// in declaration order.
pub fn prepare_submission(
    stage: &StageDefinition,
    session: &Session,
    mut fields: Map<String, Value>,
) -> Result<Map<String, Value>, TrackError> {
    if let Some(operator_field) = stage.operator_field {
        if is_blank(fields.get(operator_field)) {
            fields.insert(
                operator_field.to_string(),
                Value::String(session.username.clone()),
            );
        }
    }

    let mut missing: Vec<String> = stage
        .required_fields
        .iter()
        .filter(|field| is_blank(fields.get(**field)))
        .map(|field| field.to_string())
        .collect();

    for dropdown in stage.dropdowns {
        let Some(other_field) = dropdown.other_field else {
            continue;
        };
        let chose_other = fields
            .get(dropdown.field)
            .and_then(Value::as_str)
            .is_some_and(|v| v == OTHER_OPTION);
        if !chose_other {
            fields.shift_remove(other_field);
            continue;
        }
        match fields.shift_remove(other_field) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                fields.insert(
                    dropdown.field.to_string(),
                    Value::String(text.trim().to_string()),
                );
            }
            _ => missing.push(other_field.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(TrackError::Validation {
            stage: stage.name.to_string(),
            missing,
        });
    }

    fields.insert(
        FIELD_SUBMISSION_TYPE.to_string(),
        Value::String(stage.name.to_string()),
    );
    if is_blank(fields.get(FIELD_REMARKS)) {
        fields.insert(FIELD_REMARKS.to_string(), Value::String(String::new()));
    }
    Ok(fields)
}

// =============================================================================
// LATCH
// =============================================================================

/// Stages with a submission in flight.
#[derive(Debug, Default)]
pub struct SubmitLatch {
    in_flight: BTreeSet<String>,
}

impl SubmitLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `stage` busy. Fails while an earlier submission is in flight.
    pub fn try_begin(&mut self, stage: &str) -> Result<(), TrackError> {
        if self.in_flight.insert(stage.to_string()) {
            Ok(())
        } else {
            Err(TrackError::SubmissionInFlight(stage.to_string()))
        }
    }

    /// Release `stage`, whatever the outcome of its submission.
    pub fn finish(&mut self, stage: &str) {
        self.in_flight.remove(stage);
    }

    #[must_use]
    pub fn is_busy(&self, stage: &str) -> bool {
        self.in_flight.contains(stage)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::registry::StageRegistry;
    use serde_json::json;

    fn hot_coil_form() -> Map<String, Value> {
        let value = json!({
            "sms_short_code": "SMS20240115A1",
            "size": "2.5mm",
            "mill_incharge": "Bhola",
            "quality_supervisor": "Lal Babu",
            "electrical_dc_operator": "Dharmendra",
            "strand1_temperature": "960",
            "strand2_temperature": "955",
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn session() -> Session {
        Session::new("asha", Role::User)
    }

    #[test]
    fn prefill_sets_link_and_operator() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let fields = prefill(stage, Some("SMS20240115A1"), &session());
        assert_eq!(fields.get("sms_short_code"), Some(&json!("SMS20240115A1")));
        assert_eq!(fields.get("shift_supervisor"), Some(&json!("asha")));
    }

    #[test]
    fn prefill_first_stage_has_no_link() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Register").expect("stage");
        let fields = prefill(stage, Some("ignored"), &session());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("shift_incharge"), Some(&json!("asha")));
    }

    #[test]
    fn complete_form_is_stamped() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let payload = prepare_submission(stage, &session(), hot_coil_form()).expect("valid");
        assert_eq!(payload.get("submission_type"), Some(&json!("Hot Coil")));
        assert_eq!(payload.get("remarks"), Some(&json!("")));
        assert_eq!(payload.get("shift_supervisor"), Some(&json!("asha")));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let mut form = hot_coil_form();
        form.shift_remove("size");
        form.insert("strand2_temperature".to_string(), json!("  "));

        match prepare_submission(stage, &session(), form) {
            Err(TrackError::Validation { stage, missing }) => {
                assert_eq!(stage, "Hot Coil");
                assert_eq!(missing, vec!["size", "strand2_temperature"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn other_requires_companion_text() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let mut form = hot_coil_form();
        form.insert("quality_supervisor".to_string(), json!("Other"));

        match prepare_submission(stage, &session(), form.clone()) {
            Err(TrackError::Validation { missing, .. }) => {
                assert_eq!(missing, vec!["quality_supervisor_other"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }

        form.insert("quality_supervisor_other".to_string(), json!(" Ramesh "));
        let payload = prepare_submission(stage, &session(), form).expect("valid");
        assert_eq!(payload.get("quality_supervisor"), Some(&json!("Ramesh")));
        assert!(!payload.contains_key("quality_supervisor_other"));
    }

    #[test]
    fn companion_text_dropped_without_other() {
        let registry = StageRegistry::standard();
        let stage = registry.get("Hot Coil").expect("stage");
        let mut form = hot_coil_form();
        form.insert("quality_supervisor_other".to_string(), json!("stale"));
        let payload = prepare_submission(stage, &session(), form).expect("valid");
        assert!(!payload.contains_key("quality_supervisor_other"));
        assert_eq!(payload.get("quality_supervisor"), Some(&json!("Lal Babu")));
    }

    #[test]
    fn latch_rejects_double_submit() {
        let mut latch = SubmitLatch::new();
        assert!(latch.try_begin("Hot Coil").is_ok());
        assert!(matches!(
            latch.try_begin("Hot Coil"),
            Err(TrackError::SubmissionInFlight(_))
        ));
        assert!(latch.try_begin("QC Lab").is_ok());
        latch.finish("Hot Coil");
        assert!(!latch.is_busy("Hot Coil"));
        assert!(latch.try_begin("Hot Coil").is_ok());
    }
}
