//! # Code Deriver
//!
//! Resolves the canonical short code of a record.
//!
//! A stored `unique_code` is authoritative and returned unchanged. Records
//! without one get a deterministic fallback:
//!
//! ```text
//! prefix + date(8 digits of created_at) + sequence (or "X") + secondary (or "0")
//! ```
//!
//! The fallback is a display and matching aid. [`EffectiveCode`] keeps the
//! two origins apart so nothing downstream mistakes a derived code for a
//! stored one.

use crate::registry::CodeScheme;
use crate::StageRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder for a missing sequence number.
pub const MISSING_SEQUENCE: &str = "X";

/// Placeholder for a missing secondary identifier.
pub const MISSING_SECONDARY: &str = "0";

/// Number of date digits kept from `created_at`.
pub const DATE_DIGITS: usize = 8;

// =============================================================================
// EFFECTIVE CODE
// =============================================================================

/// The code a record is matched and displayed under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "code", rename_all = "snake_case")]
pub enum EffectiveCode {
    /// Stored by the owning service.
    Stored(String),
    /// Composed by [`derive_code`] because nothing was stored.
    Derived(String),
}

impl EffectiveCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EffectiveCode::Stored(code) | EffectiveCode::Derived(code) => code,
        }
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, EffectiveCode::Derived(_))
    }

    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            EffectiveCode::Stored(code) | EffectiveCode::Derived(code) => code,
        }
    }
}

impl fmt::Display for EffectiveCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// =============================================================================
// DERIVATION
// =============================================================================

/// Keep the ASCII digits of a timestamp and return the first eight.
///
/// `2024-01-15T08:30:00Z` becomes `20240115`.
#[must_use]
pub fn sanitize_date(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(DATE_DIGITS)
        .collect()
}

/// Resolve the effective code of a record.
///
/// Referentially transparent: the result depends only on the record's
/// contents and the scheme.
#[must_use]
pub fn derive_code(record: &StageRecord, scheme: &CodeScheme) -> EffectiveCode {
    if let Some(code) = &record.unique_code {
        return EffectiveCode::Stored(code.clone());
    }

    let date = record
        .created_at
        .as_deref()
        .map(sanitize_date)
        .unwrap_or_default();
    let sequence = record
        .field(scheme.sequence_field)
        .unwrap_or_else(|| MISSING_SEQUENCE.to_string());
    let secondary = record
        .field(scheme.secondary_field)
        .unwrap_or_else(|| MISSING_SECONDARY.to_string());

    EffectiveCode::Derived(format!("{}{}{}{}", scheme.prefix, date, sequence, secondary))
}

// =============================================================================
// COLLISIONS
// =============================================================================

/// Several records resolving to the same effective code, at least one of
/// them through the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCollision {
    pub code: String,
    /// Positions in the input slice, ascending.
    pub positions: Vec<usize>,
    /// Record ids at those positions (`None` where the record had none).
    pub record_ids: Vec<Option<String>>,
}

/// Report every effective code shared by more than one record where at
/// least one of the records carries a derived code.
///
/// Two stored codes that clash are a data error of the owning service and
/// are not reported here. Results are ordered by code.
#[must_use]
pub fn find_collisions(records: &[StageRecord], scheme: &CodeScheme) -> Vec<CodeCollision> {
    let mut by_code: BTreeMap<String, (bool, Vec<usize>)> = BTreeMap::new();

    for (position, record) in records.iter().enumerate() {
        let code = derive_code(record, scheme);
        let derived = code.is_derived();
        let entry = by_code.entry(code.into_string()).or_default();
        entry.0 |= derived;
        entry.1.push(position);
    }

    by_code
        .into_iter()
        .filter(|(_, (any_derived, positions))| *any_derived && positions.len() > 1)
        .map(|(code, (_, positions))| CodeCollision {
            record_ids: positions.iter().map(|&p| records[p].id.clone()).collect(),
            code,
            positions,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
