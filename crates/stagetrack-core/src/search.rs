//! # Search Filter
//!
//! Case-insensitive substring search over a stage's searchable fields, and
//! the debouncer that decides when a typed query is applied.
//!
//! A record matches when ANY of its searchable fields contains the query.
//! Two field names are resolved specially:
//! - `unique_code` searches the effective code, so records without a stored
//!   code are still found by their derived code
//! - `created_at` searches both the raw timestamp and its
//!   `DD-MM-YYYY HH:MM:SS` display form

use crate::StageRecord;
use crate::code::derive_code;
use crate::registry::StageDefinition;
use crate::types::{FIELD_CREATED_AT, FIELD_CREATED_AT_ALT, FIELD_UNIQUE_CODE};
use std::time::{Duration, Instant};

/// Settle time before a typed query is applied.
pub const SEARCH_SETTLE: Duration = Duration::from_millis(300);

// =============================================================================
// TIMESTAMP DISPLAY
// =============================================================================

/// Render an ISO-8601 timestamp as `DD-MM-YYYY HH:MM:SS`.
///
/// Only the leading `YYYY-MM-DD[THH:MM:SS]` part is read; time zone suffixes
/// are ignored and a missing time renders as `00:00:00`. Returns `None` when
/// the input does not start with a date in that shape.
#[must_use]
pub fn format_display_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = raw.get(..10)?;
    let mut parts = date.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    if !(year.chars().chain(month.chars()).chain(day.chars())).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let time = raw
        .get(11..19)
        .filter(|t| {
            t.len() == 8
                && t.char_indices()
                    .all(|(i, c)| if i == 2 || i == 5 { c == ':' } else { c.is_ascii_digit() })
        })
        .unwrap_or("00:00:00");

    Some(format!("{}-{}-{} {}", day, month, year, time))
}

// =============================================================================
// FILTER
// =============================================================================

/// Substring filter bound to one stage's searchable fields.
#[derive(Debug, Clone)]
pub struct SearchFilter<'s> {
    stage: &'s StageDefinition,
    needle: String,
}

impl<'s> SearchFilter<'s> {
    /// Build a filter. Surrounding whitespace of the query is ignored.
    #[must_use]
    pub fn new(stage: &'s StageDefinition, query: &str) -> Self {
        Self {
            stage,
            needle: query.trim().to_lowercase(),
        }
    }

    /// An empty query matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Check one record.
    #[must_use]
    pub fn matches(&self, record: &StageRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        self.stage
            .searchable_fields
            .iter()
            .any(|field| self.field_matches(record, field))
    }

    fn field_matches(&self, record: &StageRecord, field: &str) -> bool {
        match field {
            FIELD_UNIQUE_CODE => self.hit(derive_code(record, &self.stage.code).as_str()),
            FIELD_CREATED_AT | FIELD_CREATED_AT_ALT => record.created_at.as_deref().is_some_and(
                |raw| {
                    self.hit(raw)
                        || format_display_timestamp(raw).is_some_and(|display| self.hit(&display))
                },
            ),
            _ => record.field(field).is_some_and(|value| self.hit(&value)),
        }
    }

    fn hit(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.needle)
    }

    /// Keep the matching records, in input order.
    pub fn apply<'r, I>(&self, records: I) -> Vec<&'r StageRecord>
    where
        I: IntoIterator<Item = &'r StageRecord>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

// =============================================================================
// DEBOUNCER
// =============================================================================

/// Applies a typed query only after it has been stable for the settle time.
///
/// The caller supplies the clock, which keeps the debouncer deterministic
/// and lets one event loop drive many of them.
#[derive(Debug, Clone)]
pub struct Debouncer {
    settle: Duration,
    latest: String,
    changed_at: Option<Instant>,
    settled: String,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_SETTLE)
    }
}

impl Debouncer {
    #[must_use]
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            latest: String::new(),
            changed_at: None,
            settled: String::new(),
        }
    }

    /// Record a keystroke. Restarts the settle timer.
    pub fn push(&mut self, query: impl Into<String>, now: Instant) {
        self.latest = query.into();
        self.changed_at = Some(now);
    }

    /// Apply the latest query once it has settled.
    ///
    /// Returns the newly applied query exactly once per settle; `None` while
    /// waiting or when nothing changed.
    pub fn poll(&mut self, now: Instant) -> Option<&str> {
        let changed_at = self.changed_at?;
        if now.saturating_duration_since(changed_at) < self.settle {
            return None;
        }
        self.changed_at = None;
        if self.latest == self.settled {
            return None;
        }
        self.settled.clone_from(&self.latest);
        Some(self.settled.as_str())
    }

    /// The query currently in effect.
    #[must_use]
    pub fn settled(&self) -> &str {
        &self.settled
    }

    /// Drop any pending and applied query (used when switching views).
    pub fn clear(&mut self) {
        self.latest.clear();
        self.settled.clear();
        self.changed_at = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
