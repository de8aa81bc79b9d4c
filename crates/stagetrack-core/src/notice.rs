//! # Notices
//!
//! Transient user-facing messages. A notice is visible for [`NOTICE_TTL`]
//! after it was raised and then disappears on its own.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Visibility window of a notice.
pub const NOTICE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: Instant,
}

/// Notices of one session view, oldest first.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Duration,
    notices: Vec<Notice>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(NOTICE_TTL)
    }
}

impl NoticeBoard {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            notices: Vec::new(),
        }
    }

    /// Queue a notice. Expired ones are dropped first.
    pub fn push(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) {
        self.prune(now);
        self.notices.push(Notice {
            kind,
            message: message.into(),
            raised_at: now,
        });
    }

    pub fn success(&mut self, message: impl Into<String>, now: Instant) {
        self.push(NoticeKind::Success, message, now);
    }

    pub fn warning(&mut self, message: impl Into<String>, now: Instant) {
        self.push(NoticeKind::Warning, message, now);
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.notices
            .retain(|notice| now.saturating_duration_since(notice.raised_at) < ttl);
    }

    /// Drop expired notices and return the rest.
    pub fn active(&mut self, now: Instant) -> &[Notice] {
        self.prune(now);
        &self.notices
    }

    /// Number of queued notices, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
