//! Document session window
//!
//! Tracks when the last document was uploaded. The document counts as active
//! for a fixed window after the upload; the first read past the window clears
//! the timestamp.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::info;

const NO_DOCUMENT: i64 = i64::MIN;

/// Process-wide document session state
///
/// Single writer (the upload path), many readers (the router).
#[derive(Debug)]
pub struct SessionState {
    /// Milliseconds since the epoch, `NO_DOCUMENT` when unset
    active_since_ms: AtomicI64,
    window_ms: i64,
}

impl SessionState {
    pub fn new(window: Duration) -> Self {
        Self {
            active_since_ms: AtomicI64::new(NO_DOCUMENT),
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Start or restart the window now
    pub fn mark_uploaded(&self) {
        self.mark_uploaded_at(Utc::now());
    }

    pub fn mark_uploaded_at(&self, at: DateTime<Utc>) {
        self.active_since_ms.store(at.timestamp_millis(), Ordering::SeqCst);
        info!(since = %at, window_secs = self.window_ms / 1000, "Document session started");
    }

    /// Whether a document is active now
    pub fn is_document_active(&self) -> bool {
        self.is_document_active_at(Utc::now())
    }

    /// Whether a document is active at `now`; an expired read clears the state
    pub fn is_document_active_at(&self, now: DateTime<Utc>) -> bool {
        let since = self.active_since_ms.load(Ordering::SeqCst);
        if since == NO_DOCUMENT {
            return false;
        }

        let elapsed_ms = now.timestamp_millis().saturating_sub(since);
        if elapsed_ms < self.window_ms {
            return true;
        }

        // A concurrent upload wins over the clear
        if self
            .active_since_ms
            .compare_exchange(since, NO_DOCUMENT, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!(elapsed_ms, "Document session expired");
        }
        false
    }

    /// Upload time, if a session is recorded
    pub fn active_since(&self) -> Option<DateTime<Utc>> {
        match self.active_since_ms.load(Ordering::SeqCst) {
            NO_DOCUMENT => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}
