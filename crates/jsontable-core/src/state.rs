//! Latest-document container shared between the poller and the renderer.
//!
//! Every update swaps in a complete [`PanelSnapshot`], so a reader sees
//! either the state before a fetch cycle or the state after it, never a mix.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{FetchReply, ReplyOutcome, compute_hash};

/// Immutable view of a panel at one point in time.
#[derive(Debug, Clone, Default)]
pub struct PanelSnapshot {
    /// Last successfully fetched document. Survives later failures.
    pub document: Option<Arc<Value>>,
    /// SHA-256 of `document`, for change detection.
    pub data_hash: Option<String>,
    /// Message of the most recent failure; cleared on success.
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub successes: u64,
    pub failures: u64,
}

/// What [`PanelState::apply`] did with a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Reply was for a different URL.
    Ignored,
    Updated { changed: bool },
    Failed,
}

/// Thread-safe holder of the current [`PanelSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    inner: Arc<RwLock<Arc<PanelSnapshot>>>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<PanelSnapshot>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned panel state lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<PanelSnapshot>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned panel state lock");
            poisoned.into_inner()
        })
    }

    pub fn snapshot(&self) -> Arc<PanelSnapshot> {
        Arc::clone(&self.read())
    }

    /// Store a freshly fetched document. Returns true if the data changed.
    pub fn record_success(&self, document: Value) -> bool {
        let hash = compute_hash(&document.to_string());
        let now = Utc::now();

        let mut guard = self.write();
        let previous = Arc::clone(&guard);
        let changed = previous.data_hash.as_deref() != Some(hash.as_str());

        *guard = Arc::new(PanelSnapshot {
            document: Some(Arc::new(document)),
            data_hash: Some(hash),
            last_error: None,
            last_success_at: Some(now),
            last_attempt_at: Some(now),
            successes: previous.successes + 1,
            failures: previous.failures,
        });
        changed
    }

    /// Record a failed cycle, keeping the last-known-good document.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut guard = self.write();
        let previous = Arc::clone(&guard);

        *guard = Arc::new(PanelSnapshot {
            document: previous.document.clone(),
            data_hash: previous.data_hash.clone(),
            last_error: Some(error.into()),
            last_success_at: previous.last_success_at,
            last_attempt_at: Some(Utc::now()),
            successes: previous.successes,
            failures: previous.failures + 1,
        });
    }

    /// Apply a channel reply, ignoring replies addressed to another URL.
    pub fn apply(&self, reply: FetchReply, panel_url: &str) -> ApplyOutcome {
        if reply.url.as_deref() != Some(panel_url) {
            return ApplyOutcome::Ignored;
        }
        match reply.outcome {
            ReplyOutcome::Data { data } => ApplyOutcome::Updated {
                changed: self.record_success(data),
            },
            ReplyOutcome::Error { error } => {
                self.record_failure(error);
                ApplyOutcome::Failed
            }
        }
    }
}
