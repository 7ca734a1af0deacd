//! Sync session state

use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::generate_uuid;

/// One upload pass, keyed by a fresh sync ID
#[derive(Debug)]
pub struct SyncSession {
    sync_id: String,
    prior_cache_id: String,
    bytes_sent: AtomicU64,
    files_pushed: AtomicU64,
}

impl SyncSession {
    /// Start a session on top of the cache left by the previous sync
    pub fn new(prior_cache_id: impl Into<String>) -> Self {
        Self::with_id(generate_uuid(), prior_cache_id)
    }

    /// Start a session with a known sync ID
    pub fn with_id(sync_id: impl Into<String>, prior_cache_id: impl Into<String>) -> Self {
        Self {
            sync_id: sync_id.into(),
            prior_cache_id: prior_cache_id.into(),
            bytes_sent: AtomicU64::new(0),
            files_pushed: AtomicU64::new(0),
        }
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn prior_cache_id(&self) -> &str {
        &self.prior_cache_id
    }

    /// Add sent bytes, returning the session total
    pub fn add_bytes(&self, delta: u64) -> u64 {
        self.bytes_sent.fetch_add(delta, Ordering::Relaxed) + delta
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub(crate) fn file_pushed(&self) {
        self.files_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_pushed(&self) -> u64 {
        self.files_pushed.load(Ordering::Relaxed)
    }
}
