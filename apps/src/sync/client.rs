//! Sync service client interface

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sync_api::models::{DeployRequest, DeployResponse};

use crate::errors::SyncError;

/// Progress callback, invoked with a cumulative byte count
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Session options attached to every file push
#[derive(Clone)]
pub struct PushOptions {
    /// Sync session the file belongs to
    pub sync_id: String,

    /// Cache of the previous sync, empty for a full upload
    pub cache_id: String,

    /// Called with the bytes sent so far for this file
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for PushOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushOptions")
            .field("sync_id", &self.sync_id)
            .field("cache_id", &self.cache_id)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl PushOptions {
    /// Report progress, if anyone is listening
    pub fn report(&self, sent: u64) {
        if let Some(progress) = &self.progress {
            progress(sent);
        }
    }
}

/// A single file to push. The handle is closed when the upload is dropped.
#[derive(Debug)]
pub struct FileUpload {
    /// Path relative to the app root, `/` separated
    pub path: String,

    /// Open file to stream
    pub file: tokio::fs::File,

    /// Session options
    pub options: PushOptions,
}

/// Sync service client trait for testability
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Push one file into the sync session
    async fn push(&self, upload: FileUpload) -> Result<(), SyncError>;

    /// Start a deployment of a completed sync session
    async fn deploy(&self, request: DeployRequest) -> Result<Box<dyn DeployStream>, SyncError>;
}

/// Server-to-client deploy response stream
#[async_trait]
pub trait DeployStream: Send {
    /// Next message, `Ok(None)` once the server closed the stream
    async fn recv(&mut self) -> Result<Option<DeployResponse>, SyncError>;
}
