//! Deploy command options

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWrite;

use crate::sync::client::{ProgressCallback, SyncClient};
use crate::sync::uploader::DEFAULT_UPLOAD_CONCURRENCY;

/// Options for a single deploy
pub struct DeployOptions {
    /// App explicitly selected by the user
    pub app_name: Option<String>,

    /// Root of the app's sources, defaults to the current directory
    pub app_dir: PathBuf,

    /// Client used to sync sources and deploy the app. Required.
    pub sync_client: Option<Arc<dyn SyncClient>>,

    /// Where status lines and the remote build output are written.
    /// Defaults to stdout.
    pub log_output: Box<dyn AsyncWrite + Send + Unpin>,

    /// Maximum number of files pushed at the same time
    pub upload_concurrency: usize,

    /// Called with the total bytes uploaded so far
    pub progress: Option<ProgressCallback>,
}

impl DeployOptions {
    pub fn with_app(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = dir.into();
        self
    }

    pub fn with_sync_client(mut self, client: Arc<dyn SyncClient>) -> Self {
        self.sync_client = Some(client);
        self
    }

    pub fn with_log_output(mut self, output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.log_output = Box::new(output);
        self
    }

    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            app_name: None,
            app_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            sync_client: None,
            log_output: Box::new(tokio::io::stdout()),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            progress: None,
        }
    }
}

impl fmt::Debug for DeployOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployOptions")
            .field("app_name", &self.app_name)
            .field("app_dir", &self.app_dir)
            .field("sync_client", &self.sync_client.is_some())
            .field("upload_concurrency", &self.upload_concurrency)
            .finish_non_exhaustive()
    }
}
