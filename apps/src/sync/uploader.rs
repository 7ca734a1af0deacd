//! Source upload

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{DeployError, SyncError};
use crate::filesys::walker::{relative_path, SourceWalker};
use crate::sync::client::{FileUpload, ProgressCallback, PushOptions, SyncClient};
use crate::sync::session::SyncSession;

/// Files pushed at the same time unless configured otherwise
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

/// Outcome of a completed upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub files: u64,
    pub bytes: u64,
}

/// Pushes the files of an app tree into a sync session
pub struct SyncUploader {
    client: Arc<dyn SyncClient>,
    session: Arc<SyncSession>,
    root: PathBuf,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl SyncUploader {
    /// Create a new uploader
    pub fn new(
        client: Arc<dyn SyncClient>,
        session: Arc<SyncSession>,
        root: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            session,
            root: root.into(),
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            progress: None,
            cancel,
        }
    }

    /// Bound the number of files in flight. One pushes strictly in walk order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Receive the session's cumulative byte count as files are sent
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Push a single file, returning the bytes reported sent
    pub async fn push(&self, path: &Path) -> Result<u64, DeployError> {
        self.push_job(path.to_path_buf()).await
    }

    /// Push every file produced by `walker`.
    ///
    /// At most `concurrency` pushes run at once. The first walk or transfer
    /// error cancels the pushes still in flight and is returned; files already
    /// sent stay on the server.
    pub async fn upload(&self, mut walker: SourceWalker) -> Result<UploadSummary, DeployError> {
        info!(
            "Uploading {} (sync {}, cache {:?})",
            walker.root().display(),
            self.session.sync_id(),
            self.session.prior_cache_id()
        );

        let pool_cancel = self.cancel.child_token();
        let mut tasks: JoinSet<Result<u64, DeployError>> = JoinSet::new();
        let mut first_error: Option<DeployError> = None;

        'walk: loop {
            while tasks.len() >= self.concurrency {
                let Some(joined) = tasks.join_next().await else {
                    break;
                };
                if let Err(e) = flatten(joined) {
                    first_error = Some(e);
                    break 'walk;
                }
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    first_error = Some(DeployError::Cancelled);
                    break 'walk;
                }
                next = walker.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => {
                    first_error = Some(e);
                    break;
                }
                Some(Ok(path)) => {
                    let job = self.push_job(path);
                    let token = pool_cancel.clone();
                    tasks.spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => Err(DeployError::Cancelled),
                            result = job => result,
                        }
                    });
                }
            }
        }

        if first_error.is_none() {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = flatten(joined) {
                    first_error = Some(e);
                    break;
                }
            }
        }

        if let Some(err) = first_error {
            pool_cancel.cancel();
            tasks.shutdown().await;
            if self.cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            return Err(err);
        }

        let summary = UploadSummary {
            files: self.session.files_pushed(),
            bytes: self.session.bytes_sent(),
        };
        info!("Uploaded {} files ({} bytes)", summary.files, summary.bytes);
        Ok(summary)
    }

    fn push_job(
        &self,
        path: PathBuf,
    ) -> impl Future<Output = Result<u64, DeployError>> + Send + 'static {
        let client = self.client.clone();
        let session = self.session.clone();
        let relative = relative_path(&self.root, &path);
        let progress = self.progress.clone();

        async move {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| DeployError::Transfer {
                    path: path.clone(),
                    source: SyncError::Io(e),
                })?;

            let sent = Arc::new(AtomicU64::new(0));
            let file_progress: ProgressCallback = {
                let sent = sent.clone();
                let session = session.clone();
                Arc::new(move |file_total: u64| {
                    let previous = sent.swap(file_total, Ordering::Relaxed);
                    let total = session.add_bytes(file_total.saturating_sub(previous));
                    if let Some(progress) = &progress {
                        progress(total);
                    }
                })
            };

            debug!("Pushing {}", relative);
            let upload = FileUpload {
                path: relative,
                file,
                options: PushOptions {
                    sync_id: session.sync_id().to_string(),
                    cache_id: session.prior_cache_id().to_string(),
                    progress: Some(file_progress),
                },
            };

            client
                .push(upload)
                .await
                .map_err(|source| DeployError::Transfer { path, source })?;

            session.file_pushed();
            Ok(sent.load(Ordering::Relaxed))
        }
    }
}

fn flatten(joined: Result<Result<u64, DeployError>, JoinError>) -> Result<u64, DeployError> {
    joined.map_err(|e| DeployError::Internal(format!("upload task failed: {e}")))?
}
