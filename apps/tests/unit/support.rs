//! Test doubles for the sync service

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use lift_apps::errors::SyncError;
use lift_apps::sync::client::{DeployStream, FileUpload, SyncClient};
use sync_api::models::{DeployRequest, DeployResponse};
use tokio::io::{AsyncReadExt, AsyncWrite};

/// A file received by the fake service
#[derive(Debug, Clone)]
pub struct PushRecord {
    pub path: String,
    pub sync_id: String,
    pub cache_id: String,
    pub contents: Vec<u8>,
}

type PushHook = Box<dyn Fn(&str) + Send + Sync>;

/// In-memory sync service with a scripted deploy stream
#[derive(Default)]
pub struct FakeSyncClient {
    pushed: Mutex<Vec<PushRecord>>,
    deploys: Mutex<Vec<DeployRequest>>,
    script: Mutex<Vec<Result<DeployResponse, SyncError>>>,
    fail_push: Option<String>,
    fail_deploy: bool,
    on_push: Option<PushHook>,
    push_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSyncClient {
    pub fn new(script: Vec<Result<DeployResponse, SyncError>>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Default::default()
        }
    }

    pub fn failing_push(mut self, path: &str) -> Self {
        self.fail_push = Some(path.to_string());
        self
    }

    pub fn failing_deploy(mut self) -> Self {
        self.fail_deploy = true;
        self
    }

    pub fn on_push(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_push = Some(Box::new(hook));
        self
    }

    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = Some(delay);
        self
    }

    pub fn pushed(&self) -> Vec<PushRecord> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn pushed_paths(&self) -> Vec<String> {
        self.pushed().into_iter().map(|r| r.path).collect()
    }

    pub fn deploys(&self) -> Vec<DeployRequest> {
        self.deploys.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncClient for FakeSyncClient {
    async fn push(&self, mut upload: FileUpload) -> Result<(), SyncError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }

        let mut contents = Vec::new();
        let read = upload.file.read_to_end(&mut contents).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        read?;

        if self.fail_push.as_deref() == Some(upload.path.as_str()) {
            return Err(SyncError::Transport(format!("rejected {}", upload.path)));
        }

        upload.options.report(contents.len() as u64);
        if let Some(hook) = &self.on_push {
            hook(&upload.path);
        }

        self.pushed.lock().unwrap().push(PushRecord {
            path: upload.path,
            sync_id: upload.options.sync_id,
            cache_id: upload.options.cache_id,
            contents,
        });
        Ok(())
    }

    async fn deploy(&self, request: DeployRequest) -> Result<Box<dyn DeployStream>, SyncError> {
        self.deploys.lock().unwrap().push(request);
        if self.fail_deploy {
            return Err(SyncError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::new(ScriptedStream(script.into())))
    }
}

/// Replays a fixed list of messages, then reports end of stream
pub struct ScriptedStream(pub VecDeque<Result<DeployResponse, SyncError>>);

#[async_trait]
impl DeployStream for ScriptedStream {
    async fn recv(&mut self) -> Result<Option<DeployResponse>, SyncError> {
        self.0.pop_front().transpose()
    }
}

/// Log sink whose contents stay readable after it was handed over
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Create files (and their parent directories) under `root`
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}
