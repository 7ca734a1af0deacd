//! Deploy response stream handling

use sync_api::models::DeployResponse;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::DeployError;
use crate::sync::client::DeployStream;

/// Stream consumption state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The app has no ID yet, the server is expected to assign one
    AwaitingIdentity,

    /// App ID known, forwarding build and release output
    StreamingLogs,

    /// The server closed the stream
    Done,

    /// The server reported an error or the stream broke
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Done | StreamState::Failed)
    }
}

/// What a fully drained stream produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub app_id: String,
    pub log_messages: u64,
    pub log_bytes: u64,
}

/// Consumes a deploy stream, forwarding log output to a sink
pub struct DeployStreamHandler<'a, W> {
    state: StreamState,
    app_id: String,
    sink: &'a mut W,
    log_messages: u64,
    log_bytes: u64,
}

impl<'a, W> DeployStreamHandler<'a, W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a handler for an app whose ID may still be unknown (empty)
    pub fn new(app_id: impl Into<String>, sink: &'a mut W) -> Self {
        let app_id = app_id.into();
        let state = if app_id.is_empty() {
            StreamState::AwaitingIdentity
        } else {
            StreamState::StreamingLogs
        };

        Self {
            state,
            app_id,
            sink,
            log_messages: 0,
            log_bytes: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// App ID known so far, empty if none was assigned
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Read the stream until the server closes it or reports an error.
    ///
    /// Transport errors are returned as they are; retrying means issuing a
    /// new deploy call.
    pub async fn drain(
        &mut self,
        stream: &mut dyn DeployStream,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, DeployError> {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.state = StreamState::Failed;
                    return Err(DeployError::Cancelled);
                }
                received = stream.recv() => received,
            };

            match received {
                Ok(Some(message)) => self.handle(message).await?,
                Ok(None) => {
                    self.state = StreamState::Done;
                    debug!(
                        "Deploy stream closed after {} log messages",
                        self.log_messages
                    );
                    return Ok(self.summary());
                }
                Err(e) => {
                    self.state = StreamState::Failed;
                    return Err(DeployError::StreamTransport(e));
                }
            }
        }
    }

    /// Process one message
    pub async fn handle(&mut self, message: DeployResponse) -> Result<(), DeployError> {
        if self.state.is_terminal() {
            return Err(DeployError::Internal(format!(
                "message received in {:?} state",
                self.state
            )));
        }

        match message {
            DeployResponse::AppInfo(app) => {
                if self.state == StreamState::AwaitingIdentity && !app.id.is_empty() {
                    info!("App created with ID {}", app.id);
                    self.app_id = app.id;
                    self.state = StreamState::StreamingLogs;
                } else {
                    debug!("Ignoring app info {:?}, app ID is {:?}", app.id, self.app_id);
                }
            }
            DeployResponse::LogOutput(bytes) => {
                self.log_messages += 1;
                self.log_bytes += bytes.len() as u64;
                if let Err(e) = self.forward(&bytes).await {
                    error!("failed writing log output from server: {}", e);
                }
            }
            DeployResponse::Error(remote) => {
                self.state = StreamState::Failed;
                if let Some(details) = &remote.details {
                    debug!("Remote error details ({:?}): {}", remote.code, details);
                }
                return Err(DeployError::RemoteDeploy {
                    message: remote.message,
                    app_id: (!self.app_id.is_empty()).then(|| self.app_id.clone()),
                });
            }
        }

        Ok(())
    }

    async fn forward(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.sink.write_all(bytes).await?;
        self.sink.flush().await
    }

    fn summary(&self) -> StreamSummary {
        StreamSummary {
            app_id: self.app_id.clone(),
            log_messages: self.log_messages,
            log_bytes: self.log_bytes,
        }
    }
}
