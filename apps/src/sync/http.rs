//! HTTP implementation of the sync service client

use std::time::Duration;

use async_trait::async_trait;
use futures::{TryStream, TryStreamExt};
use reqwest::{header, Body, Client, Response};
use sync_api::models::{DeployRequest, DeployResponse, ErrorResponse};
use sync_api::{CACHE_ID_HEADER, FILE_PATH_HEADER, SYNC_ID_HEADER};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};
use url::Url;

use crate::errors::SyncError;
use crate::sync::client::{DeployStream, FileUpload, SyncClient};

/// HTTP client for the sync service
pub struct HttpSyncClient {
    client: Client,
    base_url: Url,
}

impl HttpSyncClient {
    /// Create a new client rooted at `base_url`
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, SyncError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        // No overall timeout: deploy streams stay open for the whole build.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("lift-apps/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn push(&self, upload: FileUpload) -> Result<(), SyncError> {
        let url = self.endpoint("sync/files")?;
        let FileUpload {
            path,
            file,
            options,
        } = upload;
        debug!("POST {} ({})", url, path);

        let reporter = options.clone();
        let mut sent = 0u64;
        let body = Body::wrap_stream(ReaderStream::new(file).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            reporter.report(sent);
        }));

        let encoded_path: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        let response = self
            .client
            .post(url)
            .header(SYNC_ID_HEADER, options.sync_id.as_str())
            .header(CACHE_ID_HEADER, options.cache_id.as_str())
            .header(FILE_PATH_HEADER, encoded_path)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        error_for_status(response).await?;
        Ok(())
    }

    async fn deploy(&self, request: DeployRequest) -> Result<Box<dyn DeployStream>, SyncError> {
        let url = self.endpoint("apps/deploy")?;
        debug!(
            "POST {} (app {:?}, sync {})",
            url, request.app_id, request.sync_id
        );

        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/x-ndjson")
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(Box::new(NdjsonDeployStream::new(Box::pin(
            response.bytes_stream(),
        ))))
    }
}

async fn error_for_status(response: Response) -> Result<Response, SyncError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Sync service request failed: {} - {}", status, body);

    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(SyncError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Deploy stream decoded from newline-delimited JSON chunks
pub struct NdjsonDeployStream<S> {
    inner: S,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> NdjsonDeployStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl<S> DeployStream for NdjsonDeployStream<S>
where
    S: TryStream + Unpin + Send,
    S::Ok: AsRef<[u8]> + Send,
    S::Error: Into<SyncError> + Send,
{
    async fn recv(&mut self) -> Result<Option<DeployResponse>, SyncError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match decode_line(&line)? {
                    Some(message) => return Ok(Some(message)),
                    None => continue,
                }
            }

            if self.finished {
                let rest = std::mem::take(&mut self.buffer);
                return decode_line(&rest);
            }

            match self.inner.try_next().await {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Ok(None) => self.finished = true,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<DeployResponse>, SyncError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|e| SyncError::Decode(e.to_string()))
}
