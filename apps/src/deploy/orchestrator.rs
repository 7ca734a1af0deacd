//! Deploy orchestration: sync the app's sources, deploy, stream the output

use std::sync::Arc;

use sync_api::models::DeployRequest;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::app::options::DeployOptions;
use crate::deploy::stream::DeployStreamHandler;
use crate::errors::DeployError;
use crate::filesys::walker::SourceWalker;
use crate::storage::metadata::{DeployMetadata, MetadataStore};
use crate::sync::client::SyncClient;
use crate::sync::session::SyncSession;
use crate::sync::uploader::{SyncUploader, UploadSummary};

/// Outcome of a successful deploy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub app_id: String,
    pub sync_id: String,
    pub files_pushed: u64,
    pub bytes_pushed: u64,
    pub log_messages: u64,
    pub log_bytes: u64,
}

/// Sync the app's sources, then build, release and deploy it.
///
/// The metadata file is written once the upload phase has returned, on every
/// exit path from there on, so the new cache ID and any app ID assigned by the
/// server survive a failed deploy. Nothing is written when the upload is
/// interrupted by `cancel`.
pub async fn deploy(
    options: DeployOptions,
    cancel: CancellationToken,
) -> Result<DeployReport, DeployError> {
    let DeployOptions {
        app_name,
        app_dir,
        sync_client,
        mut log_output,
        upload_concurrency,
        progress,
    } = options;

    let client = sync_client.ok_or_else(|| DeployError::Config("sync client required".to_string()))?;

    // Grab the app ID in case the app has been deployed before.
    let store = MetadataStore::new(&app_dir);
    let mut metadata = match store.read().await {
        Ok(metadata) => metadata,
        Err(e) if app_name.is_none() => {
            info!(
                "App metadata doesn't seem to exist at {}, a new app will be created: {}",
                store.path().display(),
                e
            );
            DeployMetadata::default()
        }
        Err(e) => {
            debug!("No usable app metadata, deploying to {:?}: {}", app_name, e);
            DeployMetadata::default()
        }
    };

    let session = Arc::new(SyncSession::new(metadata.cache_id.clone()));
    write_status(&mut log_output, "Syncing source files... ").await;

    let uploader = SyncUploader::new(client.clone(), session.clone(), &app_dir, cancel.clone())
        .with_concurrency(upload_concurrency)
        .with_progress(progress);
    let uploaded = uploader.upload(SourceWalker::new(&app_dir)).await;

    if let Err(DeployError::Cancelled) = uploaded {
        write_status(&mut log_output, "cancelled\n").await;
        return Err(DeployError::Cancelled);
    }

    metadata.cache_id = session.sync_id().to_string();

    let result = match uploaded {
        Ok(summary) => {
            write_status(&mut log_output, "done\n").await;
            run_deploy(
                client.as_ref(),
                &mut metadata,
                &session,
                app_name,
                summary,
                &mut log_output,
                &cancel,
            )
            .await
        }
        Err(e) => {
            write_status(&mut log_output, "failed\n").await;
            error!("failed walking source code: {}", e);
            debug!("{:?}", e);
            Err(e)
        }
    };

    persist(&store, &metadata).await;
    result
}

async fn run_deploy<W>(
    client: &dyn SyncClient,
    metadata: &mut DeployMetadata,
    session: &SyncSession,
    app_name: Option<String>,
    uploaded: UploadSummary,
    log_output: &mut W,
    cancel: &CancellationToken,
) -> Result<DeployReport, DeployError>
where
    W: AsyncWrite + Unpin + Send,
{
    let request = DeployRequest {
        app_id: metadata.app_id.clone(),
        sync_id: session.sync_id().to_string(),
        app_name,
    };
    info!(
        "Deploying app {:?} from sync {}",
        request.app_id, request.sync_id
    );

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DeployError::Cancelled),
        stream = client.deploy(request) => stream.map_err(DeployError::DeployRequest)?,
    };

    let mut handler = DeployStreamHandler::new(metadata.app_id.clone(), log_output);
    let drained = handler.drain(&mut *stream, cancel).await;

    // Keep an assigned ID even when the stream failed after assigning it.
    metadata.assign_app_id(handler.app_id());
    drop(stream);

    let summary = drained?;
    Ok(DeployReport {
        app_id: summary.app_id,
        sync_id: session.sync_id().to_string(),
        files_pushed: uploaded.files,
        bytes_pushed: uploaded.bytes,
        log_messages: summary.log_messages,
        log_bytes: summary.log_bytes,
    })
}

async fn persist(store: &MetadataStore, metadata: &DeployMetadata) {
    if let Err(e) = store.write(metadata).await {
        let err = DeployError::Persist(e);
        error!("{}", err);
        debug!("{:?}", err);
    }
}

async fn write_status<W>(output: &mut W, status: &str)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = async {
        output.write_all(status.as_bytes()).await?;
        output.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!("failed writing status line: {}", e);
    }
}
