//! Error types for the apps client

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error of a deploy invocation
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed walking app source at {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed pushing {path:?}: {source}")]
    Transfer {
        path: PathBuf,
        #[source]
        source: SyncError,
    },

    #[error("failed writing deploy metadata: {0}")]
    Persist(#[source] MetadataError),

    #[error("failed deploying: {0}")]
    DeployRequest(#[source] SyncError),

    #[error("{message}")]
    RemoteDeploy {
        message: String,
        app_id: Option<String>,
    },

    #[error("failed reading stream from server: {0}")]
    StreamTransport(#[source] SyncError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Whether this error ended the invocation because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeployError::Cancelled)
    }
}

/// Errors reading or writing the local deploy metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("deploy metadata not found at {0:?}")]
    NotFound(PathBuf),

    #[error("failed reading deploy metadata at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed unmarshaling deploy metadata at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed marshaling deploy metadata: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed writing deploy metadata to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the sync service client
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sync service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid message from sync service: {0}")]
    Decode(String),

    #[error("invalid sync service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(String),
}
