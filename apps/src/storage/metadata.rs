//! Deploy metadata stored in the app's source root

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::MetadataError;
use crate::filesys::file::File;

/// Hidden file holding the metadata, relative to the app root
pub const METADATA_FILE: &str = ".lift.json";

/// Links a working directory to its remote app and the cache of its last sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployMetadata {
    /// Remote application ID. Empty until the server assigns one.
    #[serde(default)]
    pub app_id: String,

    /// Sync ID of the last upload, used by the server to diff against.
    /// Empty forces a full upload.
    #[serde(default)]
    pub cache_id: String,
}

impl DeployMetadata {
    /// Record an app ID assigned by the server.
    ///
    /// A known app ID is never replaced, and empty IDs are ignored. Returns
    /// whether the ID was recorded.
    pub fn assign_app_id(&mut self, app_id: &str) -> bool {
        if !self.app_id.is_empty() || app_id.is_empty() {
            return false;
        }
        self.app_id = app_id.to_string();
        true
    }
}

/// Reads and writes [`DeployMetadata`] for one app directory
#[derive(Debug, Clone)]
pub struct MetadataStore {
    file: File,
}

impl MetadataStore {
    /// Store for the app rooted at `app_dir`
    pub fn new(app_dir: &Path) -> Self {
        Self {
            file: File::new(app_dir.join(METADATA_FILE)),
        }
    }

    /// Location of the metadata file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Load deploy metadata
    pub async fn read(&self) -> Result<DeployMetadata, MetadataError> {
        let path = self.file.path().to_path_buf();
        let data = self.file.read_bytes().await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                MetadataError::NotFound(path.clone())
            } else {
                MetadataError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let metadata = serde_json::from_slice(&data)
            .map_err(|source| MetadataError::Parse { path, source })?;
        debug!("Loaded deploy metadata from {}", self.file.path().display());
        Ok(metadata)
    }

    /// Write deploy metadata, replacing the previous record atomically
    pub async fn write(&self, metadata: &DeployMetadata) -> Result<(), MetadataError> {
        let mut data = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut data, formatter);
        metadata
            .serialize(&mut serializer)
            .map_err(MetadataError::Encode)?;

        self.file
            .write_atomic(&data)
            .await
            .map_err(|source| MetadataError::Write {
                path: self.file.path().to_path_buf(),
                source,
            })?;
        debug!("Wrote deploy metadata to {}", self.file.path().display());
        Ok(())
    }
}
