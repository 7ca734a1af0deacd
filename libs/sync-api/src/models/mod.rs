//! API models

use serde::{Deserialize, Serialize};

/// Deploy request, issued once all sources were pushed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Application to deploy. Empty asks the service to create one.
    pub app_id: String,
    /// Sync session holding the uploaded sources
    pub sync_id: String,
    /// Application name requested explicitly by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

/// Application identity assigned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Remote failure reported on the deploy stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// One message of the deploy response stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployResponse {
    AppInfo(AppInfo),
    LogOutput(#[serde(with = "base64_bytes")] Vec<u8>),
    Error(RemoteError),
}

impl DeployResponse {
    pub fn app_info(id: impl Into<String>) -> Self {
        DeployResponse::AppInfo(AppInfo {
            id: id.into(),
            name: None,
        })
    }

    pub fn log_output(bytes: impl Into<Vec<u8>>) -> Self {
        DeployResponse::LogOutput(bytes.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        DeployResponse::Error(RemoteError {
            message: message.into(),
            code: None,
            details: None,
        })
    }
}

/// Error response body returned with non-2xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Log bytes travel base64 encoded inside JSON
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
