//! Argument types for the file endpoints
//!
//! These are serialized into the `Dropbox-API-Arg` header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path of the download endpoint on the content host
pub const FILES_DOWNLOAD_PATH: &str = "/2/files/download";

/// Path of the upload endpoint on the content host
pub const FILES_UPLOAD_PATH: &str = "/2/files/upload";

/// Path of the token revocation endpoint on the API host
pub const TOKEN_REVOKE_PATH: &str = "/2/auth/token/revoke";

/// Arguments of `/2/files/download`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DownloadArg {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// What to do when the upload target already exists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum WriteMode {
    /// Never overwrite an existing file
    #[default]
    Add,
    /// Always overwrite
    Overwrite,
    /// Overwrite only if the current revision matches
    Update { update: String },
}

/// Arguments of `/2/files/upload`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadArg {
    pub path: String,
    pub mode: WriteMode,
    pub autorename: bool,
    #[serde(serialize_with = "serialize_client_modified")]
    pub client_modified: Option<DateTime<Utc>>,
    pub mute: bool,
}

/// Dropbox timestamps carry no fractional seconds
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn serialize_client_modified<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}
