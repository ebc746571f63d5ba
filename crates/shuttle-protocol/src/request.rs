//! Typed argument payloads decoded from the request object.
//!
//! Arguments travel in the same JSON object as `wrapperName`, so every
//! payload here decodes from the full request object and ignores the fields
//! it does not own. Wire keys are camelCase; absent optional fields take the
//! documented defaults inside the toolkit, not here.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use serde::Deserialize;

/// Arguments for the `$fail` and `$success` probe commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    /// Optional message echoed into the dispatcher's debug log.
    pub message: Option<String>,
}

/// Arguments for `artifact/download`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDownloadRequest {
    /// Name of the artifact to fetch.
    pub name: String,
    /// Directory to download into; defaults to the working directory.
    pub destination: Option<Utf8PathBuf>,
    /// Whether to nest the files under a directory named after the artifact.
    pub create_subfolder: Option<bool>,
}

/// Arguments for `artifact/download-all`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDownloadAllRequest {
    /// Directory to download into; defaults to the working directory.
    pub destination: Option<Utf8PathBuf>,
}

/// Arguments for `artifact/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUploadRequest {
    /// Name the uploaded artifact is stored under.
    pub name: String,
    /// Files to include in the artifact.
    pub items: Vec<Utf8PathBuf>,
    /// Directory the item paths are made relative to.
    pub root_directory: Utf8PathBuf,
    /// Whether individual item failures abort the upload.
    pub continue_on_error: Option<bool>,
    /// Days the artifact is retained before expiry.
    pub retention_days: Option<u32>,
}

/// Arguments for `cache/restore`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRestoreRequest {
    /// Path patterns the cache entry was keyed over.
    pub paths: Vec<String>,
    /// Key checked for an exact match first.
    pub primary_key: String,
    /// Fallback keys matched by prefix, in order.
    pub restore_keys: Option<Vec<String>>,
    /// Requested number of concurrent download streams.
    pub download_concurrency: Option<u32>,
    /// When set, only report whether the entry exists; skip the download.
    pub lookup: Option<bool>,
    /// Requested per-segment download timeout in milliseconds.
    pub segment_timeout: Option<u64>,
    /// Requested overall download timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Whether the caller asked for the Azure SDK transfer path.
    pub use_azure_sdk: Option<bool>,
}

/// Arguments for `cache/save`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSaveRequest {
    /// Path patterns to capture into the cache entry.
    pub paths: Vec<String>,
    /// Key the entry is stored under.
    pub key: String,
    /// Requested upload chunk size in bytes.
    pub upload_chunk_size: Option<u64>,
    /// Requested number of concurrent upload streams.
    pub upload_concurrency: Option<u32>,
}

/// Arguments for `open-id-connect/get-token`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcTokenRequest {
    /// Audience claim requested for the issued token.
    pub audience: Option<String>,
}

/// Arguments for `tool-cache/cache-directory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDirectoryRequest {
    /// Directory whose contents are copied into the tool cache.
    pub source: Utf8PathBuf,
    /// Tool name the entry is filed under.
    pub name: String,
    /// Version the entry is filed under.
    pub version: String,
    /// Target architecture; defaults to the host architecture.
    pub architecture: Option<String>,
}

/// Arguments for `tool-cache/cache-file`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFileRequest {
    /// File copied into the tool cache.
    pub source: Utf8PathBuf,
    /// File name the copy is stored as inside the entry.
    pub target: String,
    /// Tool name the entry is filed under.
    pub name: String,
    /// Version the entry is filed under.
    pub version: String,
    /// Target architecture; defaults to the host architecture.
    pub architecture: Option<String>,
}

/// Arguments for `tool-cache/download-tool`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadToolRequest {
    /// URL to download from.
    pub url: String,
    /// Exact path to download to; defaults to a fresh temporary path.
    pub destination: Option<Utf8PathBuf>,
    /// Value sent as the `Authorization` header, when set.
    pub authorization: Option<String>,
    /// Additional request headers.
    pub headers: Option<BTreeMap<String, String>>,
}

/// Arguments for `tool-cache/extract-7z`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSevenZipRequest {
    /// Archive to extract.
    pub file: Utf8PathBuf,
    /// Directory to extract into; defaults to a fresh temporary directory.
    pub destination: Option<Utf8PathBuf>,
    /// Path to a standalone `7zr` executable to run instead of `7z`.
    #[serde(rename = "7zrPath")]
    pub seven_zr_path: Option<Utf8PathBuf>,
}

/// Arguments for `tool-cache/extract-tar`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTarRequest {
    /// Archive to extract.
    pub file: Utf8PathBuf,
    /// Directory to extract into; defaults to a fresh temporary directory.
    pub destination: Option<Utf8PathBuf>,
    /// Flags handed to `tar`; defaults to `xz`.
    pub flags: Option<Vec<String>>,
}

/// Arguments for `tool-cache/extract-xar`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractXarRequest {
    /// Archive to extract.
    pub file: Utf8PathBuf,
    /// Directory to extract into; defaults to a fresh temporary directory.
    pub destination: Option<Utf8PathBuf>,
    /// Extra flags handed to `xar`.
    pub flags: Option<Vec<String>>,
}

/// Arguments for `tool-cache/extract-zip`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractZipRequest {
    /// Archive to extract.
    pub file: Utf8PathBuf,
    /// Directory to extract into; defaults to a fresh temporary directory.
    pub destination: Option<Utf8PathBuf>,
}

/// Arguments for `tool-cache/find`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    /// Tool name to look up.
    pub name: String,
    /// Explicit version or semver range to satisfy.
    pub version: String,
    /// Target architecture; defaults to the host architecture.
    pub architecture: Option<String>,
}

/// Arguments for `tool-cache/find-all-versions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindAllVersionsRequest {
    /// Tool name to look up.
    pub name: String,
    /// Target architecture; defaults to the host architecture.
    pub architecture: Option<String>,
}
