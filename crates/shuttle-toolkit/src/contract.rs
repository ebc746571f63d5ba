//! Typed seams between the dispatcher and the platform collaborators.
//!
//! One trait per operation family. The traits speak native shapes (snake_case
//! fields, `Option` for absence); putting results on the wire is the
//! dispatcher's business. Implementations decide their own defaults for
//! absent optional inputs, so a scripted fake sees exactly what the request
//! carried.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ToolkitError;

/// One artifact fetched from the artifact service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    /// Name the artifact was stored under.
    pub artifact_name: String,
    /// Directory its files were written to.
    pub download_path: Utf8PathBuf,
}

/// Summary of one completed artifact upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifact {
    /// Name the artifact was stored under.
    pub artifact_name: String,
    /// Items that reached the service.
    pub artifact_items: Vec<Utf8PathBuf>,
    /// Total bytes uploaded.
    pub size: u64,
    /// Items skipped over after individual failures.
    pub failed_items: Vec<Utf8PathBuf>,
}

/// Everything one upload call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUploadPlan {
    /// Artifact name to store under.
    pub name: String,
    /// Files to upload.
    pub items: Vec<Utf8PathBuf>,
    /// Directory the item paths are made relative to.
    pub root_directory: Utf8PathBuf,
    /// Collect per-item failures instead of aborting on the first.
    pub continue_on_error: bool,
    /// Retention override in days.
    pub retention_days: Option<u32>,
}

/// Everything one cache restore call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRestoreSpec {
    /// Path patterns the entry was keyed over.
    pub paths: Vec<String>,
    /// Key checked for an exact match first.
    pub primary_key: String,
    /// Fallback keys matched in order.
    pub restore_keys: Vec<String>,
    /// Only report whether the entry exists; skip the transfer.
    pub lookup: bool,
    /// Overall HTTP timeout for the restore requests.
    pub timeout: Option<Duration>,
    /// Timeout for the archive transfer itself.
    pub segment_timeout: Option<Duration>,
}

/// Everything one cache save call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSaveSpec {
    /// Path patterns to capture.
    pub paths: Vec<String>,
    /// Key the entry is stored under.
    pub key: String,
}

/// Everything one tool download call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDownloadSpec {
    /// URL to fetch.
    pub url: String,
    /// Exact destination path; a fresh temporary path when absent.
    pub destination: Option<Utf8PathBuf>,
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// Additional request headers.
    pub headers: BTreeMap<String, String>,
}

/// Artifact service operations.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Downloads one named artifact.
    async fn download(
        &self,
        name: &str,
        destination: Option<&Utf8Path>,
        create_subfolder: bool,
    ) -> Result<DownloadedArtifact, ToolkitError>;

    /// Downloads every artifact of the current run.
    async fn download_all(
        &self,
        destination: Option<&Utf8Path>,
    ) -> Result<Vec<DownloadedArtifact>, ToolkitError>;

    /// Uploads files as a named artifact.
    async fn upload(&self, plan: ArtifactUploadPlan) -> Result<UploadedArtifact, ToolkitError>;
}

/// Cache service operations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restores a cache entry; `Ok(None)` is a miss, not a failure.
    async fn restore(&self, spec: CacheRestoreSpec) -> Result<Option<String>, ToolkitError>;

    /// Saves a cache entry and returns its numeric id.
    async fn save(&self, spec: CacheSaveSpec) -> Result<i64, ToolkitError>;
}

/// OpenID Connect token issuance.
#[async_trait]
pub trait TokenBroker: Send + Sync {
    /// Requests an identity token, optionally bound to an audience.
    async fn id_token(&self, audience: Option<&str>) -> Result<String, ToolkitError>;
}

/// Tool cache layout and acquisition operations.
#[async_trait]
pub trait ToolCache: Send + Sync {
    /// Files a directory's contents under `name`/`version` in the cache.
    async fn cache_directory(
        &self,
        source: &Utf8Path,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Files a single file under `name`/`version`, stored as `target`.
    async fn cache_file(
        &self,
        source: &Utf8Path,
        target: &str,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Downloads a tool distribution and returns where it landed.
    async fn download_tool(&self, spec: ToolDownloadSpec) -> Result<Utf8PathBuf, ToolkitError>;

    /// Extracts a 7-Zip archive and returns the extraction directory.
    async fn extract_seven_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        seven_zr_path: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Extracts a tar archive and returns the extraction directory.
    async fn extract_tar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Extracts a xar archive and returns the extraction directory.
    async fn extract_xar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Extracts a zip archive and returns the extraction directory.
    async fn extract_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError>;

    /// Locates one cached version; `Ok(None)` when nothing satisfies it.
    async fn find(
        &self,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Option<Utf8PathBuf>, ToolkitError>;

    /// Lists the cached versions of a tool, lowest first.
    async fn find_all_versions(
        &self,
        name: &str,
        architecture: Option<&str>,
    ) -> Result<Vec<String>, ToolkitError>;
}

/// The dispatcher's view of every collaborator at once.
pub struct Toolkit {
    artifacts: Arc<dyn ArtifactStore>,
    cache: Arc<dyn CacheStore>,
    tokens: Arc<dyn TokenBroker>,
    tools: Arc<dyn ToolCache>,
}

impl Toolkit {
    /// Bundles one implementation of each collaborator family.
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        cache: Arc<dyn CacheStore>,
        tokens: Arc<dyn TokenBroker>,
        tools: Arc<dyn ToolCache>,
    ) -> Self {
        Self {
            artifacts,
            cache,
            tokens,
            tools,
        }
    }

    /// Artifact service collaborator.
    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }

    /// Cache service collaborator.
    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    /// Token issuance collaborator.
    pub fn tokens(&self) -> &dyn TokenBroker {
        self.tokens.as_ref()
    }

    /// Tool cache collaborator.
    pub fn tools(&self) -> &dyn ToolCache {
        self.tools.as_ref()
    }
}
