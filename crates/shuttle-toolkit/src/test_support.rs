//! Scripted collaborator fakes for dispatcher and workspace tests.
//!
//! Each fake pops pre-loaded results per operation and records a rendered
//! line per call, so tests can assert both what the dispatcher asked for and
//! how it shaped the answer. Running out of script is an internal error, not
//! a panic, which keeps unexpected calls visible in the failure envelope
//! under test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use crate::contract::{
    ArtifactStore, ArtifactUploadPlan, CacheRestoreSpec, CacheSaveSpec, CacheStore,
    DownloadedArtifact, TokenBroker, ToolCache, ToolDownloadSpec, Toolkit, UploadedArtifact,
};
use crate::error::ToolkitError;

/// Queue of scripted results for one operation.
pub struct Script<T>(Mutex<VecDeque<Result<T, ToolkitError>>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T> Script<T> {
    /// Queues the next result this operation will produce.
    pub fn push(&self, result: Result<T, ToolkitError>) {
        self.0.lock().expect("script mutex poisoned").push_back(result);
    }

    fn next(&self, operation: &str) -> Result<T, ToolkitError> {
        self.0
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ToolkitError::internal(format!(
                    "no scripted result for `{operation}`"
                )))
            })
    }
}

/// Rendered record of the calls a fake received.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    fn record(&self, line: String) {
        self.0.lock().expect("call log mutex poisoned").push(line);
    }

    /// Everything recorded so far, in call order.
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().expect("call log mutex poisoned").clone()
    }
}

/// Scripted artifact service.
#[derive(Default)]
pub struct ScriptedArtifacts {
    pub download: Script<DownloadedArtifact>,
    pub download_all: Script<Vec<DownloadedArtifact>>,
    pub upload: Script<UploadedArtifact>,
    pub calls: CallLog,
}

#[async_trait]
impl ArtifactStore for ScriptedArtifacts {
    async fn download(
        &self,
        name: &str,
        destination: Option<&Utf8Path>,
        create_subfolder: bool,
    ) -> Result<DownloadedArtifact, ToolkitError> {
        self.calls.record(format!(
            "download name={name} destination={destination:?} create_subfolder={create_subfolder}"
        ));
        self.download.next("artifact download")
    }

    async fn download_all(
        &self,
        destination: Option<&Utf8Path>,
    ) -> Result<Vec<DownloadedArtifact>, ToolkitError> {
        self.calls
            .record(format!("download_all destination={destination:?}"));
        self.download_all.next("artifact download_all")
    }

    async fn upload(&self, plan: ArtifactUploadPlan) -> Result<UploadedArtifact, ToolkitError> {
        self.calls.record(format!("upload {plan:?}"));
        self.upload.next("artifact upload")
    }
}

/// Scripted cache service.
#[derive(Default)]
pub struct ScriptedCache {
    pub restore: Script<Option<String>>,
    pub save: Script<i64>,
    pub calls: CallLog,
}

#[async_trait]
impl CacheStore for ScriptedCache {
    async fn restore(&self, spec: CacheRestoreSpec) -> Result<Option<String>, ToolkitError> {
        self.calls.record(format!("restore {spec:?}"));
        self.restore.next("cache restore")
    }

    async fn save(&self, spec: CacheSaveSpec) -> Result<i64, ToolkitError> {
        self.calls.record(format!("save {spec:?}"));
        self.save.next("cache save")
    }
}

/// Scripted token broker.
#[derive(Default)]
pub struct ScriptedBroker {
    pub id_token: Script<String>,
    pub calls: CallLog,
}

#[async_trait]
impl TokenBroker for ScriptedBroker {
    async fn id_token(&self, audience: Option<&str>) -> Result<String, ToolkitError> {
        self.calls.record(format!("id_token audience={audience:?}"));
        self.id_token.next("id_token")
    }
}

/// Scripted tool cache.
#[derive(Default)]
pub struct ScriptedTools {
    pub cache_directory: Script<Utf8PathBuf>,
    pub cache_file: Script<Utf8PathBuf>,
    pub download_tool: Script<Utf8PathBuf>,
    pub extract_seven_zip: Script<Utf8PathBuf>,
    pub extract_tar: Script<Utf8PathBuf>,
    pub extract_xar: Script<Utf8PathBuf>,
    pub extract_zip: Script<Utf8PathBuf>,
    pub find: Script<Option<Utf8PathBuf>>,
    pub find_all_versions: Script<Vec<String>>,
    pub calls: CallLog,
}

#[async_trait]
impl ToolCache for ScriptedTools {
    async fn cache_directory(
        &self,
        source: &Utf8Path,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!(
            "cache_directory source={source} name={name} version={version} architecture={architecture:?}"
        ));
        self.cache_directory.next("cache_directory")
    }

    async fn cache_file(
        &self,
        source: &Utf8Path,
        target: &str,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!(
            "cache_file source={source} target={target} name={name} version={version} architecture={architecture:?}"
        ));
        self.cache_file.next("cache_file")
    }

    async fn download_tool(&self, spec: ToolDownloadSpec) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!("download_tool {spec:?}"));
        self.download_tool.next("download_tool")
    }

    async fn extract_seven_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        seven_zr_path: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!(
            "extract_seven_zip file={file} destination={destination:?} seven_zr_path={seven_zr_path:?}"
        ));
        self.extract_seven_zip.next("extract_seven_zip")
    }

    async fn extract_tar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!(
            "extract_tar file={file} destination={destination:?} flags={flags:?}"
        ));
        self.extract_tar.next("extract_tar")
    }

    async fn extract_xar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls.record(format!(
            "extract_xar file={file} destination={destination:?} flags={flags:?}"
        ));
        self.extract_xar.next("extract_xar")
    }

    async fn extract_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        self.calls
            .record(format!("extract_zip file={file} destination={destination:?}"));
        self.extract_zip.next("extract_zip")
    }

    async fn find(
        &self,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Option<Utf8PathBuf>, ToolkitError> {
        self.calls.record(format!(
            "find name={name} version={version} architecture={architecture:?}"
        ));
        self.find.next("find")
    }

    async fn find_all_versions(
        &self,
        name: &str,
        architecture: Option<&str>,
    ) -> Result<Vec<String>, ToolkitError> {
        self.calls.record(format!(
            "find_all_versions name={name} architecture={architecture:?}"
        ));
        self.find_all_versions.next("find_all_versions")
    }
}

/// Scripted fakes bundled for a dispatcher under test.
#[derive(Default)]
pub struct ScriptedToolkit {
    pub artifacts: Arc<ScriptedArtifacts>,
    pub cache: Arc<ScriptedCache>,
    pub tokens: Arc<ScriptedBroker>,
    pub tools: Arc<ScriptedTools>,
}

impl ScriptedToolkit {
    /// Fresh fakes with empty scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// The toolkit view handed to the dispatcher; the fakes stay shared.
    pub fn toolkit(&self) -> Toolkit {
        Toolkit::new(
            self.artifacts.clone(),
            self.cache.clone(),
            self.tokens.clone(),
            self.tools.clone(),
        )
    }
}
