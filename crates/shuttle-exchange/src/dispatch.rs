//! Registry dispatch from decoded requests onto the toolkit.
//!
//! One exhaustive match over the command enum: each arm marshals its typed
//! payload into the collaborator call, awaits it, and normalises the native
//! result onto the wire. The probe commands are handled here directly so the
//! exchange protocol can be exercised without any collaborator.

use std::time::Duration;

use serde_json::{Value, json};
use shuttle_protocol::{Command, ExchangeReply, Fault};
use shuttle_toolkit::{
    ArtifactUploadPlan, CacheRestoreSpec, CacheSaveSpec, ToolDownloadSpec, Toolkit,
};
use tracing::{debug, warn};

use crate::normalize;

/// Tracing target for dispatch operations.
const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Routes decoded requests onto the toolkit and shapes the reply envelope.
pub struct Dispatcher {
    toolkit: Toolkit,
}

impl Dispatcher {
    /// Builds a dispatcher over one toolkit aggregate.
    #[must_use]
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }

    /// Runs one request through decode, execution, and envelope shaping.
    ///
    /// Every fault at this level is reported through the envelope; operation
    /// failure never escalates into a process fault.
    pub async fn dispatch(&self, request: Value) -> ExchangeReply {
        let command = match Command::decode(request) {
            Ok(command) => command,
            Err(fault) => {
                warn!(target: DISPATCH_TARGET, reason = %fault.reason(), "request rejected");
                return ExchangeReply::failure(&fault);
            }
        };
        let name = command.name();
        debug!(target: DISPATCH_TARGET, command = %name, "dispatching");
        let outcome = self.execute(command).await;
        if let Err(fault) = &outcome {
            warn!(target: DISPATCH_TARGET, command = %name, reason = %fault.reason(), "command failed");
        }
        outcome.into()
    }

    async fn execute(&self, command: Command) -> Result<Value, Fault> {
        match command {
            Command::ProbeFailure(request) => {
                log_probe_message(request.message.as_deref());
                Err(Fault::verbatim("Test"))
            }
            Command::ProbeSuccess(request) => {
                log_probe_message(request.message.as_deref());
                Ok(json!("Hello, world!"))
            }
            Command::ArtifactDownload(request) => {
                let artifact = self
                    .toolkit
                    .artifacts()
                    .download(
                        &request.name,
                        request.destination.as_deref(),
                        request.create_subfolder.unwrap_or(false),
                    )
                    .await?;
                normalize::downloaded_artifact(artifact)
            }
            Command::ArtifactDownloadAll(request) => {
                let artifacts = self
                    .toolkit
                    .artifacts()
                    .download_all(request.destination.as_deref())
                    .await?;
                normalize::downloaded_artifacts(artifacts)
            }
            Command::ArtifactUpload(request) => {
                let plan = ArtifactUploadPlan {
                    name: request.name,
                    items: request.items,
                    root_directory: request.root_directory,
                    continue_on_error: request.continue_on_error.unwrap_or(true),
                    retention_days: request.retention_days,
                };
                let upload = self.toolkit.artifacts().upload(plan).await?;
                normalize::uploaded_artifact(upload)
            }
            Command::CacheRestore(request) => {
                if let Some(concurrency) = request.download_concurrency {
                    debug!(
                        target: DISPATCH_TARGET,
                        concurrency,
                        "download concurrency accepted; transfers stay single-stream"
                    );
                }
                if let Some(azure) = request.use_azure_sdk {
                    debug!(
                        target: DISPATCH_TARGET,
                        azure,
                        "azure transfer path accepted; the REST path is used"
                    );
                }
                let spec = CacheRestoreSpec {
                    paths: request.paths,
                    primary_key: request.primary_key,
                    restore_keys: request.restore_keys.unwrap_or_default(),
                    lookup: request.lookup.unwrap_or(false),
                    timeout: request.timeout.map(Duration::from_millis),
                    segment_timeout: request.segment_timeout.map(Duration::from_millis),
                };
                let key = self.toolkit.cache().restore(spec).await?;
                Ok(normalize::restored_key(key))
            }
            Command::CacheSave(request) => {
                if let Some(chunk_size) = request.upload_chunk_size {
                    debug!(
                        target: DISPATCH_TARGET,
                        chunk_size,
                        "upload chunk size accepted; the archive is sent whole"
                    );
                }
                if let Some(concurrency) = request.upload_concurrency {
                    debug!(
                        target: DISPATCH_TARGET,
                        concurrency,
                        "upload concurrency accepted; transfers stay single-stream"
                    );
                }
                let spec = CacheSaveSpec {
                    paths: request.paths,
                    key: request.key,
                };
                let id = self.toolkit.cache().save(spec).await?;
                Ok(json!(id))
            }
            Command::OidcToken(request) => {
                let token = self
                    .toolkit
                    .tokens()
                    .id_token(request.audience.as_deref())
                    .await?;
                Ok(Value::String(token))
            }
            Command::ToolCacheDirectory(request) => {
                let entry = self
                    .toolkit
                    .tools()
                    .cache_directory(
                        &request.source,
                        &request.name,
                        &request.version,
                        request.architecture.as_deref(),
                    )
                    .await?;
                Ok(normalize::tool_path(entry))
            }
            Command::ToolCacheFile(request) => {
                let entry = self
                    .toolkit
                    .tools()
                    .cache_file(
                        &request.source,
                        &request.target,
                        &request.name,
                        &request.version,
                        request.architecture.as_deref(),
                    )
                    .await?;
                Ok(normalize::tool_path(entry))
            }
            Command::ToolDownload(request) => {
                let spec = ToolDownloadSpec {
                    url: request.url,
                    destination: request.destination,
                    authorization: request.authorization,
                    headers: request.headers.unwrap_or_default(),
                };
                let file = self.toolkit.tools().download_tool(spec).await?;
                Ok(normalize::tool_path(file))
            }
            Command::ToolExtractSevenZip(request) => {
                let directory = self
                    .toolkit
                    .tools()
                    .extract_seven_zip(
                        &request.file,
                        request.destination.as_deref(),
                        request.seven_zr_path.as_deref(),
                    )
                    .await?;
                Ok(normalize::tool_path(directory))
            }
            Command::ToolExtractTar(request) => {
                let directory = self
                    .toolkit
                    .tools()
                    .extract_tar(
                        &request.file,
                        request.destination.as_deref(),
                        request.flags.as_deref(),
                    )
                    .await?;
                Ok(normalize::tool_path(directory))
            }
            Command::ToolExtractXar(request) => {
                let directory = self
                    .toolkit
                    .tools()
                    .extract_xar(
                        &request.file,
                        request.destination.as_deref(),
                        request.flags.as_deref(),
                    )
                    .await?;
                Ok(normalize::tool_path(directory))
            }
            Command::ToolExtractZip(request) => {
                let directory = self
                    .toolkit
                    .tools()
                    .extract_zip(&request.file, request.destination.as_deref())
                    .await?;
                Ok(normalize::tool_path(directory))
            }
            Command::ToolFind(request) => {
                let found = self
                    .toolkit
                    .tools()
                    .find(
                        &request.name,
                        &request.version,
                        request.architecture.as_deref(),
                    )
                    .await?;
                Ok(normalize::found_tool(found))
            }
            Command::ToolFindAllVersions(request) => {
                let listed = self
                    .toolkit
                    .tools()
                    .find_all_versions(&request.name, request.architecture.as_deref())
                    .await?;
                Ok(normalize::versions(listed))
            }
        }
    }
}

fn log_probe_message(message: Option<&str>) {
    if let Some(message) = message {
        debug!(target: DISPATCH_TARGET, message, "probe message");
    }
}
