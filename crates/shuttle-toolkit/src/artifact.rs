//! Artifact upload and download against the pipelines service.
//!
//! The exchange follows the service's container model: an artifact is a named
//! file container. Uploading creates the container, puts each file body under
//! `itemPath`, and finalises with the total size. Downloading lists the run's
//! containers, lists a container's items, and streams the file items to disk.
//! Transfers are single-stream whole-file exchanges; the reference tooling's
//! chunked parallel transfer is deliberately not reproduced.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::contract::{ArtifactStore, ArtifactUploadPlan, DownloadedArtifact, UploadedArtifact};
use crate::env::{self, RunnerEnvironment};
use crate::error::ToolkitError;
use crate::http::{self, ACTIONS_API_ACCEPT, ACTIONS_STREAM_ACCEPT};

/// Characters the service refuses inside artifact names.
const INVALID_NAME_CHARACTERS: [char; 10] =
    ['"', ':', '<', '>', '|', '*', '?', '\r', '\n', '\\'];

/// Artifact store backed by `ACTIONS_RUNTIME_URL`.
pub struct PipelinesArtifactStore {
    client: Client,
    env: RunnerEnvironment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactContainer {
    name: String,
    file_container_resource_url: String,
}

#[derive(Debug, Deserialize)]
struct ContainerList {
    value: Vec<ArtifactContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerItem {
    path: String,
    item_type: String,
    content_location: String,
}

#[derive(Debug, Deserialize)]
struct ContainerItems {
    value: Vec<ContainerItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateContainerBody<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retention_days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FinalizeBody {
    size: u64,
}

impl PipelinesArtifactStore {
    /// Wires the store against a captured environment.
    pub fn new(client: Client, env: RunnerEnvironment) -> Self {
        Self { client, env }
    }

    fn base_url(&self) -> Result<Url, ToolkitError> {
        let runtime = env::require(self.env.runtime_url.as_ref(), "ACTIONS_RUNTIME_URL")?;
        let run_id = env::require(self.env.run_id.as_ref(), "GITHUB_RUN_ID")?;
        let raw = format!(
            "{runtime}_apis/pipelines/workflows/{run_id}/artifacts?api-version=6.0-preview"
        );
        Url::parse(&raw).map_err(|error| {
            ToolkitError::configuration(format!(
                "`ACTIONS_RUNTIME_URL` does not form a valid service URL: {error}"
            ))
        })
    }

    fn bearer(&self) -> Result<&str, ToolkitError> {
        env::require(self.env.runtime_token.as_ref(), "ACTIONS_RUNTIME_TOKEN")
    }

    async fn list_containers(&self) -> Result<Vec<ArtifactContainer>, ToolkitError> {
        let response = self
            .client
            .get(self.base_url()?)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .send()
            .await
            .map_err(|error| http::send_failure("artifact list", error))?;
        let response = http::ensure_status(response, "artifact list")?;
        let list: ContainerList = response.json().await.map_err(|error| {
            ToolkitError::http_with("artifact list response was not valid JSON", error)
        })?;
        Ok(list.value)
    }

    async fn list_items(&self, container: &ArtifactContainer) -> Result<Vec<ContainerItem>, ToolkitError> {
        let mut url = Url::parse(&container.file_container_resource_url).map_err(|error| {
            ToolkitError::http(format!(
                "artifact `{}` has an invalid container URL: {error}",
                container.name
            ))
        })?;
        url.query_pairs_mut().append_pair("itemPath", &container.name);
        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .send()
            .await
            .map_err(|error| http::send_failure("artifact items", error))?;
        let response = http::ensure_status(response, "artifact items")?;
        let items: ContainerItems = response.json().await.map_err(|error| {
            ToolkitError::http_with("artifact items response was not valid JSON", error)
        })?;
        Ok(items.value)
    }

    /// Streams a container's file items under `base`.
    ///
    /// Item paths arrive prefixed with the artifact name; `strip_root`
    /// removes that prefix so the files land directly in `base`.
    async fn fetch_container(
        &self,
        container: &ArtifactContainer,
        base: &Utf8Path,
        strip_root: bool,
    ) -> Result<(), ToolkitError> {
        for item in self.list_items(container).await? {
            if item.item_type != "file" {
                continue;
            }
            let relative = if strip_root {
                relative_item_path(&container.name, &item.path)
            } else {
                item.path.as_str()
            };
            let target = base.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|error| {
                    ToolkitError::io(format!("failed to create `{parent}`"), error)
                })?;
            }
            debug!(item = %item.path, %target, "downloading artifact item");
            let response = self
                .client
                .get(&item.content_location)
                .bearer_auth(self.bearer()?)
                .header(ACCEPT, ACTIONS_STREAM_ACCEPT)
                .send()
                .await
                .map_err(|error| http::send_failure("artifact item", error))?;
            let response = http::ensure_status(response, "artifact item")?;
            http::stream_to_file(response, &target, "artifact item").await?;
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        retention_days: Option<u32>,
    ) -> Result<ArtifactContainer, ToolkitError> {
        let body = CreateContainerBody {
            kind: "actions_storage",
            name,
            retention_days,
        };
        let response = self
            .client
            .post(self.base_url()?)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .json(&body)
            .send()
            .await
            .map_err(|error| http::send_failure("artifact create", error))?;
        let response = http::ensure_status(response, "artifact create")?;
        response.json().await.map_err(|error| {
            ToolkitError::http_with("artifact create response was not valid JSON", error)
        })
    }

    async fn put_item(
        &self,
        container: &ArtifactContainer,
        item_path: &str,
        body: Vec<u8>,
    ) -> Result<(), ToolkitError> {
        let mut url = Url::parse(&container.file_container_resource_url).map_err(|error| {
            ToolkitError::http(format!(
                "artifact `{}` has an invalid container URL: {error}",
                container.name
            ))
        })?;
        url.query_pairs_mut().append_pair("itemPath", item_path);
        let size = body.len() as u64;
        let range = format!("bytes 0-{}/{size}", size.saturating_sub(1));
        let response = self
            .client
            .put(url)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_RANGE, range)
            .body(body)
            .send()
            .await
            .map_err(|error| http::send_failure("artifact item upload", error))?;
        http::ensure_status(response, "artifact item upload")?;
        Ok(())
    }

    async fn finalize(&self, name: &str, size: u64) -> Result<(), ToolkitError> {
        let mut url = self.base_url()?;
        url.query_pairs_mut().append_pair("artifactName", name);
        let response = self
            .client
            .patch(url)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .json(&FinalizeBody { size })
            .send()
            .await
            .map_err(|error| http::send_failure("artifact finalise", error))?;
        http::ensure_status(response, "artifact finalise")?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for PipelinesArtifactStore {
    async fn download(
        &self,
        name: &str,
        destination: Option<&Utf8Path>,
        create_subfolder: bool,
    ) -> Result<DownloadedArtifact, ToolkitError> {
        let destination = resolve_destination(destination)?;
        let containers = self.list_containers().await?;
        let container = containers
            .into_iter()
            .find(|container| container.name == name)
            .ok_or_else(|| ToolkitError::not_found(format!("artifact `{name}` was not found")))?;
        self.fetch_container(&container, &destination, !create_subfolder)
            .await?;
        let download_path = if create_subfolder {
            destination.join(&container.name)
        } else {
            destination
        };
        Ok(DownloadedArtifact {
            artifact_name: container.name,
            download_path,
        })
    }

    async fn download_all(
        &self,
        destination: Option<&Utf8Path>,
    ) -> Result<Vec<DownloadedArtifact>, ToolkitError> {
        let destination = resolve_destination(destination)?;
        let mut downloads = Vec::new();
        for container in self.list_containers().await? {
            self.fetch_container(&container, &destination, false).await?;
            downloads.push(DownloadedArtifact {
                download_path: destination.join(&container.name),
                artifact_name: container.name,
            });
        }
        Ok(downloads)
    }

    async fn upload(&self, plan: ArtifactUploadPlan) -> Result<UploadedArtifact, ToolkitError> {
        check_artifact_name(&plan.name)?;
        let files = plan_upload_items(&plan.name, &plan.items, &plan.root_directory)?;
        let container = self.create_container(&plan.name, plan.retention_days).await?;

        let mut size: u64 = 0;
        let mut failed_items = Vec::new();
        for (item, item_path) in &files {
            let body = match tokio::fs::read(item).await {
                Ok(body) => body,
                Err(error) => {
                    if plan.continue_on_error {
                        warn!(%item, %error, "skipping unreadable upload item");
                        failed_items.push(item.clone());
                        continue;
                    }
                    return Err(ToolkitError::io(format!("failed to read `{item}`"), error));
                }
            };
            let body_len = body.len() as u64;
            match self.put_item(&container, item_path, body).await {
                Ok(()) => size += body_len,
                Err(error) => {
                    if plan.continue_on_error {
                        warn!(%item, %error, "skipping failed upload item");
                        failed_items.push(item.clone());
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        self.finalize(&plan.name, size).await?;
        Ok(UploadedArtifact {
            artifact_name: plan.name,
            artifact_items: files.into_iter().map(|(item, _)| item).collect(),
            size,
            failed_items,
        })
    }
}

/// Falls back to the working directory when no destination was given.
fn resolve_destination(destination: Option<&Utf8Path>) -> Result<Utf8PathBuf, ToolkitError> {
    match destination {
        Some(destination) => Ok(destination.to_owned()),
        None => {
            let cwd = std::env::current_dir().map_err(|error| {
                ToolkitError::io("failed to resolve the working directory".to_owned(), error)
            })?;
            Utf8PathBuf::from_path_buf(cwd).map_err(|cwd| {
                ToolkitError::internal(format!(
                    "working directory `{}` is not valid UTF-8",
                    cwd.display()
                ))
            })
        }
    }
}

fn check_artifact_name(name: &str) -> Result<(), ToolkitError> {
    if name.trim().is_empty() {
        return Err(ToolkitError::invalid_arguments(
            "artifact name must not be empty",
        ));
    }
    if let Some(offender) = name.chars().find(|ch| INVALID_NAME_CHARACTERS.contains(ch)) {
        return Err(ToolkitError::invalid_arguments(format!(
            "artifact name `{name}` contains the invalid character `{}`",
            offender.escape_default()
        )));
    }
    Ok(())
}

/// Pairs each uploadable file with its container item path.
///
/// Directories are skipped; files outside the root directory are refused.
fn plan_upload_items(
    artifact_name: &str,
    items: &[Utf8PathBuf],
    root_directory: &Utf8Path,
) -> Result<Vec<(Utf8PathBuf, String)>, ToolkitError> {
    let mut files = Vec::new();
    for item in items {
        let metadata = item.metadata().map_err(|error| {
            ToolkitError::io(format!("upload item `{item}` is not readable"), error)
        })?;
        if metadata.is_dir() {
            continue;
        }
        files.push((item.clone(), container_item_path(artifact_name, item, root_directory)?));
    }
    if files.is_empty() {
        return Err(ToolkitError::invalid_arguments("no files to upload"));
    }
    Ok(files)
}

/// `itemPath` value for one file: the artifact name plus the root-relative path.
fn container_item_path(
    artifact_name: &str,
    item: &Utf8Path,
    root_directory: &Utf8Path,
) -> Result<String, ToolkitError> {
    let relative = item.strip_prefix(root_directory).map_err(|_| {
        ToolkitError::invalid_arguments(format!(
            "upload item `{item}` is not under the root directory `{root_directory}`"
        ))
    })?;
    Ok(format!(
        "{artifact_name}/{}",
        relative.as_str().replace('\\', "/")
    ))
}

/// Container item paths arrive as `<artifact>/<relative>`; strips the prefix.
fn relative_item_path<'a>(artifact_name: &str, item_path: &'a str) -> &'a str {
    item_path
        .strip_prefix(artifact_name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(item_path)
}

#[cfg(test)]
mod tests {
    use camino::{Utf8Path, Utf8PathBuf};
    use rstest::rstest;
    use tempfile::TempDir;

    use super::{
        PipelinesArtifactStore, check_artifact_name, container_item_path, plan_upload_items,
        relative_item_path,
    };
    use crate::contract::ArtifactStore;
    use crate::env::RunnerEnvironment;

    #[rstest]
    #[case("web-dist", true)]
    #[case("logs 2024", true)]
    #[case("", false)]
    #[case("   ", false)]
    #[case("bad:name", false)]
    #[case("multi\nline", false)]
    fn artifact_names_are_vetted(#[case] name: &str, #[case] accepted: bool) {
        assert_eq!(check_artifact_name(name).is_ok(), accepted);
    }

    #[test]
    fn item_paths_are_rooted_at_the_artifact_name() {
        let path = container_item_path(
            "web-dist",
            Utf8Path::new("/build/out/assets/app.js"),
            Utf8Path::new("/build/out"),
        )
        .expect("item is under the root");
        assert_eq!(path, "web-dist/assets/app.js");
    }

    #[test]
    fn items_outside_the_root_are_refused() {
        let error = container_item_path(
            "web-dist",
            Utf8Path::new("/elsewhere/app.js"),
            Utf8Path::new("/build/out"),
        )
        .expect_err("item is outside the root");
        assert!(error.to_string().contains("is not under the root directory"));
    }

    #[test]
    fn directories_are_skipped_and_empty_plans_refused() {
        let stage = TempDir::new().expect("stage dir");
        let root = Utf8PathBuf::from_path_buf(stage.path().to_path_buf()).expect("utf8 temp");
        std::fs::create_dir(root.join("sub")).expect("subdir");
        std::fs::write(root.join("sub/report.txt"), b"ok").expect("file");

        let planned = plan_upload_items(
            "report",
            &[root.join("sub"), root.join("sub/report.txt")],
            &root,
        )
        .expect("one real file");
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].1, "report/sub/report.txt");

        let error = plan_upload_items("report", &[root.join("sub")], &root)
            .expect_err("directories alone upload nothing");
        assert_eq!(error.to_string(), "no files to upload");
    }

    #[rstest]
    #[case("web-dist", "web-dist/assets/app.js", "assets/app.js")]
    #[case("web-dist", "unprefixed.txt", "unprefixed.txt")]
    fn download_paths_lose_their_artifact_prefix(
        #[case] artifact: &str,
        #[case] item: &str,
        #[case] relative: &str,
    ) {
        assert_eq!(relative_item_path(artifact, item), relative);
    }

    #[tokio::test]
    async fn missing_runtime_environment_is_a_configuration_fault() {
        let store = PipelinesArtifactStore::new(
            crate::http::client().expect("client builds"),
            RunnerEnvironment::default(),
        );
        let error = store.download_all(None).await.expect_err("no runtime URL");
        assert_eq!(
            error.to_string(),
            "environment variable `ACTIONS_RUNTIME_URL` is not set"
        );
    }
}
