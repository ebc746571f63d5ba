//! Cache entry restore and save against the cache service.
//!
//! Entries are keyed by the caller's key strings plus a version derived from
//! the path set, so the same key never restores an entry captured over
//! different paths. Archives travel as gzipped tars built by the system
//! archiver; paths are resolved against the workspace directory. Uploads are
//! single-stream whole-archive exchanges; the reference tooling's chunked
//! parallel transfer and Azure SDK path are deliberately not reproduced.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::archive::ArchiverInvocation;
use crate::contract::{CacheRestoreSpec, CacheSaveSpec, CacheStore};
use crate::env::{self, RunnerEnvironment};
use crate::error::ToolkitError;
use crate::http::{self, ACTIONS_API_ACCEPT};

/// Salt folded into every cache version.
const VERSION_SALT: &str = "1.0";

/// Cache store backed by `ACTIONS_CACHE_URL`.
pub struct ActionsCacheStore {
    client: Client,
    env: RunnerEnvironment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    archive_location: Option<String>,
    cache_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveBody<'a> {
    key: &'a str,
    version: &'a str,
    cache_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveResponse {
    cache_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CommitBody {
    size: u64,
}

impl ActionsCacheStore {
    /// Wires the store against a captured environment.
    pub fn new(client: Client, env: RunnerEnvironment) -> Self {
        Self { client, env }
    }

    fn base_url(&self) -> Result<Url, ToolkitError> {
        let cache = env::require(self.env.cache_url.as_ref(), "ACTIONS_CACHE_URL")?;
        Url::parse(&format!("{cache}_apis/artifactcache/")).map_err(|error| {
            ToolkitError::configuration(format!(
                "`ACTIONS_CACHE_URL` does not form a valid service URL: {error}"
            ))
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ToolkitError> {
        self.base_url()?.join(path).map_err(|error| {
            ToolkitError::internal(format!("failed to build cache endpoint `{path}`: {error}"))
        })
    }

    fn bearer(&self) -> Result<&str, ToolkitError> {
        env::require(self.env.runtime_token.as_ref(), "ACTIONS_RUNTIME_TOKEN")
    }

    /// Directory relative cache paths resolve against.
    fn workdir(&self) -> Result<Utf8PathBuf, ToolkitError> {
        match &self.env.workspace {
            Some(workspace) => Ok(workspace.clone()),
            None => {
                let cwd = std::env::current_dir().map_err(|error| {
                    ToolkitError::io("failed to resolve the working directory", error)
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

    /// Fresh scratch directory for staging one archive.
    fn staging_dir(&self) -> Result<Utf8PathBuf, ToolkitError> {
        let base = match &self.env.temp_root {
            Some(temp) => temp.clone(),
            None => Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|temp| {
                ToolkitError::internal(format!(
                    "temporary directory `{}` is not valid UTF-8",
                    temp.display()
                ))
            })?,
        };
        let staging = base.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&staging)
            .map_err(|error| ToolkitError::io(format!("failed to create `{staging}`"), error))?;
        Ok(staging)
    }
}

#[async_trait]
impl CacheStore for ActionsCacheStore {
    async fn restore(&self, spec: CacheRestoreSpec) -> Result<Option<String>, ToolkitError> {
        let version = cache_version(&spec.paths);
        let mut keys = Vec::with_capacity(spec.restore_keys.len() + 1);
        keys.push(spec.primary_key.clone());
        keys.extend(spec.restore_keys.iter().cloned());

        let mut url = self.endpoint("cache")?;
        url.query_pairs_mut()
            .append_pair("keys", &keys.join(","))
            .append_pair("version", &version);
        debug!(%url, "querying cache entry");
        let mut request = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .header(ACCEPT, ACTIONS_API_ACCEPT);
        if let Some(timeout) = spec.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|error| http::send_failure("cache query", error))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ToolkitError::http(format!(
                "cache query request returned {status}"
            )));
        }
        let entry: CacheEntry = response.json().await.map_err(|error| {
            ToolkitError::http_with("cache query response was not valid JSON", error)
        })?;
        let Some(archive_location) = entry.archive_location else {
            return Ok(None);
        };
        if spec.lookup {
            debug!("lookup only, skipping the archive transfer");
            return Ok(entry.cache_key);
        }
        let Some(key) = entry.cache_key else {
            return Err(ToolkitError::http(
                "cache query response did not include the matched key",
            ));
        };

        // The archive URL is presigned; no bearer goes with it.
        let staging = self.staging_dir()?;
        let archive = staging.join("cache.tgz");
        let mut download = self.client.get(&archive_location);
        if let Some(timeout) = spec.segment_timeout.or(spec.timeout) {
            download = download.timeout(timeout);
        }
        let response = download
            .send()
            .await
            .map_err(|error| http::send_failure("cache archive", error))?;
        let response = http::ensure_status(response, "cache archive")?;
        let bytes = http::stream_to_file(response, &archive, "cache archive").await?;
        debug!(%archive, bytes, "downloaded cache archive");

        let workdir = self.workdir()?;
        ArchiverInvocation::cache_unpack(&archive, &workdir).run().await?;
        discard_staging(&staging);
        Ok(Some(key))
    }

    async fn save(&self, spec: CacheSaveSpec) -> Result<i64, ToolkitError> {
        let version = cache_version(&spec.paths);
        // Resolve the service surface before any archiver work happens.
        let reserve_url = self.endpoint("caches")?;
        let bearer = self.bearer()?;

        let staging = self.staging_dir()?;
        let archive = staging.join("cache.tgz");
        let workdir = self.workdir()?;
        ArchiverInvocation::cache_pack(&archive, &workdir, &spec.paths)
            .run()
            .await?;
        let size = archive
            .metadata()
            .map_err(|error| ToolkitError::io(format!("failed to inspect `{archive}`"), error))?
            .len();
        debug!(%archive, size, "packed cache archive");

        let response = self
            .client
            .post(reserve_url)
            .bearer_auth(bearer)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .json(&ReserveBody {
                key: &spec.key,
                version: &version,
                cache_size: size,
            })
            .send()
            .await
            .map_err(|error| http::send_failure("cache reserve", error))?;
        let response = http::ensure_status(response, "cache reserve")?;
        let reserved: ReserveResponse = response.json().await.map_err(|error| {
            ToolkitError::http_with("cache reserve response was not valid JSON", error)
        })?;
        let Some(cache_id) = reserved.cache_id else {
            return Err(ToolkitError::http(
                "cache reserve response did not include an id; another job may hold this key",
            ));
        };

        let body = tokio::fs::read(&archive)
            .await
            .map_err(|error| ToolkitError::io(format!("failed to read `{archive}`"), error))?;
        let range = format!("bytes 0-{}/*", size.saturating_sub(1));
        let upload = self
            .client
            .patch(self.endpoint(&format!("caches/{cache_id}"))?)
            .bearer_auth(bearer)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_RANGE, range)
            .body(body)
            .send()
            .await
            .map_err(|error| http::send_failure("cache upload", error))?;
        http::ensure_status(upload, "cache upload")?;

        let commit = self
            .client
            .post(self.endpoint(&format!("caches/{cache_id}"))?)
            .bearer_auth(bearer)
            .header(ACCEPT, ACTIONS_API_ACCEPT)
            .json(&CommitBody { size })
            .send()
            .await
            .map_err(|error| http::send_failure("cache commit", error))?;
        http::ensure_status(commit, "cache commit")?;

        discard_staging(&staging);
        Ok(cache_id)
    }
}

/// Version discriminator derived from the path set.
fn cache_version(paths: &[String]) -> String {
    let mut components: Vec<&str> = paths.iter().map(String::as_str).collect();
    components.push("gzip");
    components.push(VERSION_SALT);
    let digest = Sha256::digest(components.join("|").as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Staging directories are scratch; failure to clean one is not a fault.
fn discard_staging(staging: &Utf8Path) {
    if let Err(error) = std::fs::remove_dir_all(staging) {
        warn!(%staging, %error, "failed to clean the staging directory");
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionsCacheStore, cache_version};
    use crate::contract::{CacheSaveSpec, CacheStore};
    use crate::env::RunnerEnvironment;

    #[test]
    fn versions_are_hex_digests_over_the_path_set() {
        let version = cache_version(&["target".to_owned(), ".cargo".to_owned()]);
        assert_eq!(version.len(), 64);
        assert!(version.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn versions_discriminate_path_sets_and_order() {
        let forward = cache_version(&["a".to_owned(), "b".to_owned()]);
        let reversed = cache_version(&["b".to_owned(), "a".to_owned()]);
        let shorter = cache_version(&["a".to_owned()]);
        assert_ne!(forward, reversed);
        assert_ne!(forward, shorter);
    }

    #[tokio::test]
    async fn missing_cache_url_is_a_configuration_fault() {
        let store = ActionsCacheStore::new(
            crate::http::client().expect("client builds"),
            RunnerEnvironment::default(),
        );
        let error = store
            .save(CacheSaveSpec {
                paths: vec!["target".to_owned()],
                key: "build-abc".to_owned(),
            })
            .await
            .expect_err("no cache URL configured");
        assert_eq!(
            error.to_string(),
            "environment variable `ACTIONS_CACHE_URL` is not set"
        );
    }
}
