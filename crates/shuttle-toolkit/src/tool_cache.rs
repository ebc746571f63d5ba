//! Persistent tool cache layout, lookup, and acquisition.
//!
//! The cache lives under `RUNNER_TOOL_CACHE` as
//! `<root>/<name>/<version>/<architecture>`, with an empty
//! `<architecture>.complete` marker written beside the directory once it is
//! fully populated. Entries without their marker are treated as absent, so a
//! crashed population never serves a half-written tool.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use semver::{Version, VersionReq};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::archive::ArchiverInvocation;
use crate::contract::{ToolCache, ToolDownloadSpec};
use crate::env::{self, RunnerEnvironment};
use crate::error::ToolkitError;
use crate::http;

/// Tool cache backed by the runner's directories.
pub struct RunnerToolCache {
    client: Client,
    env: RunnerEnvironment,
}

impl RunnerToolCache {
    /// Wires the cache against a captured environment.
    pub fn new(client: Client, env: RunnerEnvironment) -> Self {
        Self { client, env }
    }

    fn root(&self) -> Result<&Utf8Path, ToolkitError> {
        env::require_path(self.env.tool_cache_root.as_ref(), "RUNNER_TOOL_CACHE")
    }

    fn temp(&self) -> Result<&Utf8Path, ToolkitError> {
        env::require_path(self.env.temp_root.as_ref(), "RUNNER_TEMP")
    }

    fn fresh_temp_path(&self) -> Result<Utf8PathBuf, ToolkitError> {
        Ok(self.temp()?.join(Uuid::new_v4().to_string()))
    }

    /// Clears and recreates one entry directory, dropping any stale marker.
    fn prepare_entry(
        &self,
        name: &str,
        version: &str,
        architecture: &str,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let entry = tool_dir(self.root()?, name, &stored_version(version), architecture);
        remove_if_present(&entry)?;
        let marker = marker_path(&entry);
        if marker.is_file() {
            std::fs::remove_file(&marker)
                .map_err(|error| ToolkitError::io(format!("failed to remove `{marker}`"), error))?;
        }
        std::fs::create_dir_all(&entry)
            .map_err(|error| ToolkitError::io(format!("failed to create `{entry}`"), error))?;
        Ok(entry)
    }

    /// Resolves the extraction directory, creating it if needed.
    fn extraction_dir(
        &self,
        destination: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let directory = match destination {
            Some(destination) => destination.to_owned(),
            None => self.fresh_temp_path()?,
        };
        std::fs::create_dir_all(&directory)
            .map_err(|error| ToolkitError::io(format!("failed to create `{directory}`"), error))?;
        Ok(directory)
    }

    /// Complete versions of one tool for one architecture, lowest first.
    fn list_versions(&self, name: &str, architecture: &str) -> Result<Vec<String>, ToolkitError> {
        let tool_root = self.root()?.join(name);
        if !tool_root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = tool_root
            .read_dir_utf8()
            .map_err(|error| ToolkitError::io(format!("failed to list `{tool_root}`"), error))?;
        let mut versions: Vec<(Version, String)> = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|error| ToolkitError::io(format!("failed to list `{tool_root}`"), error))?;
            let Some(parsed) = explicit_version(entry.file_name()) else {
                continue;
            };
            let arch_dir = entry.path().join(architecture);
            if arch_dir.is_dir() && marker_path(&arch_dir).is_file() {
                versions.push((parsed, entry.file_name().to_owned()));
            }
        }
        versions.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(versions.into_iter().map(|(_, raw)| raw).collect())
    }
}

#[async_trait]
impl ToolCache for RunnerToolCache {
    async fn cache_directory(
        &self,
        source: &Utf8Path,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        if !source.is_dir() {
            return Err(ToolkitError::invalid_arguments(format!(
                "source `{source}` is not a directory"
            )));
        }
        let architecture = architecture.unwrap_or(default_architecture());
        let entry = self.prepare_entry(name, version, architecture)?;
        copy_tree(source, &entry)?;
        complete_entry(&entry)?;
        debug!(%source, %entry, "cached tool directory");
        Ok(entry)
    }

    async fn cache_file(
        &self,
        source: &Utf8Path,
        target: &str,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        if !source.is_file() {
            return Err(ToolkitError::invalid_arguments(format!(
                "source `{source}` is not a file"
            )));
        }
        let architecture = architecture.unwrap_or(default_architecture());
        let entry = self.prepare_entry(name, version, architecture)?;
        let stored = entry.join(target);
        std::fs::copy(source, &stored)
            .map_err(|error| ToolkitError::io(format!("failed to copy into `{stored}`"), error))?;
        complete_entry(&entry)?;
        debug!(%source, %entry, "cached tool file");
        Ok(entry)
    }

    async fn download_tool(&self, spec: ToolDownloadSpec) -> Result<Utf8PathBuf, ToolkitError> {
        Url::parse(&spec.url).map_err(|error| {
            ToolkitError::invalid_arguments(format!("invalid download URL `{}`: {error}", spec.url))
        })?;
        let destination = match spec.destination {
            Some(destination) => destination,
            None => self.fresh_temp_path()?,
        };
        if destination.symlink_metadata().is_ok() {
            return Err(ToolkitError::invalid_arguments(format!(
                "destination `{destination}` already exists"
            )));
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                ToolkitError::io(format!("failed to create `{parent}`"), error)
            })?;
        }

        let mut request = self.client.get(&spec.url);
        if let Some(authorization) = &spec.authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        for (header, value) in &spec.headers {
            request = request.header(header.as_str(), value.as_str());
        }
        debug!(url = %spec.url, %destination, "downloading tool");
        let response = request
            .send()
            .await
            .map_err(|error| http::send_failure("tool download", error))?;
        let response = http::ensure_status(response, "tool download")?;

        // Land next to the destination, then rename once the stream is done.
        let partial = Utf8PathBuf::from(format!("{destination}.partial"));
        http::stream_to_file(response, &partial, "tool download").await?;
        std::fs::rename(&partial, &destination).map_err(|error| {
            ToolkitError::io(format!("failed to move download into `{destination}`"), error)
        })?;
        Ok(destination)
    }

    async fn extract_seven_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        seven_zr_path: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let destination = self.extraction_dir(destination)?;
        ArchiverInvocation::seven_zip_extract(file, &destination, seven_zr_path)
            .run()
            .await?;
        Ok(destination)
    }

    async fn extract_tar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let destination = self.extraction_dir(destination)?;
        let flags = flags.map_or_else(|| vec!["xz".to_owned()], <[String]>::to_vec);
        ArchiverInvocation::tar_extract(file, &destination, &flags)
            .run()
            .await?;
        Ok(destination)
    }

    async fn extract_xar(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
        flags: Option<&[String]>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let destination = self.extraction_dir(destination)?;
        let flags = flags.map_or_else(Vec::new, <[String]>::to_vec);
        ArchiverInvocation::xar_extract(file, &destination, &flags)
            .run()
            .await?;
        Ok(destination)
    }

    async fn extract_zip(
        &self,
        file: &Utf8Path,
        destination: Option<&Utf8Path>,
    ) -> Result<Utf8PathBuf, ToolkitError> {
        let destination = self.extraction_dir(destination)?;
        ArchiverInvocation::zip_extract(file, &destination).run().await?;
        Ok(destination)
    }

    async fn find(
        &self,
        name: &str,
        version: &str,
        architecture: Option<&str>,
    ) -> Result<Option<Utf8PathBuf>, ToolkitError> {
        require_non_empty(name, "tool name")?;
        require_non_empty(version, "version spec")?;
        let architecture = architecture.unwrap_or(default_architecture());
        let resolved = match explicit_version(version) {
            Some(parsed) => Some(parsed.to_string()),
            None => evaluate_versions(&self.list_versions(name, architecture)?, version)?,
        };
        let Some(resolved) = resolved else {
            return Ok(None);
        };
        let entry = tool_dir(self.root()?, name, &resolved, architecture);
        if entry.is_dir() && marker_path(&entry).is_file() {
            debug!(%entry, "tool cache hit");
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    async fn find_all_versions(
        &self,
        name: &str,
        architecture: Option<&str>,
    ) -> Result<Vec<String>, ToolkitError> {
        require_non_empty(name, "tool name")?;
        let architecture = architecture.unwrap_or(default_architecture());
        self.list_versions(name, architecture)
    }
}

/// Architecture directory used when the request does not name one.
fn default_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<(), ToolkitError> {
    if value.trim().is_empty() {
        return Err(ToolkitError::invalid_arguments(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

fn tool_dir(root: &Utf8Path, name: &str, version: &str, architecture: &str) -> Utf8PathBuf {
    root.join(name).join(version).join(architecture)
}

fn marker_path(entry: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{entry}.complete"))
}

/// Directory names are stored in cleaned form when the version is explicit.
fn stored_version(version: &str) -> String {
    explicit_version(version).map_or_else(|| version.trim().to_owned(), |parsed| parsed.to_string())
}

/// Parses an explicit version, accepting the `v`/`=v` spellings.
fn explicit_version(spec: &str) -> Option<Version> {
    let cleaned = spec.trim();
    let cleaned = cleaned.strip_prefix('=').map_or(cleaned, str::trim_start);
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned).ok()
}

/// Picks the highest listed version satisfying a range spec.
fn evaluate_versions(versions: &[String], spec: &str) -> Result<Option<String>, ToolkitError> {
    let requirement = VersionReq::parse(spec).map_err(|error| {
        ToolkitError::invalid_arguments(format!("invalid version spec `{spec}`: {error}"))
    })?;
    let best = versions
        .iter()
        .filter_map(|raw| explicit_version(raw).map(|parsed| (parsed, raw)))
        .filter(|(parsed, _)| requirement.matches(parsed))
        .max_by(|left, right| left.0.cmp(&right.0))
        .map(|(_, raw)| raw.clone());
    Ok(best)
}

fn complete_entry(entry: &Utf8Path) -> Result<(), ToolkitError> {
    let marker = marker_path(entry);
    std::fs::write(&marker, b"")
        .map_err(|error| ToolkitError::io(format!("failed to write `{marker}`"), error))
}

fn remove_if_present(entry: &Utf8Path) -> Result<(), ToolkitError> {
    match std::fs::remove_dir_all(entry) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(ToolkitError::io(
            format!("failed to clear `{entry}`"),
            error,
        )),
    }
}

/// Copies a directory's contents, descending breadth-first.
fn copy_tree(source: &Utf8Path, destination: &Utf8Path) -> Result<(), ToolkitError> {
    let mut pending = vec![(source.to_owned(), destination.to_owned())];
    while let Some((from, to)) = pending.pop() {
        std::fs::create_dir_all(&to)
            .map_err(|error| ToolkitError::io(format!("failed to create `{to}`"), error))?;
        let entries = from
            .read_dir_utf8()
            .map_err(|error| ToolkitError::io(format!("failed to list `{from}`"), error))?;
        for entry in entries {
            let entry = entry
                .map_err(|error| ToolkitError::io(format!("failed to list `{from}`"), error))?;
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().map_err(|error| {
                ToolkitError::io(format!("failed to inspect `{}`", entry.path()), error)
            })?;
            if file_type.is_dir() {
                pending.push((entry.path().to_owned(), target));
            } else {
                std::fs::copy(entry.path(), &target).map_err(|error| {
                    ToolkitError::io(format!("failed to copy `{}`", entry.path()), error)
                })?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("temp paths are UTF-8")
    }

    struct Harness {
        _root: TempDir,
        _temp: TempDir,
        cache: RunnerToolCache,
        root: Utf8PathBuf,
    }

    fn harness() -> Harness {
        let root_dir = TempDir::new().expect("tool cache root");
        let temp_dir = TempDir::new().expect("runner temp");
        let root = utf8(root_dir.path());
        let env = RunnerEnvironment {
            tool_cache_root: Some(root.clone()),
            temp_root: Some(utf8(temp_dir.path())),
            ..RunnerEnvironment::default()
        };
        Harness {
            cache: RunnerToolCache::new(crate::http::client().expect("client builds"), env),
            root,
            _root: root_dir,
            _temp: temp_dir,
        }
    }

    /// Plants a complete entry directly on disk.
    fn plant(root: &Utf8Path, name: &str, version: &str, architecture: &str, complete: bool) {
        let entry = tool_dir(root, name, version, architecture);
        std::fs::create_dir_all(&entry).expect("create entry");
        if complete {
            std::fs::write(marker_path(&entry), b"").expect("write marker");
        }
    }

    #[rstest]
    #[case("1.2.3", Some("1.2.3"))]
    #[case("v1.2.3", Some("1.2.3"))]
    #[case("=v1.2.3", Some("1.2.3"))]
    #[case(" 1.2.3 ", Some("1.2.3"))]
    #[case("^1.2", None)]
    #[case("1.x", None)]
    #[case("latest", None)]
    fn explicit_versions_are_recognised(#[case] spec: &str, #[case] cleaned: Option<&str>) {
        assert_eq!(
            explicit_version(spec).map(|parsed| parsed.to_string()),
            cleaned.map(str::to_owned)
        );
    }

    #[test]
    fn ranges_pick_the_highest_satisfying_version() {
        let versions = vec![
            "1.2.0".to_owned(),
            "1.10.1".to_owned(),
            "2.0.0".to_owned(),
        ];
        let best = evaluate_versions(&versions, "^1").expect("spec parses");
        assert_eq!(best.as_deref(), Some("1.10.1"));
        let none = evaluate_versions(&versions, "^3").expect("spec parses");
        assert_eq!(none, None);
    }

    #[test]
    fn broken_range_specs_are_invalid_arguments() {
        let error = evaluate_versions(&[], "not a version").expect_err("spec is garbage");
        assert!(error.to_string().starts_with("invalid version spec"));
    }

    #[tokio::test]
    async fn cached_files_are_findable_by_explicit_version() {
        let harness = harness();
        let source_dir = TempDir::new().expect("source dir");
        let source = utf8(source_dir.path()).join("node.tar.gz");
        std::fs::write(&source, b"payload").expect("write source");

        let entry = harness
            .cache
            .cache_file(&source, "node.tar.gz", "node", "v20.1.0", Some("x64"))
            .await
            .expect("cache file");
        assert_eq!(entry, harness.root.join("node/20.1.0/x64"));
        assert!(entry.join("node.tar.gz").is_file());
        assert!(marker_path(&entry).is_file());

        let found = harness
            .cache
            .find("node", "20.1.0", Some("x64"))
            .await
            .expect("find");
        assert_eq!(found, Some(entry));
    }

    #[tokio::test]
    async fn directories_are_copied_recursively() {
        let harness = harness();
        let source_dir = TempDir::new().expect("source dir");
        let source = utf8(source_dir.path());
        std::fs::create_dir_all(source.join("bin")).expect("nested dir");
        std::fs::write(source.join("bin/tool"), b"#!/bin/sh\n").expect("nested file");
        std::fs::write(source.join("README"), b"docs").expect("top file");

        let entry = harness
            .cache
            .cache_directory(&source, "toolbelt", "1.0.0", Some("x64"))
            .await
            .expect("cache directory");
        assert!(entry.join("bin/tool").is_file());
        assert!(entry.join("README").is_file());
    }

    #[tokio::test]
    async fn incomplete_entries_are_invisible() {
        let harness = harness();
        plant(&harness.root, "go", "1.22.0", "x64", false);
        let found = harness
            .cache
            .find("go", "1.22.0", Some("x64"))
            .await
            .expect("find");
        assert_eq!(found, None);
        let versions = harness
            .cache
            .find_all_versions("go", Some("x64"))
            .await
            .expect("list");
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn versions_list_in_semver_order_and_ranges_resolve() {
        let harness = harness();
        plant(&harness.root, "node", "1.9.0", "x64", true);
        plant(&harness.root, "node", "1.10.0", "x64", true);
        plant(&harness.root, "node", "2.0.0", "x64", true);
        plant(&harness.root, "node", "not-a-version", "x64", true);
        plant(&harness.root, "node", "3.0.0", "arm64", true);

        let versions = harness
            .cache
            .find_all_versions("node", Some("x64"))
            .await
            .expect("list");
        assert_eq!(versions, ["1.9.0", "1.10.0", "2.0.0"]);

        let found = harness
            .cache
            .find("node", "^1", Some("x64"))
            .await
            .expect("find");
        assert_eq!(
            found,
            Some(harness.root.join("node/1.10.0/x64"))
        );
    }

    #[tokio::test]
    async fn download_refuses_existing_destinations() {
        let harness = harness();
        let blocker_dir = TempDir::new().expect("blocker dir");
        let destination = utf8(blocker_dir.path()).join("tool.bin");
        std::fs::write(&destination, b"already here").expect("write blocker");

        let spec = ToolDownloadSpec {
            url: "http://127.0.0.1:9/never-reached".to_owned(),
            destination: Some(destination.clone()),
            authorization: None,
            headers: std::collections::BTreeMap::new(),
        };
        let error = harness
            .cache
            .download_tool(spec)
            .await
            .expect_err("destination is occupied");
        assert_eq!(
            error.to_string(),
            format!("destination `{destination}` already exists")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tar_round_trips_through_the_system_archiver() {
        let harness = harness();
        let stage_dir = TempDir::new().expect("stage dir");
        let stage = utf8(stage_dir.path());
        std::fs::write(stage.join("greeting.txt"), b"hello\n").expect("write payload");
        let archive = stage.join("payload.tar.gz");
        ArchiverInvocation::cache_pack(&archive, &stage, &["greeting.txt".to_owned()])
            .run()
            .await
            .expect("pack archive");

        let extracted = harness
            .cache
            .extract_tar(&archive, None, None)
            .await
            .expect("extract archive");
        let restored =
            std::fs::read_to_string(extracted.join("greeting.txt")).expect("read restored file");
        assert_eq!(restored, "hello\n");
    }
}
