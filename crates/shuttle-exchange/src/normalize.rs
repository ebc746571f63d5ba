//! Pure per-operation mappings from native toolkit results to wire shapes.
//!
//! Each function takes the collaborator's native result and produces the
//! `result` payload documented for its command, with no I/O and no toolkit
//! involvement. Misses keep their documented sentinel: a cache miss is JSON
//! `null`, an unmatched tool lookup is the empty string.

use camino::Utf8PathBuf;
use serde::Serialize;
use serde_json::Value;
use shuttle_protocol::response::{ArtifactLocation, ArtifactUploadOutcome};
use shuttle_protocol::{Fault, FaultKind};
use shuttle_toolkit::{DownloadedArtifact, UploadedArtifact};

pub(crate) fn downloaded_artifact(artifact: DownloadedArtifact) -> Result<Value, Fault> {
    encode(&location(artifact))
}

pub(crate) fn downloaded_artifacts(artifacts: Vec<DownloadedArtifact>) -> Result<Value, Fault> {
    let locations: Vec<ArtifactLocation> = artifacts.into_iter().map(location).collect();
    encode(&locations)
}

pub(crate) fn uploaded_artifact(upload: UploadedArtifact) -> Result<Value, Fault> {
    encode(&ArtifactUploadOutcome {
        name: upload.artifact_name,
        items: upload.artifact_items,
        size: upload.size,
        failed_items: upload.failed_items,
    })
}

pub(crate) fn restored_key(key: Option<String>) -> Value {
    key.map_or(Value::Null, Value::String)
}

pub(crate) fn tool_path(path: Utf8PathBuf) -> Value {
    Value::String(path.into_string())
}

pub(crate) fn found_tool(path: Option<Utf8PathBuf>) -> Value {
    path.map_or_else(|| Value::String(String::new()), tool_path)
}

pub(crate) fn versions(versions: Vec<String>) -> Value {
    Value::Array(versions.into_iter().map(Value::String).collect())
}

fn location(artifact: DownloadedArtifact) -> ArtifactLocation {
    ArtifactLocation {
        name: artifact.artifact_name,
        path: artifact.download_path,
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, Fault> {
    serde_json::to_value(payload).map_err(|error| {
        Fault::structured(
            FaultKind::Internal,
            format!("failed to encode the result payload: {error}"),
        )
    })
}
