//! Shared HTTP plumbing for the runner-backed collaborators.

use camino::Utf8Path;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;

use crate::error::ToolkitError;

/// `Accept` value the pipelines and cache services expect.
pub(crate) const ACTIONS_API_ACCEPT: &str = "application/json;api-version=6.0-preview";

/// `Accept` value for streaming file bodies from those services.
pub(crate) const ACTIONS_STREAM_ACCEPT: &str = "application/octet-stream;api-version=6.0-preview";

/// Builds the client every collaborator shares.
pub(crate) fn client() -> Result<Client, ToolkitError> {
    Client::builder()
        .user_agent(concat!("shuttle/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| ToolkitError::http_with("failed to build the HTTP client", error))
}

/// Maps transport-level send failures onto toolkit errors.
pub(crate) fn send_failure(context: &str, error: reqwest::Error) -> ToolkitError {
    ToolkitError::http_with(format!("{context} request failed"), error)
}

/// Requires a success status, surfacing the offending status otherwise.
pub(crate) fn ensure_status(response: Response, context: &str) -> Result<Response, ToolkitError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(ToolkitError::not_found(format!(
            "{context} request returned {status}"
        )))
    } else {
        Err(ToolkitError::http(format!(
            "{context} request returned {status}"
        )))
    }
}

/// Streams a response body into a file, returning the byte count.
pub(crate) async fn stream_to_file(
    response: Response,
    path: &Utf8Path,
    context: &str,
) -> Result<u64, ToolkitError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|error| ToolkitError::io(format!("failed to create `{path}`"), error))?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|error| send_failure(context, error))?;
        file.write_all(&chunk)
            .await
            .map_err(|error| ToolkitError::io(format!("failed to write `{path}`"), error))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|error| ToolkitError::io(format!("failed to flush `{path}`"), error))?;
    Ok(written)
}
