//! Response envelope and typed result payloads.
//!
//! The reply overwrites the request in the exchange file. Exactly one of
//! `result` and `reason` is serialised; discrimination rides the `isSuccess`
//! flag rather than the shape of the payload.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fault::Fault;

/// Envelope written back into the exchange file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeReply {
    /// Whether the dispatched operation completed.
    pub is_success: bool,
    /// Normalised operation payload; present exactly when `is_success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Fault text; present exactly when the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExchangeReply {
    /// Builds the success envelope around a normalised result payload.
    ///
    /// Operations without a meaningful payload pass `Value::Null`; the
    /// `result` key is still written so callers can distinguish "succeeded
    /// with nothing" from a failure.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            is_success: true,
            result: Some(result),
            reason: None,
        }
    }

    /// Builds the failure envelope, rendering the fault's wire reason.
    #[must_use]
    pub fn failure(fault: &Fault) -> Self {
        Self {
            is_success: false,
            result: None,
            reason: Some(fault.reason()),
        }
    }
}

impl From<Result<Value, Fault>> for ExchangeReply {
    fn from(outcome: Result<Value, Fault>) -> Self {
        match outcome {
            Ok(result) => Self::success(result),
            Err(fault) => Self::failure(&fault),
        }
    }
}

/// Wire shape naming one downloaded artifact and where it landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    /// Artifact name as stored by the service.
    pub name: String,
    /// Directory the artifact's files were written under.
    pub path: Utf8PathBuf,
}

/// Wire shape summarising one completed artifact upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUploadOutcome {
    /// Artifact name the upload was stored under.
    pub name: String,
    /// Items that were uploaded successfully.
    pub items: Vec<Utf8PathBuf>,
    /// Total uploaded size in bytes.
    pub size: u64,
    /// Items that failed and were skipped over.
    pub failed_items: Vec<Utf8PathBuf>,
}
