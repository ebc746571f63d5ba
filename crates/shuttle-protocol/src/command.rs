//! Command registry and staged request decoding.
//!
//! The registry is a closed set: every wire name maps onto one variant of
//! [`CommandName`], and [`Command`] pairs each of those with its decoded
//! argument payload. Decoding is staged so that the envelope fields are
//! checked before any payload shape: a readable request with a bad
//! discriminator reports an invalid-request or unknown-command fault, and
//! only a recognised command can report invalid arguments.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::fault::Fault;
use crate::request::{
    ArtifactDownloadAllRequest, ArtifactDownloadRequest, ArtifactUploadRequest,
    CacheDirectoryRequest, CacheFileRequest, CacheRestoreRequest, CacheSaveRequest,
    DownloadToolRequest, ExtractSevenZipRequest, ExtractTarRequest, ExtractXarRequest,
    ExtractZipRequest, FindAllVersionsRequest, FindRequest, OidcTokenRequest, ProbeRequest,
};

/// Wire name of every registered command.
///
/// `Display` and `FromStr` both speak the wire spelling, so the enum is the
/// single source of truth for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum CommandName {
    /// `$fail`: protocol probe that always reports a failure.
    #[strum(serialize = "$fail")]
    ProbeFailure,
    /// `$success`: protocol probe that always succeeds.
    #[strum(serialize = "$success")]
    ProbeSuccess,
    /// `artifact/download`: fetch one stored artifact.
    #[strum(serialize = "artifact/download")]
    ArtifactDownload,
    /// `artifact/download-all`: fetch every artifact of the run.
    #[strum(serialize = "artifact/download-all")]
    ArtifactDownloadAll,
    /// `artifact/upload`: store files as a named artifact.
    #[strum(serialize = "artifact/upload")]
    ArtifactUpload,
    /// `cache/restore`: look up and unpack a cache entry.
    #[strum(serialize = "cache/restore")]
    CacheRestore,
    /// `cache/save`: pack paths into a new cache entry.
    #[strum(serialize = "cache/save")]
    CacheSave,
    /// `open-id-connect/get-token`: request an OIDC identity token.
    #[strum(serialize = "open-id-connect/get-token")]
    OidcToken,
    /// `tool-cache/cache-directory`: file a directory in the tool cache.
    #[strum(serialize = "tool-cache/cache-directory")]
    ToolCacheDirectory,
    /// `tool-cache/cache-file`: file a single file in the tool cache.
    #[strum(serialize = "tool-cache/cache-file")]
    ToolCacheFile,
    /// `tool-cache/download-tool`: download a tool distribution.
    #[strum(serialize = "tool-cache/download-tool")]
    ToolDownload,
    /// `tool-cache/extract-7z`: extract a 7-Zip archive.
    #[strum(serialize = "tool-cache/extract-7z")]
    ToolExtractSevenZip,
    /// `tool-cache/extract-tar`: extract a tar archive.
    #[strum(serialize = "tool-cache/extract-tar")]
    ToolExtractTar,
    /// `tool-cache/extract-xar`: extract a xar archive.
    #[strum(serialize = "tool-cache/extract-xar")]
    ToolExtractXar,
    /// `tool-cache/extract-zip`: extract a zip archive.
    #[strum(serialize = "tool-cache/extract-zip")]
    ToolExtractZip,
    /// `tool-cache/find`: locate one cached tool version.
    #[strum(serialize = "tool-cache/find")]
    ToolFind,
    /// `tool-cache/find-all-versions`: list cached versions of a tool.
    #[strum(serialize = "tool-cache/find-all-versions")]
    ToolFindAllVersions,
}

/// A decoded command: registry entry plus its typed argument payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `$fail` probe.
    ProbeFailure(ProbeRequest),
    /// `$success` probe.
    ProbeSuccess(ProbeRequest),
    /// `artifact/download`.
    ArtifactDownload(ArtifactDownloadRequest),
    /// `artifact/download-all`.
    ArtifactDownloadAll(ArtifactDownloadAllRequest),
    /// `artifact/upload`.
    ArtifactUpload(ArtifactUploadRequest),
    /// `cache/restore`.
    CacheRestore(CacheRestoreRequest),
    /// `cache/save`.
    CacheSave(CacheSaveRequest),
    /// `open-id-connect/get-token`.
    OidcToken(OidcTokenRequest),
    /// `tool-cache/cache-directory`.
    ToolCacheDirectory(CacheDirectoryRequest),
    /// `tool-cache/cache-file`.
    ToolCacheFile(CacheFileRequest),
    /// `tool-cache/download-tool`.
    ToolDownload(DownloadToolRequest),
    /// `tool-cache/extract-7z`.
    ToolExtractSevenZip(ExtractSevenZipRequest),
    /// `tool-cache/extract-tar`.
    ToolExtractTar(ExtractTarRequest),
    /// `tool-cache/extract-xar`.
    ToolExtractXar(ExtractXarRequest),
    /// `tool-cache/extract-zip`.
    ToolExtractZip(ExtractZipRequest),
    /// `tool-cache/find`.
    ToolFind(FindRequest),
    /// `tool-cache/find-all-versions`.
    ToolFindAllVersions(FindAllVersionsRequest),
}

impl Command {
    /// Decodes a parsed request object into a registered command.
    ///
    /// Staging order: envelope shape, then registry lookup, then payload
    /// decode. Each stage reports its own fault so the caller can tell a
    /// malformed envelope from an unknown name from bad arguments.
    pub fn decode(request: Value) -> Result<Self, Fault> {
        let name = wrapper_name(&request)?;
        let command = match name {
            CommandName::ProbeFailure => Self::ProbeFailure(payload(name, request)?),
            CommandName::ProbeSuccess => Self::ProbeSuccess(payload(name, request)?),
            CommandName::ArtifactDownload => Self::ArtifactDownload(payload(name, request)?),
            CommandName::ArtifactDownloadAll => Self::ArtifactDownloadAll(payload(name, request)?),
            CommandName::ArtifactUpload => Self::ArtifactUpload(payload(name, request)?),
            CommandName::CacheRestore => Self::CacheRestore(payload(name, request)?),
            CommandName::CacheSave => Self::CacheSave(payload(name, request)?),
            CommandName::OidcToken => Self::OidcToken(payload(name, request)?),
            CommandName::ToolCacheDirectory => Self::ToolCacheDirectory(payload(name, request)?),
            CommandName::ToolCacheFile => Self::ToolCacheFile(payload(name, request)?),
            CommandName::ToolDownload => Self::ToolDownload(payload(name, request)?),
            CommandName::ToolExtractSevenZip => {
                Self::ToolExtractSevenZip(payload(name, request)?)
            }
            CommandName::ToolExtractTar => Self::ToolExtractTar(payload(name, request)?),
            CommandName::ToolExtractXar => Self::ToolExtractXar(payload(name, request)?),
            CommandName::ToolExtractZip => Self::ToolExtractZip(payload(name, request)?),
            CommandName::ToolFind => Self::ToolFind(payload(name, request)?),
            CommandName::ToolFindAllVersions => Self::ToolFindAllVersions(payload(name, request)?),
        };
        Ok(command)
    }

    /// Returns the registry entry this command decoded from.
    #[must_use]
    pub fn name(&self) -> CommandName {
        match self {
            Self::ProbeFailure(_) => CommandName::ProbeFailure,
            Self::ProbeSuccess(_) => CommandName::ProbeSuccess,
            Self::ArtifactDownload(_) => CommandName::ArtifactDownload,
            Self::ArtifactDownloadAll(_) => CommandName::ArtifactDownloadAll,
            Self::ArtifactUpload(_) => CommandName::ArtifactUpload,
            Self::CacheRestore(_) => CommandName::CacheRestore,
            Self::CacheSave(_) => CommandName::CacheSave,
            Self::OidcToken(_) => CommandName::OidcToken,
            Self::ToolCacheDirectory(_) => CommandName::ToolCacheDirectory,
            Self::ToolCacheFile(_) => CommandName::ToolCacheFile,
            Self::ToolDownload(_) => CommandName::ToolDownload,
            Self::ToolExtractSevenZip(_) => CommandName::ToolExtractSevenZip,
            Self::ToolExtractTar(_) => CommandName::ToolExtractTar,
            Self::ToolExtractXar(_) => CommandName::ToolExtractXar,
            Self::ToolExtractZip(_) => CommandName::ToolExtractZip,
            Self::ToolFind(_) => CommandName::ToolFind,
            Self::ToolFindAllVersions(_) => CommandName::ToolFindAllVersions,
        }
    }
}

fn wrapper_name(request: &Value) -> Result<CommandName, Fault> {
    let Some(object) = request.as_object() else {
        return Err(Fault::invalid_request("request must be a JSON object"));
    };
    let Some(name) = object.get("wrapperName") else {
        return Err(Fault::invalid_request(
            "request is missing the `wrapperName` field",
        ));
    };
    let Some(name) = name.as_str() else {
        return Err(Fault::invalid_request("`wrapperName` must be a string"));
    };
    CommandName::from_str(name).map_err(|_| Fault::unknown_command(name))
}

fn payload<T: DeserializeOwned>(name: CommandName, request: Value) -> Result<T, Fault> {
    serde_json::from_value(request).map_err(|error| Fault::invalid_arguments(name, error))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::{Command, CommandName};

    #[test]
    fn every_wire_name_round_trips_through_the_registry() {
        for name in CommandName::iter() {
            let spelled = name.to_string();
            assert_eq!(spelled.parse::<CommandName>(), Ok(name));
        }
    }

    #[test]
    fn decodes_a_probe_with_its_payload() {
        let command = Command::decode(json!({
            "wrapperName": "$success",
            "message": "ready",
        }))
        .expect("probe request should decode");
        assert_eq!(command.name(), CommandName::ProbeSuccess);
        match command {
            Command::ProbeSuccess(request) => {
                assert_eq!(request.message.as_deref(), Some("ready"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn decodes_a_namespaced_command() {
        let command = Command::decode(json!({
            "wrapperName": "tool-cache/find",
            "name": "node",
            "version": "^20",
        }))
        .expect("find request should decode");
        assert_eq!(command.name(), CommandName::ToolFind);
    }

    #[rstest]
    #[case(json!(["not", "an", "object"]), "request must be a JSON object")]
    #[case(json!({"message": "hi"}), "request is missing the `wrapperName` field")]
    #[case(json!({"wrapperName": 7}), "`wrapperName` must be a string")]
    fn envelope_defects_report_invalid_request(
        #[case] request: serde_json::Value,
        #[case] message: &str,
    ) {
        let fault = Command::decode(request).expect_err("decode should fail");
        assert_eq!(fault.reason(), format!("InvalidRequest: {message}"));
    }

    #[test]
    fn unknown_names_report_the_contributor_facing_sentence() {
        let fault = Command::decode(json!({"wrapperName": "cache/evict"}))
            .expect_err("unknown name should fail");
        let reason = fault.reason();
        assert!(reason.starts_with("`cache/evict` is not a valid toolkit wrapper name!"));
        assert!(reason.ends_with("please report this issue."));
    }

    #[test]
    fn bad_arguments_report_the_command_and_the_field() {
        let fault = Command::decode(json!({
            "wrapperName": "cache/save",
            "paths": ["target"],
        }))
        .expect_err("missing key should fail");
        let reason = fault.reason();
        assert!(reason.starts_with("InvalidArguments: invalid arguments for `cache/save`:"));
        assert!(reason.contains("key"));
    }
}
