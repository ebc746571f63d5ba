//! Snapshot of the runner environment the collaborators work against.
//!
//! Capture never fails: every variable is optional at construction time and
//! only becomes mandatory when an operation actually needs it. The probe
//! commands therefore work on a machine with no runner environment at all.
//! Empty values count as unset, matching how the runner's own tooling treats
//! them.

use camino::Utf8PathBuf;

use crate::error::ToolkitError;

/// Runner-provided settings, captured once per process.
#[derive(Debug, Clone, Default)]
pub struct RunnerEnvironment {
    /// `ACTIONS_RUNTIME_URL`: base URL of the pipelines service.
    pub runtime_url: Option<String>,
    /// `ACTIONS_RUNTIME_TOKEN`: bearer token for the pipelines and cache services.
    pub runtime_token: Option<String>,
    /// `ACTIONS_CACHE_URL`: base URL of the cache service.
    pub cache_url: Option<String>,
    /// `GITHUB_RUN_ID`: workflow run the artifacts belong to.
    pub run_id: Option<String>,
    /// `ACTIONS_ID_TOKEN_REQUEST_URL`: OIDC token endpoint.
    pub id_token_url: Option<String>,
    /// `ACTIONS_ID_TOKEN_REQUEST_TOKEN`: bearer token for the OIDC endpoint.
    pub id_token_request_token: Option<String>,
    /// `RUNNER_TOOL_CACHE`: root of the persistent tool cache.
    pub tool_cache_root: Option<Utf8PathBuf>,
    /// `RUNNER_TEMP`: scratch space for downloads and extractions.
    pub temp_root: Option<Utf8PathBuf>,
    /// `GITHUB_WORKSPACE`: directory cache paths are resolved against.
    pub workspace: Option<Utf8PathBuf>,
}

impl RunnerEnvironment {
    /// Captures the documented variables from the process environment.
    pub fn capture() -> Self {
        Self {
            runtime_url: non_empty_var("ACTIONS_RUNTIME_URL"),
            runtime_token: non_empty_var("ACTIONS_RUNTIME_TOKEN"),
            cache_url: non_empty_var("ACTIONS_CACHE_URL"),
            run_id: non_empty_var("GITHUB_RUN_ID"),
            id_token_url: non_empty_var("ACTIONS_ID_TOKEN_REQUEST_URL"),
            id_token_request_token: non_empty_var("ACTIONS_ID_TOKEN_REQUEST_TOKEN"),
            tool_cache_root: non_empty_var("RUNNER_TOOL_CACHE").map(Utf8PathBuf::from),
            temp_root: non_empty_var("RUNNER_TEMP").map(Utf8PathBuf::from),
            workspace: non_empty_var("GITHUB_WORKSPACE").map(Utf8PathBuf::from),
        }
    }
}

/// Requires a captured string value, naming the variable on failure.
pub(crate) fn require<'a>(
    value: Option<&'a String>,
    variable: &str,
) -> Result<&'a str, ToolkitError> {
    value.map(String::as_str).ok_or_else(|| missing(variable))
}

/// Requires a captured path value, naming the variable on failure.
pub(crate) fn require_path<'a>(
    value: Option<&'a Utf8PathBuf>,
    variable: &str,
) -> Result<&'a camino::Utf8Path, ToolkitError> {
    value
        .map(Utf8PathBuf::as_path)
        .ok_or_else(|| missing(variable))
}

fn missing(variable: &str) -> ToolkitError {
    ToolkitError::configuration(format!("environment variable `{variable}` is not set"))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::{RunnerEnvironment, require, require_path};

    #[test]
    fn missing_values_name_their_variable() {
        let env = RunnerEnvironment::default();
        let error = require(env.cache_url.as_ref(), "ACTIONS_CACHE_URL")
            .expect_err("default snapshot carries no cache URL");
        assert_eq!(
            error.to_string(),
            "environment variable `ACTIONS_CACHE_URL` is not set"
        );
    }

    #[test]
    fn present_values_pass_through() {
        let env = RunnerEnvironment {
            tool_cache_root: Some(Utf8PathBuf::from("/opt/hostedtoolcache")),
            ..RunnerEnvironment::default()
        };
        let root = require_path(env.tool_cache_root.as_ref(), "RUNNER_TOOL_CACHE")
            .expect("captured root should be usable");
        assert_eq!(root, "/opt/hostedtoolcache");
    }
}
