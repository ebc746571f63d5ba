//! Collaborator error type and its mapping onto reported faults.
//!
//! Every toolkit operation fails with a [`ToolkitError`]. The variant decides
//! the categorical [`FaultKind`] the caller sees; the error source chain (or
//! captured archiver stderr) becomes the best-effort trace appended after the
//! rendered reason.

use shuttle_protocol::{Fault, FaultKind};
use thiserror::Error;

/// Failure raised by a toolkit collaborator.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// Required runner environment was missing or unusable.
    #[error("{message}")]
    Configuration { message: String },
    /// An argument survived decoding but is semantically unusable.
    #[error("{message}")]
    InvalidArguments { message: String },
    /// An HTTP exchange failed or came back with an unexpected status.
    #[error("{message}")]
    Http {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    /// A filesystem or stream operation failed.
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
    /// A spawned helper process failed to run or exited unsuccessfully.
    #[error("{message}")]
    Process {
        message: String,
        stderr: Option<String>,
    },
    /// A requested resource does not exist upstream.
    #[error("{message}")]
    NotFound { message: String },
    /// An internal invariant broke.
    #[error("{message}")]
    Internal { message: String },
}

impl ToolkitError {
    /// Builds a missing-or-unusable-environment error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Builds a semantically-invalid-argument error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Builds an HTTP error without an underlying cause.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an HTTP error wrapping its underlying cause.
    pub fn http_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Http {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a filesystem error wrapping the failed operation's cause.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Builds a helper-process error, keeping captured stderr for the trace.
    pub fn process(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Process {
            message: message.into(),
            stderr,
        }
    }

    /// Builds a missing-upstream-resource error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Builds a broken-invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Categorical kind reported for this error.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Configuration { .. } => FaultKind::Configuration,
            Self::InvalidArguments { .. } => FaultKind::InvalidArguments,
            Self::Http { .. } => FaultKind::Http,
            Self::Io { .. } => FaultKind::Io,
            Self::Process { .. } => FaultKind::Process,
            Self::NotFound { .. } => FaultKind::NotFound,
            Self::Internal { .. } => FaultKind::Internal,
        }
    }
}

impl From<ToolkitError> for Fault {
    fn from(error: ToolkitError) -> Self {
        let trace = match &error {
            ToolkitError::Process {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => Some(stderr.trim_end().to_owned()),
            _ => source_trace(&error),
        };
        let fault = Fault::structured(error.kind(), error.to_string());
        match trace {
            Some(trace) => fault.with_trace(trace),
            None => fault,
        }
    }
}

/// Renders an error's source chain as newline-separated trace lines.
fn source_trace(error: &dyn std::error::Error) -> Option<String> {
    let mut lines = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use shuttle_protocol::Fault;

    use super::ToolkitError;

    #[test]
    fn variants_render_their_kind_on_the_wire() {
        let fault: Fault = ToolkitError::configuration(
            "environment variable `ACTIONS_CACHE_URL` is not set",
        )
        .into();
        assert_eq!(
            fault.reason(),
            "Configuration: environment variable `ACTIONS_CACHE_URL` is not set"
        );
    }

    #[test]
    fn source_chains_become_trace_lines() {
        let root = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let fault: Fault = ToolkitError::io("failed to open archive", root).into();
        assert_eq!(fault.reason(), "Io: failed to open archive\ndenied");
    }

    #[test]
    fn archiver_stderr_becomes_the_trace() {
        let fault: Fault = ToolkitError::process(
            "`tar` failed with exit code 2",
            Some("tar: broken pipe\n".to_owned()),
        )
        .into();
        assert_eq!(
            fault.reason(),
            "Process: `tar` failed with exit code 2\ntar: broken pipe"
        );
    }

    #[test]
    fn empty_stderr_leaves_the_reason_bare() {
        let fault: Fault = ToolkitError::process("`unzip` failed with exit code 1", None).into();
        assert_eq!(fault.reason(), "Process: `unzip` failed with exit code 1");
    }
}
