//! Reported faults and their caller-facing rendering.
//!
//! A fault is an operation failure that still produces a well-formed response
//! envelope. Faults carry either a verbatim reason that must reach the caller
//! untouched, or a structured kind and message pair with an optional trace.
//! The wire text is produced by [`Fault::reason`] at serialisation time; no
//! other layer formats fault text.

use thiserror::Error;

/// Classification attached to structured faults.
///
/// The kind name is rendered verbatim as the prefix of the wire reason, so
/// variant names are part of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FaultKind {
    /// The request envelope was readable but not a usable command request.
    InvalidRequest,
    /// The command was recognised but its argument payload did not decode.
    InvalidArguments,
    /// Required runner environment was missing or unusable.
    Configuration,
    /// An upstream HTTP exchange failed or returned an unexpected status.
    Http,
    /// A filesystem or stream operation failed.
    Io,
    /// A spawned helper process could not run or exited unsuccessfully.
    Process,
    /// A requested resource does not exist upstream.
    NotFound,
    /// An invariant broke inside the dispatcher itself.
    Internal,
}

/// Failure reported to the caller through the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A reason string forwarded to the caller exactly as produced.
    #[error("{reason}")]
    Verbatim {
        /// Text placed in the envelope's `reason` field untouched.
        reason: String,
    },
    /// A classified failure rendered as `<Kind>: <message>` on the wire.
    #[error("{kind}: {message}")]
    Structured {
        /// Classification prefix for the wire reason.
        kind: FaultKind,
        /// Human-readable description of the failure.
        message: String,
        /// Extra diagnostic lines appended after the reason, when available.
        trace: Option<String>,
    },
}

impl Fault {
    /// Builds a fault whose reason reaches the caller verbatim.
    #[must_use]
    pub fn verbatim(reason: impl Into<String>) -> Self {
        Self::Verbatim {
            reason: reason.into(),
        }
    }

    /// Builds a structured fault without trace information.
    #[must_use]
    pub fn structured(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::Structured {
            kind,
            message: message.into(),
            trace: None,
        }
    }

    /// Attaches diagnostic trace lines to a structured fault.
    ///
    /// Verbatim faults pass through unchanged; their reason is already final.
    #[must_use]
    pub fn with_trace(self, trace: impl Into<String>) -> Self {
        match self {
            Self::Structured { kind, message, .. } => Self::Structured {
                kind,
                message,
                trace: Some(trace.into()),
            },
            verbatim @ Self::Verbatim { .. } => verbatim,
        }
    }

    /// Builds the fault reported when the request envelope is not a usable
    /// command request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::structured(FaultKind::InvalidRequest, message)
    }

    /// Builds the fault reported when a recognised command's argument payload
    /// fails to decode.
    #[must_use]
    pub fn invalid_arguments(command: impl std::fmt::Display, error: impl std::fmt::Display) -> Self {
        Self::structured(
            FaultKind::InvalidArguments,
            format!("invalid arguments for `{command}`: {error}"),
        )
    }

    /// Builds the fault reported for an unrecognised `wrapperName`.
    ///
    /// The wording is part of the protocol; callers surface it to the people
    /// who authored the request.
    #[must_use]
    pub fn unknown_command(name: &str) -> Self {
        Self::verbatim(format!(
            "`{name}` is not a valid toolkit wrapper name! Most likely a \
             mistake made by the contributors, please report this issue."
        ))
    }

    /// Renders the wire text placed in the envelope's `reason` field.
    ///
    /// Structured faults render as `<Kind>: <message>`, followed by the trace
    /// on its own lines when one was attached.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Verbatim { reason } => reason.clone(),
            Self::Structured {
                kind,
                message,
                trace,
            } => match trace {
                Some(trace) => format!("{kind}: {message}\n{trace}"),
                None => format!("{kind}: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Fault, FaultKind};

    #[test]
    fn verbatim_reason_passes_through_untouched() {
        let fault = Fault::verbatim("Test");
        assert_eq!(fault.reason(), "Test");
        assert_eq!(fault.to_string(), "Test");
    }

    #[rstest]
    #[case(FaultKind::Configuration, "Configuration")]
    #[case(FaultKind::InvalidArguments, "InvalidArguments")]
    #[case(FaultKind::NotFound, "NotFound")]
    fn structured_reason_prefixes_the_kind(#[case] kind: FaultKind, #[case] prefix: &str) {
        let fault = Fault::structured(kind, "boom");
        assert_eq!(fault.reason(), format!("{prefix}: boom"));
    }

    #[test]
    fn trace_lines_follow_the_reason() {
        let fault = Fault::structured(FaultKind::Http, "status 503")
            .with_trace("retrying upload\nconnection reset");
        assert_eq!(
            fault.reason(),
            "Http: status 503\nretrying upload\nconnection reset"
        );
        assert_eq!(fault.to_string(), "Http: status 503");
    }

    #[test]
    fn trace_does_not_alter_verbatim_faults() {
        let fault = Fault::verbatim("Test").with_trace("ignored");
        assert_eq!(fault.reason(), "Test");
    }

    #[test]
    fn unknown_command_names_the_offending_wrapper() {
        let fault = Fault::unknown_command("cache/evict");
        assert_eq!(
            fault.reason(),
            "`cache/evict` is not a valid toolkit wrapper name! Most likely \
             a mistake made by the contributors, please report this issue."
        );
    }

    #[test]
    fn invalid_arguments_names_the_command() {
        let fault = Fault::invalid_arguments("cache/save", "missing field `key`");
        assert_eq!(
            fault.reason(),
            "InvalidArguments: invalid arguments for `cache/save`: missing field `key`"
        );
    }
}
