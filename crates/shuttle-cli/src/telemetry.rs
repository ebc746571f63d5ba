//! Structured telemetry for the one-shot binary.
//!
//! Everything goes to stderr: the exchange file is the only protocol channel
//! and stdout stays silent.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Environment variable holding the log filter expression.
pub(crate) const LOG_FILTER_VARIABLE: &str = "SHUTTLE_LOG";

/// Installs the global tracing subscriber when invoked for the first time.
///
/// The filter comes from `SHUTTLE_LOG` and falls back to `warn`; invalid
/// directives are dropped rather than aborting the exchange.
pub(crate) fn initialise() {
    TELEMETRY_GUARD.get_or_init(install_subscriber);
}

fn install_subscriber() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_FILTER_VARIABLE)
        .from_env_lossy();
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();
    // Installation can only lose a race with an already-set subscriber.
    tracing::subscriber::set_global_default(subscriber).ok();
}
