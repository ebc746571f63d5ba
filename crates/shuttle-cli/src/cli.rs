//! Argument surface of the `shuttle` binary.

use camino::Utf8PathBuf;
use clap::Parser;

/// Runs one wrapped toolkit command described by a JSON exchange file.
///
/// The exchange file carries the request object on entry and is overwritten
/// with the reply envelope before the process exits.
#[derive(Debug, Parser)]
#[command(name = "shuttle", version, about)]
pub(crate) struct Cli {
    /// Path of the JSON exchange file to serve.
    #[arg(value_name = "EXCHANGE_FILE")]
    pub(crate) exchange_file: Utf8PathBuf,
}
