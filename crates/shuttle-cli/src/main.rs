//! One-shot exchange binary for wrapped toolkit commands.
//!
//! The binary delegates to [`shuttle_cli::run`], which parses the exchange
//! file path, serves the request/reply round trip, and maps channel faults
//! onto process exit codes.

use std::process::ExitCode;

fn main() -> ExitCode {
    shuttle_cli::run()
}
