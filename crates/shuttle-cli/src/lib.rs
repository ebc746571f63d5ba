//! One-shot runtime for the `shuttle` binary.
//!
//! One invocation serves one exchange: open the file named on the command
//! line, read the request object, run the wrapped toolkit command, and
//! overwrite the file with the reply envelope. Channel faults abort with a
//! non-zero exit code before any reply is written; every later fault is
//! reported inside the envelope and the process still exits zero.

use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use shuttle_exchange::{ChannelError, Dispatcher, ExchangeChannel};
use shuttle_protocol::{ExchangeReply, Fault, FaultKind};
use shuttle_toolkit::{RunnerEnvironment, Toolkit, runner_toolkit};
use tracing::error;

mod cli;
mod telemetry;

use cli::Cli;

/// Tracing target for channel-level faults.
const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Parses arguments, serves one exchange round trip, and maps channel
/// faults onto exit codes.
#[must_use]
pub fn run() -> ExitCode {
    let arguments = Cli::parse();
    telemetry::initialise();
    match serve(&arguments) {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            error!(target: CHANNEL_TARGET, error = %fault, "exchange failed");
            ExitCode::from(fault.exit_status())
        }
    }
}

fn serve(arguments: &Cli) -> Result<(), ChannelError> {
    let mut channel = ExchangeChannel::open(&arguments.exchange_file)?;
    let request = channel.read_request()?;
    let reply = execute(request);
    channel.write_reply(&reply)
}

/// Runs the decoded request against the live runner environment.
///
/// The channel is already usable here, so toolkit and runtime construction
/// failures are reported through the envelope rather than aborting.
fn execute(request: Value) -> ExchangeReply {
    match runner_toolkit(RunnerEnvironment::capture()) {
        Ok(toolkit) => block_on_dispatch(toolkit, request),
        Err(error) => ExchangeReply::failure(&Fault::from(error)),
    }
}

fn block_on_dispatch(toolkit: Toolkit, request: Value) -> ExchangeReply {
    let dispatcher = Dispatcher::new(toolkit);
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(dispatcher.dispatch(request)),
        Err(error) => ExchangeReply::failure(&Fault::structured(
            FaultKind::Internal,
            format!("failed to start the async runtime: {error}"),
        )),
    }
}
