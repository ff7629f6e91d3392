//! Binary entrypoint for the console chat client.

use std::process::ExitCode;

use convo_client::start_client;

/// Start the client on stdin/stdout.
fn main() -> ExitCode {
    start_client::run()
}
