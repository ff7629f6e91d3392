//! Startup for the console client.

use std::process::ExitCode;

use crate::console::Console;
use crate::core::config::ClientConfig;
use crate::state::ClientState;

/// Run the console client on stdin/stdout (used by the `convo` binary).
///
/// Logs go to stderr so they do not interleave with console output.
///
/// # Returns
/// `ExitCode::SUCCESS` on `/quit` or end of input, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting convo client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(run_console(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Client error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Initialise state and drive the console until it exits.
///
/// # Errors
/// Returns an error if initialisation or console I/O fails.
pub async fn run_console(config: ClientConfig) -> anyhow::Result<()> {
    let state = ClientState::initialize(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize client: {e}"))?;

    let console = Console::new(state);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin, tokio::io::stdout()).await
}
