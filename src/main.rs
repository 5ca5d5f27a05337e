/// MCP Gateway Entry Point
///
/// Reads the configuration from environment variables (see `core::config`),
/// installs logging and serves the built-in actions on the configured
/// transport(s).

use std::process::ExitCode;

use action_gateway::core::logging::init_logging;
use action_gateway::{GatewayConfig, actions, bootstrap};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match bootstrap(config, actions::registry()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "gateway failed");
            ExitCode::FAILURE
        }
    }
}
