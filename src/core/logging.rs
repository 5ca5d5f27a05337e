/// Logging Setup
///
/// Installs the global tracing subscriber. Output always goes to stderr: in
/// stdio mode stdout carries the JSON-RPC stream.

use std::str::FromStr;
use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::core::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(GatewayError::Config(format!(
                "invalid log format '{other}', must be 'text' or 'json'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `action_gateway=debug,actix_web=warn`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), GatewayError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| GatewayError::Config(format!("invalid LOG_LEVEL '{}': {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| GatewayError::Logging(e.to_string()))
}

/// Root span that every gateway log line is attached to.
pub fn gateway_logger(service: &str) -> Span {
    tracing::info_span!("mcp", service = %service)
}
