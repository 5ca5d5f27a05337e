/// Gateway Configuration
///
/// All settings come from environment variables with defaults:
///
/// - SERVER_NAME: Name of the server (default: "action-gateway")
/// - SERVER_VERSION: Version string (default: "1.0.0")
/// - SERVER_DESCRIPTION: Free text returned as `instructions` (default: empty)
/// - MCP_TRANSPORT_MODE: "stdio", "sse", or "both" (default: "sse")
/// - HOST: Bind address for the SSE transport (default: "0.0.0.0")
/// - PORT: Port number for the SSE transport (default: 8081)
/// - WORKER_THREADS: HTTP worker threads (default: CPU count, max 16)
/// - MCP_EXCLUDE_ACTIONS / MCP_INCLUDE_ACTIONS: comma separated action names
/// - MCP_ACCOUNT_ID_ENV / MCP_REGION_ENV: *names* of the variables holding
///   the default account id and region (default: GATEWAY_ACCOUNT_ID, GATEWAY_REGION)
/// - LOG_LEVEL: tracing filter directive (default: "info", RUST_LOG wins)
/// - LOG_FORMAT: "text" or "json" (default: "text")

use std::str::FromStr;

use crate::core::error::GatewayError;
use crate::core::logging::LogConfig;

/// Which transport binding(s) to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Sse,
    /// SSE in the background, stdio in the foreground.
    Both,
}

impl FromStr for TransportMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "sse" => Ok(TransportMode::Sse),
            "both" => Ok(TransportMode::Both),
            other => Err(GatewayError::Config(format!(
                "invalid transport mode '{other}', must be 'stdio', 'sse', or 'both'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub name: String,
    pub version: String,
    pub description: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub exclude_actions: Vec<String>,
    pub include_actions: Vec<String>,
    pub account_id_env: String,
    pub region_env: String,
    pub log: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "action-gateway".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            transport: TransportMode::Sse,
            host: "0.0.0.0".to_string(),
            port: 8081,
            workers: default_workers(),
            exclude_actions: Vec::new(),
            include_actions: Vec::new(),
            account_id_env: "GATEWAY_ACCOUNT_ID".to_string(),
            region_env: "GATEWAY_REGION".to_string(),
            log: LogConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| lookup(key).unwrap_or(default);

        let transport = match lookup("MCP_TRANSPORT_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.transport,
        };

        let port = match lookup("PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|e| GatewayError::Config(format!("invalid PORT '{p}': {e}")))?,
            None => defaults.port,
        };

        // Invalid worker counts fall back to the CPU based default.
        let workers = lookup("WORKER_THREADS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.workers);

        let format = match lookup("LOG_FORMAT") {
            Some(f) => f.parse()?,
            None => defaults.log.format,
        };

        Ok(Self {
            name: get("SERVER_NAME", defaults.name),
            version: get("SERVER_VERSION", defaults.version),
            description: get("SERVER_DESCRIPTION", defaults.description),
            transport,
            host: get("HOST", defaults.host),
            port,
            workers,
            exclude_actions: split_list(lookup("MCP_EXCLUDE_ACTIONS")),
            include_actions: split_list(lookup("MCP_INCLUDE_ACTIONS")),
            account_id_env: get("MCP_ACCOUNT_ID_ENV", defaults.account_id_env),
            region_env: get("MCP_REGION_ENV", defaults.region_env),
            log: LogConfig {
                level: get("LOG_LEVEL", defaults.log.level),
                format,
            },
        })
    }

    /// `host:port` for the SSE transport.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CPU count capped at 16 to avoid excessive context switching.
fn default_workers() -> usize {
    num_cpus::get().clamp(1, 16)
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
