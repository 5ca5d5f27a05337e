/// Error Types
///
/// Rust-level failures of the gateway. Protocol failures (bad JSON, unknown
/// method, unknown tool) are never represented here: they are answered with
/// JSON-RPC error objects and the server keeps running.

use thiserror::Error;

/// Failures while configuring or bootstrapping the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The action map handed to the gateway was empty.
    #[error("no actions registered")]
    NoActions,
    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The tracing subscriber could not be installed.
    #[error("logging initialization failed: {0}")]
    Logging(String),
    /// A transport failed to start, run or stop.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of a transport binding.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading from or writing to the underlying stream/socket failed.
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
    /// The blocking worker running a request was cancelled or panicked.
    #[error("request dispatch failed: {0}")]
    Dispatch(String),
    /// `start` was called on a transport that is already running.
    #[error("transport already started")]
    AlreadyStarted,
}

/// Failure to decode the execution context body into a handler's input type.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to decode request body: {0}")]
    Json(#[from] serde_json::Error),
}
