/// Core Module
///
/// Protocol-independent pieces of the gateway:
/// - schema.rs: JSON Schema generation from type descriptors
/// - registry.rs: actions, response model and tool catalog
/// - context.rs: tool arguments to execution context adapter
/// - protocol.rs: JSON-RPC / MCP wire types
/// - server.rs: request dispatcher
/// - config.rs, logging.rs, error.rs: ambient setup
/// - bootstrap.rs: wiring of all of the above onto a transport

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
