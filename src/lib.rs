/// MCP Action Gateway
///
/// Exposes a host application's named actions as Model Context Protocol
/// tools over stdio and HTTP Server-Sent Events.

pub mod actions;
pub mod core;
pub mod transport;

pub use crate::core::bootstrap::{bootstrap, build_server};
pub use crate::core::config::{GatewayConfig, TransportMode};
pub use crate::core::context::{AuthConfig, ExecutionContext};
pub use crate::core::error::{GatewayError, TransportError};
pub use crate::core::registry::{ActionDef, ActionMap, ActionResponse, HttpStatus};
pub use crate::core::schema::{Describe, Field, RecordDescriptor, TypeDescriptor};
pub use crate::core::server::Server;
