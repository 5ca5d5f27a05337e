/// Transport Layer
///
/// Bindings that carry raw JSON-RPC bytes between clients and the server:
/// - stdio.rs: sequential, one newline-terminated request at a time
/// - sse.rs: HTTP with Server-Sent Events, many concurrent clients
/// - clients.rs: client registry and mailboxes used by the SSE binding

pub mod clients;
pub mod sse;
pub mod stdio;

pub use clients::{ClientRegistry, Delivery, Subscription};
pub use sse::SseTransport;
pub use stdio::StdioTransport;

use crate::core::error::TransportError;

/// Start/stop contract shared by all bindings.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Begin servicing requests. The stdio binding resolves when its input
    /// ends; the SSE binding resolves once the listener is running.
    async fn start(&self) -> Result<(), TransportError>;

    /// Release all resources. Calling it more than once is harmless.
    async fn stop(&self) -> Result<(), TransportError>;
}
