/// STDIO Transport
///
/// Reads JSON-RPC requests line-by-line and writes one response line per
/// request. Exactly one request is in flight at any time: the next line is
/// not read before the previous response has been written and flushed.
/// All logging goes to stderr to keep the protocol stream clean.

use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Stdin, Stdout,
};
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

use super::Transport;
use crate::core::error::TransportError;
use crate::core::server::Server;

/// Buffer size for stdin/stdout; balances memory use with I/O efficiency.
const STDIO_BUFFER_SIZE: usize = 8192;

pub struct StdioTransport<R = BufReader<Stdin>, W = BufWriter<Stdout>> {
    server: Arc<Server>,
    reader: Mutex<R>,
    writer: Mutex<W>,
    shutdown: Notify,
}

impl StdioTransport {
    /// Transport over the process's stdin and stdout.
    pub fn stdio(server: Arc<Server>) -> Self {
        Self::new(
            server,
            BufReader::with_capacity(STDIO_BUFFER_SIZE, tokio::io::stdin()),
            BufWriter::with_capacity(STDIO_BUFFER_SIZE, tokio::io::stdout()),
        )
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(server: Arc<Server>, reader: R, writer: W) -> Self {
        Self {
            server,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            shutdown: Notify::new(),
        }
    }

    /// Consume the transport and hand back its writer.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn serve(&self) -> Result<(), TransportError> {
        let mut reader = self.reader.lock().await;
        let mut line = Vec::with_capacity(STDIO_BUFFER_SIZE);

        loop {
            line.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut line) => read,
                _ = self.shutdown.notified() => {
                    info!("stdio transport stopped");
                    return Ok(());
                }
            };

            match read {
                Ok(0) => {
                    info!("EOF received, shutting down stdio transport");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "error reading from stdin");
                    return Err(e.into());
                }
            }

            // Blank line: only the terminator, or nothing at all.
            if line.len() <= 1 {
                continue;
            }

            let response = self.dispatch(line.clone()).await?;
            self.write_line(&response).await?;
        }
    }

    /// Run the request on a blocking worker; action handlers are synchronous.
    async fn dispatch(&self, request: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let server = Arc::clone(&self.server);
        tokio::task::spawn_blocking(move || server.handle_request(&request))
            .await
            .map_err(|e| TransportError::Dispatch(e.to_string()))
    }

    async fn write_line(&self, response: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(response).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        written.map_err(|e| {
            error!(error = %e, "error writing to stdout");
            TransportError::Io(e)
        })
    }
}

#[async_trait::async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn start(&self) -> Result<(), TransportError> {
        info!(server = self.server.name(), "starting stdio transport");
        self.serve().await
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.shutdown.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::AuthConfig;
    use crate::core::registry::{ActionDef, ActionMap, ActionResponse};
    use serde_json::{Value, json};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tracing::Span;

    fn server() -> Arc<Server> {
        let mut actions = ActionMap::new();
        actions.insert(
            "ping".to_string(),
            ActionDef::new("Ping", |_| (ActionResponse::ok(json!("pong")), 200)),
        );
        Arc::new(Server::new("stdio-test", "0.0.1", "", Arc::new(actions), AuthConfig::default(), Span::none()))
    }

    fn responses(output: &[u8]) -> Vec<Value> {
        output
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line_in_order_and_stops_at_eof() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"ping"}}"#, "\n",
        );
        let transport = StdioTransport::new(server(), input.as_bytes(), Vec::new());

        transport.start().await.unwrap();

        let out = responses(&transport.into_writer());
        assert_eq!(out.len(), 4);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[1]["result"]["tools"][0]["name"], "ping");
        assert_eq!(out[2]["error"]["code"], -32700);
        assert_eq!(out[3]["result"]["content"][0]["text"], "\"pong\"");
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_answered() {
        let input = r#"{"jsonrpc":"2.0","id":"last","method":"tools/list"}"#;
        let transport = StdioTransport::new(server(), input.as_bytes(), Vec::new());

        transport.start().await.unwrap();

        let out = responses(&transport.into_writer());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "last");
    }

    #[tokio::test]
    async fn empty_input_is_clean_shutdown() {
        let transport = StdioTransport::new(server(), &b""[..], Vec::new());
        assert!(transport.start().await.is_ok());
        assert!(transport.into_writer().is_empty());
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn write_failure_ends_the_loop_with_an_error() {
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n";
        let transport = StdioTransport::new(server(), input.as_bytes(), BrokenPipe);

        let result = transport.start().await;
        assert!(matches!(result, Err(TransportError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn stop_before_start_returns_immediately() {
        let (_client, server_end) = tokio::io::duplex(64);
        let transport = StdioTransport::new(server(), BufReader::new(server_end), Vec::new());

        transport.stop().await.unwrap();
        transport.stop().await.unwrap();
        assert!(transport.start().await.is_ok());
    }
}
