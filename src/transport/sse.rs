/// SSE Transport
///
/// HTTP binding for many concurrent clients:
/// - `GET /sse?client_id=` opens a long-lived event stream for one client
/// - `POST /message?client_id=` submits one JSON-RPC request; the response is
///   pushed to that client's event stream, or returned directly when no
///   stream is open under that id
/// - `GET /health` liveness probe

use actix_web::{
    App, HttpResponse, HttpServer,
    dev::ServerHandle,
    http::header::{self, ContentType},
    middleware::{DefaultHeaders, Logger},
    web,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::Transport;
use super::clients::{ClientRegistry, DELIVERY_TIMEOUT, Delivery};
use crate::core::error::TransportError;
use crate::core::server::Server;

/// Largest accepted JSON-RPC request body.
const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// State shared by all HTTP workers.
#[derive(Clone)]
pub struct SseState {
    pub server: Arc<Server>,
    pub clients: Arc<ClientRegistry>,
}

impl SseState {
    pub fn new(server: Arc<Server>) -> Self {
        Self {
            server,
            clients: Arc::new(ClientRegistry::new()),
        }
    }
}

#[derive(Deserialize)]
struct ClientQuery {
    client_id: Option<String>,
}

/// Register the SSE routes and their state on an app.
pub fn configure(state: SseState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state))
            .app_data(web::PayloadConfig::new(MAX_MESSAGE_BYTES))
            .route("/sse", web::get().to(subscribe))
            .route("/message", web::post().to(post_message))
            .route("/health", web::get().to(health));
    }
}

/// Event stream endpoint.
///
/// The client is registered before the response starts and unregistered when
/// actix drops the body stream, which happens on disconnect and on shutdown.
async fn subscribe(state: web::Data<SseState>, query: web::Query<ClientQuery>) -> HttpResponse {
    let subscription = state.clients.subscribe(query.into_inner().client_id);
    let events = subscription.into_stream().map(Ok::<Bytes, Infallible>);

    HttpResponse::Ok()
        .content_type("text/event-stream")
        // Disable caching so every event reaches the client immediately
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .streaming(events)
}

/// Message endpoint.
///
/// The request runs on the blocking pool and always completes, even if the
/// caller disconnects while it is running.
async fn post_message(
    state: web::Data<SseState>,
    query: web::Query<ClientQuery>,
    body: web::Bytes,
) -> HttpResponse {
    let Some(client_id) = query.into_inner().client_id.filter(|id| !id.is_empty()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "client_id required" }));
    };

    let server = Arc::clone(&state.server);
    let response = match web::block(move || server.handle_request(&body)).await {
        Ok(response) => Bytes::from(response),
        Err(e) => {
            error!(client_id = %client_id, error = %e, "request handling failed");
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "request handling failed" }));
        }
    };

    match state.clients.deliver(&client_id, response, DELIVERY_TIMEOUT).await {
        Delivery::Sent => HttpResponse::Ok().json(serde_json::json!({ "status": "sent" })),
        Delivery::TimedOut => {
            warn!(client_id = %client_id, "client mailbox full, delivery timed out");
            HttpResponse::RequestTimeout().json(serde_json::json!({ "error": "timeout" }))
        }
        Delivery::NoSubscriber(response) => HttpResponse::Ok()
            .insert_header(ContentType::json())
            .body(response),
    }
}

/// Health check endpoint handler.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

struct RunningServer {
    handle: ServerHandle,
    task: JoinHandle<std::io::Result<()>>,
    addrs: Vec<SocketAddr>,
}

/// SSE transport backed by an actix-web HTTP server.
pub struct SseTransport {
    state: SseState,
    bind_addr: String,
    workers: usize,
    running: Mutex<Option<RunningServer>>,
}

impl SseTransport {
    /// # Arguments
    /// * `server` - Dispatcher shared by all connections
    /// * `bind_addr` - Listen address, e.g. "0.0.0.0:8081"
    /// * `workers` - Number of HTTP worker threads
    pub fn new(server: Arc<Server>, bind_addr: impl Into<String>, workers: usize) -> Self {
        Self {
            state: SseState::new(server),
            bind_addr: bind_addr.into(),
            workers: workers.max(1),
            running: Mutex::new(None),
        }
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.state.clients
    }

    /// Addresses the listener is bound to; empty unless started.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.addrs.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<(), TransportError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let state = self.state.clone();
        let http = HttpServer::new(move || {
            App::new()
                // Add security headers to all responses
                .wrap(
                    DefaultHeaders::new()
                        .add(("X-Content-Type-Options", "nosniff"))
                        .add(("X-Frame-Options", "DENY")),
                )
                // %r = request line, %s = status, %Dms = duration in milliseconds
                .wrap(Logger::new("%r %s %Dms"))
                .configure(configure(state.clone()))
        })
        .workers(self.workers)
        .max_connections(10000)
        .keep_alive(Duration::from_secs(30))
        .client_request_timeout(Duration::from_secs(30))
        .client_disconnect_timeout(Duration::from_secs(2))
        .shutdown_timeout(10)
        // Shutdown is driven by `stop`, not by actix's own signal handling
        .disable_signals()
        .bind(&self.bind_addr)?;

        let addrs = http.addrs();
        let server = http.run();
        let handle = server.handle();
        let task = tokio::spawn(server);

        info!(
            bind = %self.bind_addr,
            workers = self.workers,
            server = self.state.server.name(),
            "SSE transport listening"
        );
        *running = Some(RunningServer { handle, task, addrs });
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(running) = running else {
            return Ok(());
        };

        // Open event streams never end on their own; close them first so the
        // graceful shutdown does not wait for them.
        self.state.clients.close_all();
        running.handle.stop(true).await;

        match running.task.await {
            Ok(result) => {
                info!("SSE transport stopped");
                result.map_err(TransportError::from)
            }
            Err(e) => Err(TransportError::Dispatch(e.to_string())),
        }
    }
}
