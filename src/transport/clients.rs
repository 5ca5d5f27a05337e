/// SSE Client Registry
///
/// Each subscribed event-stream client owns a bounded mailbox and a done
/// signal. The registry maps client ids to those handles; the post-message
/// endpoint uses it to route a response to the right subscriber.
///
/// Lifetime of a registration: created by `subscribe`, removed when the
/// subscription stream is dropped (client disconnect, server shutdown) or when
/// the client is explicitly closed. At most one client is live per id.

use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Messages a client may have queued before senders start waiting.
pub const MAILBOX_CAPACITY: usize = 10;
/// How long a post-message call waits for mailbox space.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
/// Idle time after which a `ping` event is emitted.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

struct ClientEntry {
    serial: u64,
    mailbox: mpsc::Sender<Bytes>,
    done: watch::Sender<bool>,
}

/// Outcome of routing a response to a client.
#[derive(Debug, PartialEq)]
pub enum Delivery {
    /// Queued on the client's mailbox.
    Sent,
    /// The mailbox stayed full for the whole timeout.
    TimedOut,
    /// No live subscriber under that id; the response is handed back.
    NoSubscriber(Bytes),
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientEntry>>,
    next_serial: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return its subscription.
    ///
    /// Without an explicit id one is synthesized from the current time. A
    /// client already registered under the same id is closed and replaced.
    pub fn subscribe(self: &Arc<Self>, client_id: Option<String>) -> Subscription {
        let client_id = client_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(synthesize_client_id);
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (mailbox_tx, mailbox_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);

        let previous = self.write().insert(
            client_id.clone(),
            ClientEntry {
                serial,
                mailbox: mailbox_tx,
                done: done_tx,
            },
        );
        if let Some(previous) = previous {
            info!(client_id = %client_id, "replacing existing SSE client");
            let _ = previous.done.send(true);
        }
        info!(client_id = %client_id, "SSE client connected");

        Subscription {
            client_id: client_id.clone(),
            mailbox: mailbox_rx,
            done: done_rx,
            guard: Registration {
                registry: Arc::clone(self),
                client_id,
                serial,
            },
        }
    }

    /// Route `message` to the client registered under `client_id`, waiting up
    /// to `timeout` for mailbox space.
    pub async fn deliver(&self, client_id: &str, message: Bytes, timeout: Duration) -> Delivery {
        // Clone the sender so the lock is not held while waiting.
        let mailbox = self.read().get(client_id).map(|c| c.mailbox.clone());
        let Some(mailbox) = mailbox else {
            return Delivery::NoSubscriber(message);
        };

        match mailbox.send_timeout(message, timeout).await {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
            // The subscriber went away between lookup and send.
            Err(mpsc::error::SendTimeoutError::Closed(message)) => Delivery::NoSubscriber(message),
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.read().contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal the client's done channel and drop its registration.
    pub fn close(&self, client_id: &str) -> bool {
        match self.write().remove(client_id) {
            Some(entry) => {
                let _ = entry.done.send(true);
                true
            }
            None => false,
        }
    }

    /// Close every registered client.
    pub fn close_all(&self) {
        let drained: Vec<ClientEntry> = self.write().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            let _ = entry.done.send(true);
        }
    }

    fn unregister(&self, client_id: &str, serial: u64) {
        let mut clients = self.write();
        if clients.get(client_id).is_some_and(|c| c.serial == serial) {
            if let Some(entry) = clients.remove(client_id) {
                let _ = entry.done.send(true);
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ClientEntry>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ClientEntry>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn synthesize_client_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("client-{nanos}")
}

/// Removes its own registration when dropped, whatever ended the stream.
struct Registration {
    registry: Arc<ClientRegistry>,
    client_id: String,
    serial: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.client_id, self.serial);
        info!(client_id = %self.client_id, "SSE client disconnected");
    }
}

/// A registered client's receiving side.
pub struct Subscription {
    client_id: String,
    mailbox: mpsc::Receiver<Bytes>,
    done: watch::Receiver<bool>,
    guard: Registration,
}

enum Phase {
    Connect,
    Stream,
}

impl Subscription {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Event stream for this client, SSE framed.
    ///
    /// Emits `connected` first, then `message` for every mailbox entry and a
    /// `ping` after each idle heartbeat interval. Ends when the done signal
    /// fires. Dropping the stream unregisters the client.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        stream::unfold((self, Phase::Connect), |(mut sub, phase)| async move {
            if let Phase::Connect = phase {
                let payload = serde_json::json!({ "client_id": sub.client_id }).to_string();
                return Some((sse_event("connected", &payload), (sub, Phase::Stream)));
            }

            let event = tokio::select! {
                msg = sub.mailbox.recv() => match msg {
                    Some(msg) => sse_event("message", &String::from_utf8_lossy(&msg)),
                    None => return None,
                },
                changed = sub.done.changed() => {
                    debug!(client_id = %sub.client_id, closed = changed.is_err(), "SSE client done");
                    return None;
                }
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => sse_event("ping", ""),
            };
            Some((event, (sub, Phase::Stream)))
        })
    }

    #[cfg(test)]
    fn serial(&self) -> u64 {
        self.guard.serial
    }
}

/// Frame one Server-Sent Event. Multi-line payloads become several `data:`
/// lines.
pub fn sse_event(name: &str, data: &str) -> Bytes {
    let mut frame = format!("event: {name}\n");
    if data.is_empty() {
        frame.push_str("data: \n");
    } else {
        for line in data.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
    }
    frame.push('\n');
    Bytes::from(frame)
}
