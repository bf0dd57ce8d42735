// DevTools WebSocket connection: command/response correlation by id plus an
// event fan-out. One reader task owns the receiving half of the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{CdpError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

const EVENT_CAPACITY: usize = 512;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A protocol event, optionally scoped to a flattened target session.
#[derive(Debug, Clone)]
pub struct Event {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolError>,
    method: Option<String>,
    params: Option<Value>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolError {
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    next_id: AtomicU64,
    events: broadcast::Sender<Event>,
    reader: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Connection {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (socket, _response) = connect_async(ws_url).await?;
        let (sink, stream) = socket.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let reader = tokio::spawn(read_loop(stream, pending.clone(), events.clone()));

        debug!(ws_url, "cdp: connected");

        Ok(Self {
            inner: Arc::new(Inner {
                sink: Mutex::new(sink),
                pending,
                next_id: AtomicU64::new(1),
                events,
                reader,
            }),
        })
    }

    /// Send a command and wait for its response. `session_id` targets an
    /// attached page; `None` addresses the browser endpoint.
    pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut message = json!({ "id": id, "method": method, "params": params });
        if let Some(sid) = session_id {
            message["sessionId"] = Value::String(sid.to_string());
        }

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id, tx);

        trace!(id, method, "cdp: send");
        let sent = self
            .inner
            .sink
            .lock()
            .await
            .send(Message::Text(message.to_string()))
            .await;
        if let Err(e) = sent {
            self.inner.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().await.remove(&id);
                Err(CdpError::Timeout(format!("{method} got no response")))
            }
        }
    }

    /// Subscribe to every event received after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, pending: Pending, events: broadcast::Sender<Event>) {
    while let Some(next) = stream.next().await {
        let text = match next {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "cdp: read error");
                break;
            }
        };

        let incoming: Incoming = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(error = %err, "cdp: unparseable message");
                continue;
            }
        };

        if let Some(id) = incoming.id {
            let outcome = match incoming.error {
                Some(err) => Err(CdpError::Protocol {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(incoming.result.unwrap_or(Value::Null)),
            };
            if let Some(tx) = pending.lock().await.remove(&id) {
                let _ = tx.send(outcome);
            }
        } else if let Some(method) = incoming.method {
            // No receivers is fine: nobody is waiting on this event kind.
            let _ = events.send(Event {
                method,
                params: incoming.params.unwrap_or(Value::Null),
                session_id: incoming.session_id,
            });
        }
    }

    // Dropping the senders wakes every waiter with ConnectionClosed.
    pending.lock().await.clear();
    debug!("cdp: reader finished");
}
