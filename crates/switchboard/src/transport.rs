//! In-process duplex bridge between a tool server and the
//! conversation engine.
//!
//! The server endpoint answers *list tools* and *call tool* requests
//! against a [`ToolRegistry`]; the client endpoint is the engine's only
//! path to tool metadata and invocation. Because the two sides only
//! ever talk through the framed channel pair, a tool provider can move
//! out of process without the engine changing, and the engine can be
//! tested against a fake transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::errors::{EngineError, EngineResult};
use crate::models::content::ToolResult;
use crate::models::tool::ToolDefinition;
use crate::registry::ToolRegistry;

/// One framed message on the duplex channel. Responses carry the id of
/// the request they answer, so concurrent calls multiplex safely over
/// the single channel pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    pub body: FrameBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameBody {
    ListTools,
    CallTool { name: String, arguments: Value },
    Tools(Vec<ToolDefinition>),
    Result(ToolResult),
    Error(String),
}

/// One end of a linked duplex pair.
pub struct Endpoint {
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

/// Create a linked pair of endpoints. Every frame written to one side
/// becomes readable on the other, in write order, exactly once.
pub fn linked_pair() -> (Endpoint, Endpoint) {
    let (left_tx, right_rx) = mpsc::channel(64);
    let (right_tx, left_rx) = mpsc::channel(64);
    (
        Endpoint {
            tx: left_tx,
            rx: left_rx,
        },
        Endpoint {
            tx: right_tx,
            rx: right_rx,
        },
    )
}

/// The engine's view of the tool provider. The loopback [`ToolClient`]
/// is the in-process implementation; a remote transport implements the
/// same seam.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_tools(&self) -> EngineResult<Vec<ToolDefinition>>;
    async fn call_tool(&self, name: &str, arguments: Value) -> EngineResult<ToolResult>;
}

/// Serves tool requests from a registry over one end of a linked pair.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
}

impl ToolServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Answer requests until the peer hangs up. Tool invocations are
    /// spawned so calls issued in parallel run in parallel; replies
    /// multiplex back over the frame id. An in-flight handler runs to
    /// completion even if the caller stops waiting.
    pub fn serve(self, endpoint: Endpoint) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let Endpoint { tx, mut rx } = endpoint;
            while let Some(frame) = rx.recv().await {
                match frame.body {
                    FrameBody::ListTools => {
                        let body = FrameBody::Tools(self.registry.list());
                        if tx.send(Frame { id: frame.id, body }).await.is_err() {
                            break;
                        }
                    }
                    FrameBody::CallTool { name, arguments } => {
                        let registry = self.registry.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let body =
                                FrameBody::Result(dispatch(&registry, &name, arguments).await);
                            let _ = tx.send(Frame { id: frame.id, body }).await;
                        });
                    }
                    other => {
                        warn!(frame = ?other, "unexpected frame on server endpoint");
                        let body = FrameBody::Error("unexpected frame".to_string());
                        if tx.send(Frame { id: frame.id, body }).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("tool server endpoint closed");
        })
    }
}

/// Invoke a handler and wrap its return value in the content envelope.
/// Lookup and handler failures become error envelopes rather than
/// propagating; the model reacts to them as ordinary tool output.
async fn dispatch(registry: &ToolRegistry, name: &str, arguments: Value) -> ToolResult {
    let handler = match registry.lookup(name) {
        Ok(handler) => handler,
        Err(error) => return ToolResult::error(error.to_string()),
    };
    match handler.call(arguments).await {
        Ok(value) => ToolResult::from_value(value),
        Err(error) => {
            warn!(tool = name, %error, "tool handler failed");
            ToolResult::error(EngineError::Handler(format!("{name}: {error}")).to_string())
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<FrameBody>>>>;

/// Client side of the bridge. A reader task routes response frames to
/// their callers by id, so calls issued in parallel resolve
/// independently.
pub struct ToolClient {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    pending: Pending,
    next_id: AtomicU64,
}

impl ToolClient {
    /// Attach to one end of a linked pair, spawning the reader task.
    pub fn connect(endpoint: Endpoint) -> Arc<Self> {
        let Endpoint { tx, mut rx } = endpoint;
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let reader = pending.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let waiter = reader.lock().unwrap().remove(&frame.id);
                match waiter {
                    Some(reply) => {
                        let _ = reply.send(frame.body);
                    }
                    None => debug!(id = frame.id, "response frame with no waiter"),
                }
            }
            // Peer hung up; dropping the reply senders fails anyone
            // still waiting with TransportClosed.
            reader.lock().unwrap().clear();
        });

        Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            pending,
            next_id: AtomicU64::new(0),
        })
    }

    /// Tear down the bridge. Further requests fail with
    /// `TransportClosed`; the server endpoint winds down once in-flight
    /// requests drain.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    async fn request(&self, body: FrameBody) -> EngineResult<FrameBody> {
        let tx = self
            .tx
            .lock()
            .unwrap()
            .clone()
            .ok_or(EngineError::TransportClosed)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, reply_tx);

        if tx.send(Frame { id, body }).await.is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(EngineError::TransportClosed);
        }
        reply_rx.await.map_err(|_| EngineError::TransportClosed)
    }
}

#[async_trait]
impl ToolTransport for ToolClient {
    async fn list_tools(&self) -> EngineResult<Vec<ToolDefinition>> {
        match self.request(FrameBody::ListTools).await? {
            FrameBody::Tools(tools) => Ok(tools),
            other => {
                warn!(frame = ?other, "unexpected reply to list_tools");
                Err(EngineError::TransportClosed)
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> EngineResult<ToolResult> {
        let body = FrameBody::CallTool {
            name: name.to_string(),
            arguments,
        };
        match self.request(body).await? {
            FrameBody::Result(result) => Ok(result),
            other => {
                warn!(frame = ?other, "unexpected reply to call_tool");
                Err(EngineError::TransportClosed)
            }
        }
    }
}

/// Wire a registry to a fresh loopback bridge and return the client
/// side. The server task runs until the client is closed or dropped.
pub fn open(registry: Arc<ToolRegistry>) -> Arc<ToolClient> {
    let (server_end, client_end) = linked_pair();
    ToolServer::new(registry).serve(server_end);
    ToolClient::connect(client_end)
}
