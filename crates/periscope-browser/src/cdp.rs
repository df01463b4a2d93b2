//! CDP client, a thin layer over `tokio-tungstenite`.
//!
//! One [`CdpClient`] owns one DevTools WebSocket. Commands from any number of
//! tasks are multiplexed by request id through a single handler task; events
//! (messages with a `method` and no `id`) fan out on a broadcast channel.
//!
//! Only implements the CDP commands we actually need (not the entire protocol).

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::BrowserError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pending CDP command waiting for response.
type PendingTx = oneshot::Sender<Result<Value, String>>;

const EVENT_CAPACITY: usize = 256;

/// A CDP event.
#[derive(Clone, Debug, PartialEq)]
pub struct CdpEvent {
    /// Event name, e.g. `Target.targetCreated`.
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

struct CdpCommand {
    method: String,
    params: Value,
    response_tx: PendingTx,
}

/// Connection to one DevTools endpoint.
pub struct CdpClient {
    cmd_tx: mpsc::Sender<CdpCommand>,
    events: broadcast::Sender<CdpEvent>,
    handler: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools WebSocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("WebSocket connect to {ws_url}: {e}"),
            })?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<CdpCommand>(64);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handler = tokio::spawn(cdp_handler_loop(ws, cmd_rx, events.clone()));
        debug!(ws_url, "CDP client connected");

        Ok(Self {
            cmd_tx,
            events,
            handler,
        })
    }

    /// Send a command and wait up to `timeout` for its result.
    pub async fn send(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(CdpCommand {
                method: method.into(),
                params,
                response_tx: tx,
            })
            .await
            .map_err(|_| BrowserError::Cdp("handler closed".into()))?;

        let result = tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| BrowserError::timeout(timeout, format!("CDP {method}")))?
            .map_err(|_| BrowserError::Cdp("response dropped".into()))?;

        result.map_err(BrowserError::Cdp)
    }

    /// Subscribe to events received from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Stop the handler task. Pending commands fail with `response dropped`.
    pub fn close(&self) {
        self.handler.abort();
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// DevTools endpoints of a freshly launched Chrome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevtoolsEndpoints {
    /// Browser-level WebSocket (target management).
    pub browser_ws: String,
    /// First page target's WebSocket.
    pub page_ws: String,
    /// First page target's id.
    pub page_target_id: String,
}

/// Poll the `/json` endpoints until Chrome exposes a page target.
pub async fn wait_for_endpoints(port: u16, child: &mut Child) -> Result<DevtoolsEndpoints, BrowserError> {
    let version_url = format!("http://127.0.0.1:{port}/json/version");
    let list_url = format!("http://127.0.0.1:{port}/json/list");

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Check Chrome hasn't crashed
        if let Some(status) = child.try_wait().map_err(|e| BrowserError::LaunchFailed {
            context: format!("wait: {e}"),
        })? {
            return Err(BrowserError::LaunchFailed {
                context: format!("Chrome exited early with {status}"),
            });
        }

        let Some(version) = fetch_json(&version_url).await else {
            continue;
        };
        let Some(targets) = fetch_json(&list_url).await else {
            continue;
        };
        let Some(browser_ws) = version["webSocketDebuggerUrl"].as_str() else {
            continue;
        };
        if let Some((page_target_id, page_ws)) = select_page_target(&targets) {
            return Ok(DevtoolsEndpoints {
                browser_ws: browser_ws.to_owned(),
                page_ws,
                page_target_id,
            });
        }
    }

    Err(BrowserError::LaunchFailed {
        context: format!("Chrome did not expose a page within 5 seconds on port {port}"),
    })
}

async fn fetch_json(url: &str) -> Option<Value> {
    let resp = reqwest::get(url).await.ok()?;
    resp.json().await.ok()
}

/// Pick the first `page` target from a `/json/list` response as
/// `(target_id, ws_url)`.
pub fn select_page_target(targets: &Value) -> Option<(String, String)> {
    targets.as_array()?.iter().find_map(|t| {
        if t["type"].as_str() != Some("page") {
            return None;
        }
        let id = t["id"].as_str()?;
        let ws = t["webSocketDebuggerUrl"].as_str()?;
        Some((id.to_owned(), ws.to_owned()))
    })
}

/// CDP WebSocket handler loop.
///
/// Receives commands from [`CdpClient`], sends them over WS, and routes
/// responses back by id. Events are forwarded to subscribers.
async fn cdp_handler_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<CdpCommand>,
    events: broadcast::Sender<CdpEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, PendingTx> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let id = next_id;
                next_id += 1;
                let msg = json!({
                    "id": id,
                    "method": cmd.method,
                    "params": cmd.params,
                });
                prune_abandoned(&mut pending);
                let _ = pending.insert(id, cmd.response_tx);
                if ws_tx.send(Message::Text(msg.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(val): Result<Value, _> = serde_json::from_str(&text) else {
                    continue;
                };
                if let Some(id) = val.get("id").and_then(Value::as_u64) {
                    if let Some(tx) = pending.remove(&id) {
                        if let Some(err) = val.get("error") {
                            let msg = err["message"].as_str().unwrap_or("CDP error");
                            let _ = tx.send(Err(msg.into()));
                        } else {
                            let _ = tx.send(Ok(val["result"].clone()));
                        }
                    }
                } else if let Some(method) = val.get("method").and_then(Value::as_str) {
                    trace!(method, "CDP event");
                    // No subscribers is fine
                    let _ = events.send(CdpEvent {
                        method: method.to_owned(),
                        params: val["params"].clone(),
                    });
                }
            }
        }
    }
    debug!(pending = pending.len(), "CDP handler loop exited");
}

/// Drop requests whose caller gave up waiting.
fn prune_abandoned(pending: &mut HashMap<u64, PendingTx>) {
    let before = pending.len();
    pending.retain(|_, tx| !tx.is_closed());
    if pending.len() < before {
        trace!(dropped = before - pending.len(), "pruned abandoned CDP requests");
    }
}
