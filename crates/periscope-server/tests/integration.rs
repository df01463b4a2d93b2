//! End-to-end tests against a real listener and WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use periscope_browser::testing::{CaptureBehavior, FacadeCall, RecordingFacade};
use periscope_platform::DeviceAction;
use periscope_platform::testing::RecordingBridge;
use periscope_server::{RelayConfig, RelayServer, ShutdownPhase};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct Harness {
    server: RelayServer,
    addr: SocketAddr,
    handle: Option<tokio::task::JoinHandle<()>>,
    facade: Arc<RecordingFacade>,
    bridge: Arc<RecordingBridge>,
    _static_dir: tempfile::TempDir,
}

impl Harness {
    async fn boot() -> Self {
        Self::boot_with(|_| {}).await
    }

    async fn boot_with(tweak: impl FnOnce(&mut RelayConfig)) -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<html>viewer</html>").unwrap();
        let mut config = RelayConfig {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: static_dir.path().to_path_buf(),
            frame_interval: Duration::from_millis(20),
            capture_timeout: Duration::from_millis(200),
            drain_timeout: Duration::from_secs(2),
            settle_period: Duration::ZERO,
        };
        tweak(&mut config);

        let facade = RecordingFacade::new();
        let bridge = RecordingBridge::new();
        let server = RelayServer::new(config, facade.clone(), bridge.clone(), None);
        let (addr, handle) = server.listen().await.unwrap();

        Self {
            server,
            addr,
            handle: Some(handle),
            facade,
            bridge,
            _static_dir: static_dir,
        }
    }

    async fn connect(&self) -> WsStream {
        let (ws, _) = timeout(TIMEOUT, connect_async(format!("ws://{}/ws", self.addr)))
            .await
            .expect("connect timed out")
            .expect("connect failed");
        ws
    }

    async fn health(&self) -> Value {
        reqwest::get(format!("http://{}/health", self.addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn wait_for_viewers(&self, expected: usize) {
        timeout(TIMEOUT, async {
            while self.server.registry().count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {expected} viewers"));
    }

    async fn shutdown(&mut self) {
        let handle = self.handle.take().into_iter().collect();
        self.server.shutdown().run(handle).await;
    }
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next screenshot frame, skipping control frames.
async fn next_frame(ws: &mut WsStream) -> Value {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["type"] == "screenshot" {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no frame arrived")
}

/// Next non-capture facade call.
async fn next_call(rx: &mut UnboundedReceiver<FacadeCall>) -> FacadeCall {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("no facade call")
        .expect("observer closed")
}

/// Wait for the server to close the socket.
async fn expect_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("socket stayed open");
}

// ── Scenarios ──

#[tokio::test]
async fn open_url_reaches_navigate() {
    let h = Harness::boot().await;
    let mut calls = h.facade.observe();
    let mut ws = h.connect().await;

    send(&mut ws, json!({"type": "open_url", "payload": "https://example.com"})).await;

    assert_eq!(
        next_call(&mut calls).await,
        FacadeCall::Navigate("https://example.com".into())
    );
}

#[tokio::test]
async fn click_at_reaches_click() {
    let h = Harness::boot().await;
    let mut calls = h.facade.observe();
    let mut ws = h.connect().await;

    send(&mut ws, json!({"type": "click_at", "payload": {"x": 12.5, "y": 40}})).await;

    assert_eq!(next_call(&mut calls).await, FacadeCall::ClickAt { x: 12.5, y: 40.0 });
}

#[tokio::test]
async fn scroll_down_evaluates_clamped_script() {
    let h = Harness::boot().await;
    let mut calls = h.facade.observe();
    let mut ws = h.connect().await;

    send(
        &mut ws,
        json!({"type": "scroll", "payload": {"direction": "down", "percent": 50}}),
    )
    .await;

    let FacadeCall::Evaluate(script) = next_call(&mut calls).await else {
        panic!("expected evaluate");
    };
    assert!(script.contains("var scrollAmount = (50) * window.innerHeight / 100;"));
    assert!(script.contains("Math.min(scrollAmount, maxScroll - window.scrollY)"));
}

#[tokio::test]
async fn device_shutdown_leaves_other_viewers_streaming() {
    let mut h = Harness::boot().await;
    let mut actions = h.bridge.observe();
    let mut first = h.connect().await;
    let mut second = h.connect().await;
    h.wait_for_viewers(2).await;
    let _ = next_frame(&mut second).await;

    send(&mut first, json!({"type": "send_button", "payload": "shutdown"})).await;
    assert_eq!(
        timeout(TIMEOUT, actions.recv()).await.unwrap(),
        Some(DeviceAction::PowerOff)
    );

    for _ in 0..5 {
        let frame = next_frame(&mut second).await;
        assert!(frame["payload"].as_str().is_some_and(|p| !p.is_empty()));
    }
    assert_eq!(h.facade.cancel_count(), 0);
    assert_eq!(h.server.registry().count(), 2);

    h.shutdown().await;
    expect_closed(&mut second).await;
    assert_eq!(h.facade.cancel_count(), 1);
}

// ── Robustness ──

#[tokio::test]
async fn unknown_tags_keep_connection_open() {
    let h = Harness::boot().await;
    let mut calls = h.facade.observe();
    let mut ws = h.connect().await;

    send(&mut ws, json!({"type": "teleport", "payload": {"to": "mars"}})).await;
    send(&mut ws, json!({"type": "swipe", "payload": {"startX": 1}})).await;
    ws.send(Message::Text("not json".into())).await.unwrap();
    send(&mut ws, json!({"type": "open_url", "payload": "https://still.here"})).await;

    assert_eq!(
        next_call(&mut calls).await,
        FacadeCall::Navigate("https://still.here".into())
    );
    let _ = next_frame(&mut ws).await;
    assert!(h.bridge.actions().is_empty());
}

#[tokio::test]
async fn frames_are_base64_screenshots() {
    let h = Harness::boot().await;
    h.facade.set_capture(CaptureBehavior::Frame(vec![0xFF, 0xD8, 0xFF]));
    let mut ws = h.connect().await;

    let frame = next_frame(&mut ws).await;

    assert_eq!(frame["type"], "screenshot");
    assert_eq!(frame["payload"], "/9j/");
}

#[tokio::test]
async fn capture_timeout_does_not_disconnect() {
    let h = Harness::boot().await;
    h.facade.set_capture(CaptureBehavior::Hang);
    let mut ws = h.connect().await;
    h.wait_for_viewers(1).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.server.registry().count(), 1);

    h.facade.set_capture(CaptureBehavior::Frame(vec![1, 2, 3]));
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["payload"], "AQID");
}

#[tokio::test]
async fn capture_failures_do_not_disconnect() {
    let h = Harness::boot().await;
    h.facade.set_capture(CaptureBehavior::Fail);
    let mut ws = h.connect().await;
    h.wait_for_viewers(1).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    h.facade.set_capture(CaptureBehavior::Frame(vec![7]));

    let _ = next_frame(&mut ws).await;
    assert_eq!(h.server.registry().count(), 1);
}

#[tokio::test]
async fn dropped_viewer_is_unregistered() {
    let h = Harness::boot().await;
    let ws = h.connect().await;
    let mut other = h.connect().await;
    h.wait_for_viewers(2).await;

    drop(ws);

    h.wait_for_viewers(1).await;
    let _ = next_frame(&mut other).await;
    assert_eq!(h.facade.cancel_count(), 0);
}

#[tokio::test]
async fn client_close_is_clean() {
    let h = Harness::boot().await;
    let mut ws = h.connect().await;
    h.wait_for_viewers(1).await;

    ws.close(None).await.unwrap();

    h.wait_for_viewers(0).await;
}

// ── Shutdown ──

#[tokio::test]
async fn shutdown_cancels_browser_once_and_refuses_viewers() {
    let mut h = Harness::boot().await;
    let mut viewers = Vec::new();
    for _ in 0..3 {
        viewers.push(h.connect().await);
    }
    h.wait_for_viewers(3).await;
    let mut phases = h.server.shutdown().subscribe();

    h.shutdown().await;

    assert_eq!(h.facade.cancel_count(), 1);
    assert_eq!(h.server.shutdown().phase(), ShutdownPhase::Exited);
    assert!(phases.has_changed().unwrap());
    assert_eq!(h.server.registry().count(), 0);
    for ws in &mut viewers {
        expect_closed(ws).await;
    }
    assert!(connect_async(format!("ws://{}/ws", h.addr)).await.is_err());

    h.shutdown().await;
    assert_eq!(h.facade.cancel_count(), 1);
}

#[tokio::test]
async fn shutdown_with_no_viewers() {
    let mut h = Harness::boot().await;

    h.shutdown().await;

    assert_eq!(h.facade.cancel_count(), 1);
    assert!(tokio::net::TcpStream::connect(h.addr).await.is_err());
}

// ── HTTP ──

#[tokio::test]
async fn health_counts_viewers() {
    let h = Harness::boot().await;
    let _a = h.connect().await;
    let _b = h.connect().await;
    h.wait_for_viewers(2).await;

    let health = h.health().await;

    assert_eq!(health["status"], "ok");
    assert_eq!(health["viewers"], 2);
    assert_eq!(health["phase"], "running");
}

#[tokio::test]
async fn static_bundle_falls_back_to_index() {
    let h = Harness::boot().await;

    let resp = reqwest::get(format!("http://{}/viewer/settings", h.addr))
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "<html>viewer</html>");
}

#[tokio::test]
async fn viewer_requests_do_not_touch_device_without_buttons() {
    let h = Harness::boot_with(|c| c.frame_interval = Duration::from_millis(5)).await;
    let mut calls = h.facade.observe();
    let mut ws = h.connect().await;

    send(&mut ws, json!({"type": "type_text", "payload": {"text": "hello"}})).await;
    send(&mut ws, json!({"type": "send_button", "payload": "exit_fullscreen"})).await;

    assert!(matches!(next_call(&mut calls).await, FacadeCall::Evaluate(_)));
    assert!(matches!(next_call(&mut calls).await, FacadeCall::Evaluate(_)));
    assert!(h.bridge.actions().is_empty());
}
