//! The shared Chrome session behind [`AutomationFacade`].
//!
//! Every operation takes the read side of an `RwLock` gate and races the
//! session's cancellation token. [`CdpSession::cancel`] flips the cancelled
//! flag, cancels the token so in-flight calls bail out, then takes the write
//! side before tearing down the CDP clients and the Chrome process. A capture
//! or command therefore never overlaps teardown, and anything issued after
//! cancellation fails fast with [`BrowserError::Cancelled`].

use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use periscope_core::input::BODY_READY_SCRIPT;
use periscope_core::{TouchPhase, TouchPoint};
use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cdp::{CdpClient, CdpEvent, wait_for_endpoints};
use crate::error::BrowserError;
use crate::facade::AutomationFacade;
use crate::launch::LaunchOptions;

/// Bound on ordinary CDP commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// How long `navigate` waits for the new document's body.
const BODY_WAIT: Duration = Duration::from_secs(10);
const BODY_POLL: Duration = Duration::from_millis(100);

/// Target types that count as popups when they are not the controlled page.
const POPUP_TARGET_TYPES: [&str; 2] = ["page", "window"];

/// A launched Chrome driven over CDP.
pub struct CdpSession {
    page: CdpClient,
    browser: CdpClient,
    page_target_id: String,
    gate: RwLock<()>,
    cancelled: AtomicBool,
    token: CancellationToken,
    chrome: Mutex<Option<Child>>,
}

impl CdpSession {
    /// Launch Chrome, attach to its first page and start closing popups.
    #[instrument(skip_all, fields(chrome = %options.chrome_path.display()))]
    pub async fn launch(options: &LaunchOptions) -> Result<Arc<Self>, BrowserError> {
        // Find a free port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").map_err(|e| {
            BrowserError::LaunchFailed {
                context: format!("bind port: {e}"),
            }
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("local_addr: {e}"),
            })?
            .port();
        drop(listener);

        if let Err(e) = std::fs::create_dir_all(&options.user_data_dir) {
            warn!(dir = %options.user_data_dir.display(), error = %e, "could not create user data dir");
        }

        let mut child = Command::new(&options.chrome_path)
            .args(options.args(port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed {
                context: e.to_string(),
            })?;

        let endpoints = wait_for_endpoints(port, &mut child).await?;
        let browser = CdpClient::connect(&endpoints.browser_ws).await?;
        let page = CdpClient::connect(&endpoints.page_ws).await?;
        info!(port, target = %endpoints.page_target_id, "attached to Chrome");

        let session = Arc::new(Self::from_clients(
            page,
            browser,
            endpoints.page_target_id,
            Some(child),
        ));
        session.watch_popups().await?;
        Ok(session)
    }

    fn from_clients(
        page: CdpClient,
        browser: CdpClient,
        page_target_id: String,
        chrome: Option<Child>,
    ) -> Self {
        Self {
            page,
            browser,
            page_target_id,
            gate: RwLock::new(()),
            cancelled: AtomicBool::new(false),
            token: CancellationToken::new(),
            chrome: Mutex::new(chrome),
        }
    }

    /// Id of the controlled page target.
    pub fn page_target_id(&self) -> &str {
        &self.page_target_id
    }

    /// Whether [`cancel`](AutomationFacade::cancel) has run.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Turn on target discovery and close every new page/window target that
    /// is not the controlled page.
    async fn watch_popups(self: &Arc<Self>) -> Result<(), BrowserError> {
        let events = self.browser.subscribe();
        let _ = self
            .browser_call("Target.setDiscoverTargets", json!({ "discover": true }))
            .await?;
        drop(tokio::spawn(popup_watcher(Arc::clone(self), events)));
        Ok(())
    }

    async fn enter(&self) -> Result<RwLockReadGuard<'_, ()>, BrowserError> {
        if self.is_cancelled() {
            return Err(BrowserError::Cancelled);
        }
        let guard = self.gate.read().await;
        if self.is_cancelled() {
            return Err(BrowserError::Cancelled);
        }
        Ok(guard)
    }

    async fn guarded<T, F>(&self, op: F) -> Result<T, BrowserError>
    where
        F: Future<Output = Result<T, BrowserError>> + Send,
    {
        let _guard = self.enter().await?;
        tokio::select! {
            result = op => result,
            () = self.token.cancelled() => Err(BrowserError::Cancelled),
        }
    }

    async fn page_call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.guarded(self.page.send(method, params, COMMAND_TIMEOUT))
            .await
    }

    async fn browser_call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.guarded(self.browser.send(method, params, COMMAND_TIMEOUT))
            .await
    }

    async fn wait_for_body(&self, url: &str) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + BODY_WAIT;
        loop {
            if let Ok(Value::Bool(true)) = self.evaluate(BODY_READY_SCRIPT).await {
                return Ok(());
            }
            if self.is_cancelled() {
                return Err(BrowserError::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::timeout(BODY_WAIT, format!("body of {url}")));
            }
            tokio::time::sleep(BODY_POLL).await;
        }
    }
}

async fn popup_watcher(session: Arc<CdpSession>, mut events: broadcast::Receiver<CdpEvent>) {
    loop {
        let event = tokio::select! {
            () = session.token.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                if let Some(target_id) = popup_target(&event, &session.page_target_id) {
                    info!(%target_id, "closing popup");
                    if let Err(e) = session.close_popup(&target_id).await {
                        warn!(%target_id, error = %e, "failed to close popup");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "popup watcher lagged behind target events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("popup watcher stopped");
}

/// Target id of a newly created popup, if `event` announces one.
pub fn popup_target(event: &CdpEvent, controlled_id: &str) -> Option<String> {
    if event.method != "Target.targetCreated" {
        return None;
    }
    let info = &event.params["targetInfo"];
    let kind = info["type"].as_str()?;
    let id = info["targetId"].as_str()?;
    (POPUP_TARGET_TYPES.contains(&kind) && id != controlled_id).then(|| id.to_owned())
}

#[async_trait]
impl AutomationFacade for CdpSession {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let result = self
            .page_call("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| match e {
                BrowserError::Cancelled => e,
                other => BrowserError::NavigationFailed {
                    url: url.into(),
                    reason: other.to_string(),
                },
            })?;
        if let Some(error_text) = result["errorText"].as_str() {
            return Err(BrowserError::NavigationFailed {
                url: url.into(),
                reason: error_text.into(),
            });
        }
        self.wait_for_body(url).await
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let result = self
            .page_call(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let msg = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("evaluation error");
            return Err(BrowserError::ActionFailed {
                action: "evaluate".into(),
                reason: msg.into(),
            });
        }
        Ok(result["result"]["value"].clone())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        let _ = self
            .page_call(
                "Input.dispatchMouseEvent",
                json!({ "type": "mouseMoved", "x": x, "y": y }),
            )
            .await?;
        for kind in ["mousePressed", "mouseReleased"] {
            let _ = self
                .page_call(
                    "Input.dispatchMouseEvent",
                    json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
                )
                .await?;
        }
        Ok(())
    }

    async fn dispatch_touch(&self, point: &TouchPoint) -> Result<(), BrowserError> {
        let touch_points = if point.phase == TouchPhase::End {
            json!([])
        } else {
            json!([{ "x": point.x, "y": point.y }])
        };
        let _ = self
            .page_call(
                "Input.dispatchTouchEvent",
                json!({ "type": point.phase.as_cdp(), "touchPoints": touch_points }),
            )
            .await?;
        Ok(())
    }

    async fn capture_frame(&self, timeout: Duration) -> Result<Vec<u8>, BrowserError> {
        let result = self
            .guarded(self.page.send(
                "Page.captureScreenshot",
                json!({ "format": "jpeg", "captureBeyondViewport": false }),
                timeout,
            ))
            .await?;
        let data = result["data"]
            .as_str()
            .ok_or_else(|| BrowserError::ActionFailed {
                action: "capture".into(),
                reason: "no data in response".into(),
            })?;
        STANDARD
            .decode(data)
            .map_err(|e| BrowserError::ActionFailed {
                action: "capture".into(),
                reason: format!("base64 decode: {e}"),
            })
    }

    async fn close_popup(&self, target_id: &str) -> Result<(), BrowserError> {
        let _ = self
            .browser_call("Target.closeTarget", json!({ "targetId": target_id }))
            .await?;
        Ok(())
    }

    async fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        let _exclusive = self.gate.write().await;
        self.page.close();
        self.browser.close();
        if let Some(mut child) = self.chrome.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill Chrome");
            }
        }
        info!("browser session cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    fn created(target_id: &str, kind: &str) -> CdpEvent {
        CdpEvent {
            method: "Target.targetCreated".into(),
            params: json!({ "targetInfo": { "targetId": target_id, "type": kind } }),
        }
    }

    #[test]
    fn new_page_target_is_popup() {
        assert_eq!(popup_target(&created("T2", "page"), "T1"), Some("T2".into()));
        assert_eq!(popup_target(&created("T3", "window"), "T1"), Some("T3".into()));
    }

    #[test]
    fn controlled_page_is_not_popup() {
        assert_eq!(popup_target(&created("T1", "page"), "T1"), None);
    }

    #[test]
    fn workers_are_not_popups() {
        assert_eq!(popup_target(&created("W", "service_worker"), "T1"), None);
    }

    #[test]
    fn other_events_are_ignored() {
        let event = CdpEvent {
            method: "Target.targetDestroyed".into(),
            params: json!({ "targetId": "T2" }),
        };
        assert_eq!(popup_target(&event, "T1"), None);
    }

    /// Fake DevTools endpoint that answers every command. Screenshots return
    /// base64 `"jpeg"`; `Runtime.evaluate` returns `true`.
    async fn fake_endpoint() -> (String, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = tokio::sync::mpsc::unbounded_channel();
        drop(tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let req: Value = serde_json::from_str(&text).unwrap();
                let method = req["method"].as_str().unwrap().to_owned();
                let _ = seen_tx.send(method.clone());
                let result = match method.as_str() {
                    "Page.captureScreenshot" => json!({ "data": STANDARD.encode(b"jpeg") }),
                    "Runtime.evaluate" => json!({ "result": { "type": "boolean", "value": true } }),
                    _ => json!({}),
                };
                let reply = json!({ "id": req["id"], "result": result });
                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                    break;
                }
            }
        }));
        (format!("ws://{addr}"), seen_rx)
    }

    async fn session() -> (
        CdpSession,
        tokio::sync::mpsc::UnboundedReceiver<String>,
        tokio::sync::mpsc::UnboundedReceiver<String>,
    ) {
        let (page_url, page_seen) = fake_endpoint().await;
        let (browser_url, browser_seen) = fake_endpoint().await;
        let page = CdpClient::connect(&page_url).await.unwrap();
        let browser = CdpClient::connect(&browser_url).await.unwrap();
        (
            CdpSession::from_clients(page, browser, "T1".into(), None),
            page_seen,
            browser_seen,
        )
    }

    #[tokio::test]
    async fn capture_decodes_jpeg() {
        let (session, mut page_seen, _) = session().await;
        let bytes = session.capture_frame(Duration::from_secs(2)).await.unwrap();
        assert_eq!(bytes, b"jpeg");
        assert_eq!(page_seen.recv().await.unwrap(), "Page.captureScreenshot");
    }

    #[tokio::test]
    async fn click_sends_move_press_release() {
        let (session, mut page_seen, _) = session().await;
        session.click_at(12.5, 40.0).await.unwrap();
        for _ in 0..3 {
            assert_eq!(page_seen.recv().await.unwrap(), "Input.dispatchMouseEvent");
        }
    }

    #[tokio::test]
    async fn navigate_waits_for_body() {
        let (session, mut page_seen, _) = session().await;
        session.navigate("https://example.com").await.unwrap();
        assert_eq!(page_seen.recv().await.unwrap(), "Page.navigate");
        assert_eq!(page_seen.recv().await.unwrap(), "Runtime.evaluate");
    }

    #[tokio::test]
    async fn close_popup_goes_to_browser_endpoint() {
        let (session, _, mut browser_seen) = session().await;
        session.close_popup("T9").await.unwrap();
        assert_eq!(browser_seen.recv().await.unwrap(), "Target.closeTarget");
    }

    #[tokio::test]
    async fn cancelled_session_fails_fast() {
        let (session, _, _) = session().await;
        session.cancel().await;
        session.cancel().await;
        assert!(session.is_cancelled());
        assert!(matches!(
            session.capture_frame(Duration::from_secs(2)).await,
            Err(BrowserError::Cancelled)
        ));
        assert!(matches!(
            session.evaluate("1").await,
            Err(BrowserError::Cancelled)
        ));
    }
}
