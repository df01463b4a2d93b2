//! `RelayServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use periscope_browser::AutomationFacade;
use periscope_core::ViewerId;
use periscope_platform::DeviceBridge;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownOrchestrator;
use crate::websocket::registry::SessionRegistry;
use crate::websocket::session::run_viewer;
use crate::websocket::stream::FrameTiming;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live viewers.
    pub registry: Arc<SessionRegistry>,
    /// Command routing.
    pub dispatcher: Arc<Dispatcher>,
    /// The shared browser.
    pub facade: Arc<dyn AutomationFacade>,
    /// Shutdown state machine.
    pub shutdown: Arc<ShutdownOrchestrator>,
    /// Frame pacing for new viewers.
    pub timing: FrameTiming,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    state: AppState,
}

impl RelayServer {
    /// Server relaying between viewers and `facade`.
    pub fn new(
        config: RelayConfig,
        facade: Arc<dyn AutomationFacade>,
        bridge: Arc<dyn DeviceBridge>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownOrchestrator::new(
            Arc::clone(&facade),
            config.drain_timeout,
            config.settle_period,
        ));
        let state = AppState {
            registry: Arc::new(SessionRegistry::new()),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&facade), bridge)),
            facade,
            shutdown,
            timing: FrameTiming {
                interval: config.frame_interval,
                capture_timeout: config.capture_timeout,
            },
            metrics,
            start_time: Instant::now(),
        };
        Self { config, state }
    }

    /// Build the router: `/ws`, `/health`, `/metrics`, then the viewer bundle
    /// with `index.html` as the fallback for unknown paths.
    pub fn router(&self) -> Router {
        let index = self.config.static_dir.join("index.html");
        let bundle = ServeDir::new(&self.config.static_dir).fallback(ServeFile::new(index));

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback_service(bundle)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve in a background task.
    ///
    /// The listener stops accepting once the shutdown token is cancelled.
    /// Returns the bound address and the server task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
            if let Err(error) = served {
                error!(%error, "server stopped with error");
            }
        });

        info!(%local_addr, "relay listening");
        Ok((local_addr, handle))
    }

    /// Shutdown orchestrator.
    pub fn shutdown(&self) -> &Arc<ShutdownOrchestrator> {
        &self.state.shutdown
    }

    /// Viewer registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    /// Server configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };
    let viewer_id = ViewerId::new();
    let tracker = state.shutdown.tracker().clone();
    upgrade.on_upgrade(move |socket| tracker.track_future(run_viewer(socket, viewer_id, remote, state)))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.count(),
        state.shutdown.phase(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
