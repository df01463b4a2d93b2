//! Per-viewer connection state.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use periscope_core::ViewerId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ServerError;

/// Write half of a viewer socket.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Bound on taking the write lock plus the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One connected viewer.
///
/// Writes go through a single async lock, so a close waits for an in-flight
/// frame instead of cutting it.
pub struct ViewerConnection {
    id: ViewerId,
    remote: Option<SocketAddr>,
    alive: AtomicBool,
    sink: Mutex<Option<FrameSink>>,
    token: CancellationToken,
}

impl ViewerConnection {
    /// Wrap a socket write half.
    pub fn new(
        id: ViewerId,
        remote: Option<SocketAddr>,
        sink: FrameSink,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            remote,
            alive: AtomicBool::new(true),
            sink: Mutex::new(Some(sink)),
            token,
        }
    }

    /// Viewer ID.
    pub fn id(&self) -> &ViewerId {
        &self.id
    }

    /// Peer address, when known.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// False once a send failed or the socket was closed.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Cancelled when the viewer is unregistered or the server drains.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) async fn send_text(&self, text: String) -> Result<(), ServerError> {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(ServerError::ConnectionClosed);
        };
        if let Err(error) = sink.send(Message::Text(text.into())).await {
            self.alive.store(false, Ordering::Relaxed);
            return Err(ServerError::Send(error));
        }
        Ok(())
    }

    /// Close the socket. Gives up after [`CLOSE_TIMEOUT`], including while a
    /// stalled send still holds the write lock.
    pub(crate) async fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        let closing = async {
            let mut guard = self.sink.lock().await;
            match guard.take() {
                Some(mut sink) => sink.close().await,
                None => Ok(()),
            }
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => debug!(viewer_id = %self.id, %error, "close handshake failed"),
            Err(_) => debug!(viewer_id = %self.id, "close timed out"),
        }
    }
}
