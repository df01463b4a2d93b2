//! Viewer session lifecycle, from upgrade through disconnect.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{Stream, StreamExt};
use metrics::{counter, gauge};
use periscope_core::ViewerId;
use tracing::{Instrument, debug, info, instrument, warn};

use super::connection::ViewerConnection;
use super::stream::stream_frames;
use crate::dispatcher::Dispatcher;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

/// Run one viewer session.
///
/// 1. Registers the viewer
/// 2. Starts its frame stream
/// 3. Dispatches inbound messages until the socket closes or the viewer
///    token fires
/// 4. Unregisters and waits for the stream to stop
#[instrument(skip_all, fields(viewer_id = %viewer_id, remote = %remote))]
pub async fn run_viewer(socket: WebSocket, viewer_id: ViewerId, remote: SocketAddr, state: AppState) {
    let (sink, mut inbound) = socket.split();
    let connection = Arc::new(ViewerConnection::new(
        viewer_id,
        Some(remote),
        Box::pin(sink),
        state.shutdown.viewer_token(),
    ));
    let _ = state.registry.admit(Arc::clone(&connection)).await;
    info!(viewers = state.registry.count(), "viewer connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let streamer = tokio::spawn(
        stream_frames(
            Arc::clone(&connection),
            Arc::clone(&state.registry),
            Arc::clone(&state.facade),
            state.timing,
        )
        .in_current_span(),
    );

    read_commands(&connection, &mut inbound, &state.dispatcher).await;

    let _ = state.registry.release(&connection).await;
    match streamer.await {
        Ok(exit) => debug!(?exit, "frame stream stopped"),
        Err(error) => warn!(%error, "frame stream task failed"),
    }
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(viewers = state.registry.count(), "viewer disconnected");
}

async fn read_commands<S>(connection: &ViewerConnection, inbound: &mut S, dispatcher: &Dispatcher)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let token = connection.token().clone();
    loop {
        let next = tokio::select! {
            () = token.cancelled() => {
                debug!("viewer cancelled");
                return;
            }
            next = inbound.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                let _ = dispatcher.dispatch(connection.id(), text.as_str());
            }
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = dispatcher.dispatch(connection.id(), text);
                }
                Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => {
                info!("viewer closed connection");
                return;
            }
            Some(Err(error)) => {
                debug!(%error, "viewer read failed");
                return;
            }
        }
    }
}
