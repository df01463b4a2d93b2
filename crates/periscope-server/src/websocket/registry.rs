//! Live viewer registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use periscope_core::ViewerId;
use tracing::{debug, warn};

use super::connection::ViewerConnection;
use crate::error::ServerError;

/// Tracks connected viewers.
///
/// The map lives behind one lock that is never held across an await. There is
/// deliberately no broadcast: each viewer's frames go out through its own
/// stream loop via [`send_to`](Self::send_to).
#[derive(Default)]
pub struct SessionRegistry {
    viewers: Mutex<HashMap<ViewerId, Arc<ViewerConnection>>>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a viewer. An entry with the same ID is replaced and returned.
    pub fn register(&self, connection: Arc<ViewerConnection>) -> Option<Arc<ViewerConnection>> {
        let id = connection.id().clone();
        let previous = self.viewers.lock().insert(id.clone(), connection);
        debug!(viewer_id = %id, replaced = previous.is_some(), "viewer registered");
        previous
    }

    /// Register a viewer and tear down any connection it displaced.
    ///
    /// Returns whether an entry with the same ID was replaced.
    pub async fn admit(&self, connection: Arc<ViewerConnection>) -> bool {
        let Some(displaced) = self.register(connection) else {
            return false;
        };
        warn!(viewer_id = %displaced.id(), "viewer id reused, closing previous connection");
        teardown(&displaced).await;
        true
    }

    /// Remove a viewer, cancel its tasks and close its socket.
    ///
    /// Returns whether the viewer was registered; unregistering an absent
    /// viewer does nothing.
    pub async fn unregister(&self, id: &ViewerId) -> bool {
        let Some(connection) = self.viewers.lock().remove(id) else {
            return false;
        };
        teardown(&connection).await;
        debug!(viewer_id = %id, "viewer unregistered");
        true
    }

    /// Tear down `connection`, removing its entry only if the registry still
    /// maps its ID to this same connection.
    pub async fn release(&self, connection: &Arc<ViewerConnection>) -> bool {
        let removed = {
            let mut viewers = self.viewers.lock();
            let current = viewers
                .get(connection.id())
                .is_some_and(|entry| Arc::ptr_eq(entry, connection));
            current && viewers.remove(connection.id()).is_some()
        };
        teardown(connection).await;
        if removed {
            debug!(viewer_id = %connection.id(), "viewer unregistered");
        }
        removed
    }

    /// Write one text frame to `connection`.
    pub async fn send_to(
        &self,
        connection: &ViewerConnection,
        text: String,
    ) -> Result<(), ServerError> {
        connection.send_text(text).await
    }

    /// Number of registered viewers.
    pub fn count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ViewerId) -> bool {
        self.viewers.lock().contains_key(id)
    }
}

async fn teardown(connection: &ViewerConnection) {
    connection.token().cancel();
    connection.close().await;
}
