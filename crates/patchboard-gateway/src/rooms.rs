use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use patchboard_types::events::GatewayEvent;

/// Registry of live sessions, keyed by user identity. A user may have any
/// number of concurrent sessions (tabs, devices); each one registers on
/// connect and is removed on disconnect. `publish` fans an event out to
/// every session in the user's room, best-effort.
#[derive(Clone)]
pub struct Rooms {
    inner: Arc<RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a session in the user's room. Returns the session id and the
    /// receiving end the connection loop drains.
    pub async fn join(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(session_id, tx);
        debug!("Session {} joined room {}", session_id, user_id);
        (session_id, rx)
    }

    /// Remove a session from the user's room; drops the room once empty.
    pub async fn leave(&self, user_id: Uuid, session_id: Uuid) {
        let mut rooms = self.inner.write().await;
        if let Some(sessions) = rooms.get_mut(&user_id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                rooms.remove(&user_id);
            }
        }
        debug!("Session {} left room {}", session_id, user_id);
    }

    /// Push an event to every live session of the user. Send failures mean
    /// the session is mid-disconnect; delivery is best-effort and the write
    /// that triggered the publish has already succeeded.
    pub async fn publish(&self, user_id: Uuid, event: GatewayEvent) {
        let rooms = self.inner.read().await;
        if let Some(sessions) = rooms.get(&user_id) {
            for tx in sessions.values() {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Number of live sessions for a user.
    pub async fn session_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .get(&user_id)
            .map_or(0, |sessions| sessions.len())
    }
}

impl Default for Rooms {
    fn default() -> Self {
        Self::new()
    }
}
