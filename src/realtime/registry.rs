use crate::db::models::Tally;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

pub type ConnectionId = Uuid;
pub type TallySender = mpsc::Sender<Arc<Tally>>;
pub type TallyReceiver = mpsc::Receiver<Arc<Tally>>;

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, TallySender>,
    /// event_id -> connections in that room.
    rooms: HashMap<String, HashSet<ConnectionId>>,
    /// connection -> rooms it has joined.
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

/// Tracks which observer connections are in which event room.
///
/// All three maps sit behind one lock, so a publish never sees a connection
/// that is half removed.
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
    buffer: usize,
}

impl SubscriptionRegistry {
    pub fn new(buffer: usize) -> Self {
        SubscriptionRegistry {
            state: RwLock::new(RegistryState::default()),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new observer and returns the queue its updates arrive on.
    pub async fn connect(&self) -> (ConnectionId, TallyReceiver) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.state.write().await.connections.insert(id, tx);
        debug!(connection_id = %id, "observer connected");
        (id, rx)
    }

    /// Adds the connection to the room for `event_id`. Returns `false` when it
    /// was already a member or is no longer connected.
    pub async fn join(&self, connection_id: ConnectionId, event_id: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(&connection_id) {
            return false;
        }

        let added = state
            .rooms
            .entry(event_id.to_string())
            .or_default()
            .insert(connection_id);
        if added {
            state
                .memberships
                .entry(connection_id)
                .or_default()
                .insert(event_id.to_string());
        }
        added
    }

    pub async fn leave(&self, connection_id: ConnectionId, event_id: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = match state.rooms.get_mut(event_id) {
            Some(members) => {
                let removed = members.remove(&connection_id);
                if members.is_empty() {
                    state.rooms.remove(event_id);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = state.memberships.get_mut(&connection_id) {
            joined.remove(event_id);
            if joined.is_empty() {
                state.memberships.remove(&connection_id);
            }
        }
        removed
    }

    /// Drops the connection and removes it from every room it joined.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        remove_connection(&mut state, connection_id);
    }

    pub(crate) async fn disconnect_all(&self, connection_ids: &[ConnectionId]) {
        if connection_ids.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for id in connection_ids {
            remove_connection(&mut state, *id);
        }
    }

    /// Snapshot of the senders currently in the room for `event_id`.
    pub async fn members(&self, event_id: &str) -> Vec<(ConnectionId, TallySender)> {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(event_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| state.connections.get(id).map(|tx| (*id, tx.clone())))
            .collect()
    }

    pub async fn room_size(&self, event_id: &str) -> usize {
        self.state
            .read()
            .await
            .rooms
            .get(event_id)
            .map_or(0, HashSet::len)
    }

    pub async fn rooms_of(&self, connection_id: ConnectionId) -> Vec<String> {
        let state = self.state.read().await;
        let mut rooms: Vec<String> = state
            .memberships
            .get(&connection_id)
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }
}

/// Disconnects its connection from the registry when dropped, for transports
/// whose only disconnect signal is the response stream going away.
pub struct ConnectionGuard {
    registry: Arc<SubscriptionRegistry>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn new(registry: Arc<SubscriptionRegistry>, connection_id: ConnectionId) -> Self {
        ConnectionGuard {
            registry,
            connection_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let registry = Arc::clone(&self.registry);
        let connection_id = self.connection_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.disconnect(connection_id).await;
                });
            }
            Err(_) => {
                // Runtime is shutting down; the registry goes with it.
                debug!(connection_id = %connection_id, "no runtime to disconnect observer");
            }
        }
    }
}

fn remove_connection(state: &mut RegistryState, connection_id: ConnectionId) {
    state.connections.remove(&connection_id);
    if let Some(joined) = state.memberships.remove(&connection_id) {
        for event_id in joined {
            if let Some(members) = state.rooms.get_mut(&event_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    state.rooms.remove(&event_id);
                }
            }
        }
    }
    debug!(connection_id = %connection_id, "observer disconnected");
}
