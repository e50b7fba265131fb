use crate::db::models::Tally;
use crate::realtime::registry::{ConnectionId, SubscriptionRegistry};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Fans computed tallies out to the observers in an event's room.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriptionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Broadcaster { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Pushes `tally` to every connection in its room without waiting on any
    /// of them. A full queue drops this update for that observer; a closed one
    /// is pruned from the registry. Returns how many observers accepted it.
    pub async fn publish(&self, tally: Tally) -> usize {
        let event_id = tally.event_id.clone();
        let members = self.registry.members(&event_id).await;
        if members.is_empty() {
            debug!(event_id = %event_id, "no observers in room");
            return 0;
        }

        let payload = Arc::new(tally);
        let mut delivered = 0;
        let mut closed: Vec<ConnectionId> = Vec::new();

        for (connection_id, tx) in members {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        event_id = %event_id,
                        connection_id = %connection_id,
                        "observer queue full, update dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(connection_id),
            }
        }

        if !closed.is_empty() {
            debug!(
                event_id = %event_id,
                count = closed.len(),
                "pruning disconnected observers"
            );
            self.registry.disconnect_all(&closed).await;
        }

        delivered
    }
}
