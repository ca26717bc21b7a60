use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use solace_types::events::ChangeEvent;

/// Fans change events out to every connected gateway client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every event and filters by its own topics
    broadcast_tx: broadcast::Sender<ChangeEvent>,

    /// Live connections: conn_id -> user_id
    connections: RwLock<HashMap<Uuid, Uuid>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to change events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish a change. Having no listeners is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let topic = event.topic();
        match self.inner.broadcast_tx.send(event) {
            Ok(n) => debug!("Published {:?} to {} receivers", topic, n),
            Err(_) => debug!("Published {:?} with no receivers", topic),
        }
    }

    /// Track a new connection for `user_id`. Returns its conn_id.
    pub async fn register(&self, user_id: Uuid) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.connections.write().await.insert(conn_id, user_id);
        conn_id
    }

    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}
