//! Broadcast hub: the registry of live realtime connections.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use agora_protocol::{ServerEvent, Vote};

/// Connection identifier, unique for the process lifetime.
pub type ConnId = u64;

/// Registry of connected clients and their outbound event queues.
///
/// Every connection gets an unbounded channel drained by its writer
/// task, so fan-out never waits on a slow socket. Delivery is
/// best-effort: a connection whose queue is gone is removed on the
/// spot and receives nothing further.
#[derive(Default)]
pub struct BroadcastHub {
    next_id: AtomicU64,
    senders: RwLock<HashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back its id plus outbound queue.
    pub async fn register(&self) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(conn_id, tx);
        tracing::debug!(conn_id, "connection registered");
        (conn_id, rx)
    }

    pub async fn unregister(&self, conn_id: ConnId) {
        if self.senders.write().await.remove(&conn_id).is_some() {
            tracing::debug!(conn_id, "connection unregistered");
        }
    }

    /// Deliver to every connected client, pruning dead queues.
    pub async fn broadcast_all(&self, event: &ServerEvent) {
        let mut senders = self.senders.write().await;
        senders.retain(|conn_id, tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!(conn_id = *conn_id, "pruning closed connection");
            }
            delivered
        });
    }

    /// Deliver to one connection. Returns false if it is gone.
    pub async fn send_to(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        match self.senders.read().await.get(&conn_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver to a set of connections; room fan-out uses this with the
    /// sender already excluded. Returns how many queues accepted it.
    pub async fn send_to_set(&self, targets: &HashSet<ConnId>, event: &ServerEvent) -> usize {
        let senders = self.senders.read().await;
        let mut delivered = 0;
        for conn_id in targets {
            if let Some(tx) = senders.get(conn_id) {
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }

    /// Drain the ledger commit feed into global broadcasts. A single
    /// consumer task keeps broadcast order equal to commit order.
    pub fn spawn_vote_feed(
        hub: Arc<Self>,
        mut commits: mpsc::UnboundedReceiver<Vote>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(vote) = commits.recv().await {
                hub.broadcast_all(&ServerEvent::VoteUpdate(vote)).await;
            }
            tracing::debug!("vote feed closed");
        })
    }
}
