//! Room membership routing for agenda chat.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::hub::ConnId;

#[derive(Default)]
struct RoomsInner {
    rooms: HashMap<String, HashSet<ConnId>>,
    joined: HashMap<ConnId, HashSet<String>>,
}

/// Tracks which connections belong to which agenda rooms.
///
/// Join and leave are idempotent. A connection may sit in any number of
/// rooms at once; holding clients to one room at a time is the session
/// layer's policy, not enforced here. Membership only gates chat relay,
/// never vote delivery.
#[derive(Default)]
pub struct RoomRouter {
    inner: RwLock<RoomsInner>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns false if it was already in.
    pub async fn join(&self, agenda_id: &str, conn_id: ConnId) -> bool {
        let mut inner = self.inner.write().await;
        let added = inner
            .rooms
            .entry(agenda_id.to_string())
            .or_default()
            .insert(conn_id);
        if added {
            inner
                .joined
                .entry(conn_id)
                .or_default()
                .insert(agenda_id.to_string());
            tracing::debug!(conn_id, agenda_id, "joined room");
        }
        added
    }

    /// Remove a connection from a room. Returns false if it was not in.
    pub async fn leave(&self, agenda_id: &str, conn_id: ConnId) -> bool {
        let mut inner = self.inner.write().await;
        let removed = match inner.rooms.get_mut(agenda_id) {
            Some(members) => members.remove(&conn_id),
            None => false,
        };
        if removed {
            if inner.rooms.get(agenda_id).is_some_and(|m| m.is_empty()) {
                inner.rooms.remove(agenda_id);
            }
            if let Some(joined) = inner.joined.get_mut(&conn_id) {
                joined.remove(agenda_id);
                if joined.is_empty() {
                    inner.joined.remove(&conn_id);
                }
            }
            tracing::debug!(conn_id, agenda_id, "left room");
        }
        removed
    }

    /// Snapshot of a room's current members.
    pub async fn members(&self, agenda_id: &str) -> HashSet<ConnId> {
        self.inner
            .read()
            .await
            .rooms
            .get(agenda_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_member(&self, agenda_id: &str, conn_id: ConnId) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(agenda_id)
            .is_some_and(|m| m.contains(&conn_id))
    }

    /// Remove a dropped connection from every room it joined. Returns
    /// how many rooms it was removed from.
    pub async fn drop_connection(&self, conn_id: ConnId) -> usize {
        let mut inner = self.inner.write().await;
        let Some(joined) = inner.joined.remove(&conn_id) else {
            return 0;
        };
        let mut removed = 0;
        for agenda_id in joined {
            if let Some(members) = inner.rooms.get_mut(&agenda_id) {
                if members.remove(&conn_id) {
                    removed += 1;
                }
                if members.is_empty() {
                    inner.rooms.remove(&agenda_id);
                }
            }
        }
        if removed > 0 {
            tracing::debug!(conn_id, rooms = removed, "connection dropped from rooms");
        }
        removed
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
