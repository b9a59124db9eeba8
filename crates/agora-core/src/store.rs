//! Durable store seam.
//!
//! The core treats persistence as a generic keyed document store. `Store`
//! is the async seam a real backend implements; `MemoryStore` is the
//! bundled in-process backend. Votes are keyed by (agendaId, userId), the
//! uniqueness key of the ledger's upsert.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::RwLock;

use agora_protocol::{Agenda, UserId, UserProfile, Vote};

/// Failure of the underlying store. Transient: a failed submission is
/// safe to retry; retries are the caller's responsibility.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Async access to agendas, votes, and user profiles.
pub trait Store: Send + Sync {
    fn agenda<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, Option<Agenda>>;
    fn agendas(&self) -> StoreFuture<'_, Vec<Agenda>>;
    fn put_agenda(&self, agenda: Agenda) -> StoreFuture<'_, ()>;
    fn remove_agenda<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, bool>;

    fn vote<'a>(&'a self, agenda_id: &'a str, user_id: &'a UserId) -> StoreFuture<'a, Option<Vote>>;
    fn votes(&self) -> StoreFuture<'_, Vec<Vote>>;
    fn vote_count<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, usize>;
    fn put_vote(&self, vote: Vote) -> StoreFuture<'_, ()>;
    fn remove_votes_for<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, usize>;

    fn users(&self) -> StoreFuture<'_, Vec<UserProfile>>;
    fn put_user(&self, user: UserProfile) -> StoreFuture<'_, ()>;
}

#[derive(Default)]
struct MemoryInner {
    agendas: HashMap<String, Agenda>,
    /// Per-agenda vote maps keyed by user, so the upsert key and the
    /// cascade on agenda deletion fall out of the layout.
    votes: HashMap<String, HashMap<UserId, Vote>>,
    users: HashMap<UserId, UserProfile>,
}

/// In-process store backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn agenda<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, Option<Agenda>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.agendas.get(agenda_id).cloned())
        })
    }

    fn agendas(&self) -> StoreFuture<'_, Vec<Agenda>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut all: Vec<Agenda> = inner.agendas.values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(all)
        })
    }

    fn put_agenda(&self, agenda: Agenda) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            inner.agendas.insert(agenda.id.clone(), agenda);
            Ok(())
        })
    }

    fn remove_agenda<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            Ok(inner.agendas.remove(agenda_id).is_some())
        })
    }

    fn vote<'a>(&'a self, agenda_id: &'a str, user_id: &'a UserId) -> StoreFuture<'a, Option<Vote>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .votes
                .get(agenda_id)
                .and_then(|by_user| by_user.get(user_id))
                .cloned())
        })
    }

    fn votes(&self) -> StoreFuture<'_, Vec<Vote>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut all: Vec<Vote> = inner
                .votes
                .values()
                .flat_map(|by_user| by_user.values().cloned())
                .collect();
            all.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.user_id.cmp(&b.user_id))
            });
            Ok(all)
        })
    }

    fn vote_count<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.votes.get(agenda_id).map(|v| v.len()).unwrap_or(0))
        })
    }

    fn put_vote(&self, vote: Vote) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            inner
                .votes
                .entry(vote.agenda_id.clone())
                .or_default()
                .insert(vote.user_id.clone(), vote);
            Ok(())
        })
    }

    fn remove_votes_for<'a>(&'a self, agenda_id: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            Ok(inner
                .votes
                .remove(agenda_id)
                .map(|by_user| by_user.len())
                .unwrap_or(0))
        })
    }

    fn users(&self) -> StoreFuture<'_, Vec<UserProfile>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut all: Vec<UserProfile> = inner.users.values().cloned().collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(all)
        })
    }

    fn put_user(&self, user: UserProfile) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            inner.users.insert(user.id.clone(), user);
            Ok(())
        })
    }
}
