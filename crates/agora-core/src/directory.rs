//! Agenda directory: bootstrap read views and agenda authoring.
//!
//! Reads are read-through: every view recomputes the derived status and
//! vote count from the store at request time, with the same lifecycle
//! function the ledger uses for admission. Close and delete take the
//! same per-agenda mutex as `submit_vote`, so an owner closing an
//! agenda can never interleave with a half-admitted vote.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use agora_protocol::{
    Agenda, AgendaView, Identity, NewAgenda, UserId, UserProfile, Vote, MAX_TITLE_LEN,
    MIN_AGENDA_OPTIONS,
};

use crate::ledger::AgendaLocks;
use crate::lifecycle;
use crate::store::Store;
use crate::CoreError;

/// Read views plus the authoring surface for agendas.
pub struct AgendaDirectory<S> {
    store: Arc<S>,
    locks: AgendaLocks,
}

impl<S> Clone for AgendaDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: Store> AgendaDirectory<S> {
    /// `locks` must be the same registry the vote ledger uses.
    pub fn new(store: Arc<S>, locks: AgendaLocks) -> Self {
        Self { store, locks }
    }

    /// All agendas with status and vote count derived at `now`.
    pub async fn agenda_views(&self, now: DateTime<Utc>) -> Result<Vec<AgendaView>, CoreError> {
        let agendas = self.store.agendas().await?;
        let mut views = Vec::with_capacity(agendas.len());
        for agenda in agendas {
            let vote_count = self.store.vote_count(&agenda.id).await?;
            let status = lifecycle::status_at(now, &agenda, vote_count);
            views.push(AgendaView {
                agenda,
                status,
                vote_count,
            });
        }
        Ok(views)
    }

    /// One agenda with status and vote count derived at `now`.
    pub async fn agenda_view(
        &self,
        agenda_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AgendaView, CoreError> {
        let agenda = self
            .store
            .agenda(agenda_id)
            .await?
            .ok_or_else(|| CoreError::AgendaNotFound(agenda_id.to_string()))?;
        let vote_count = self.store.vote_count(agenda_id).await?;
        let status = lifecycle::status_at(now, &agenda, vote_count);
        Ok(AgendaView {
            agenda,
            status,
            vote_count,
        })
    }

    pub async fn users(&self) -> Result<Vec<UserProfile>, CoreError> {
        Ok(self.store.users().await?)
    }

    pub async fn votes(&self) -> Result<Vec<Vote>, CoreError> {
        Ok(self.store.votes().await?)
    }

    pub async fn register_user(&self, user: UserProfile) -> Result<(), CoreError> {
        Ok(self.store.put_user(user).await?)
    }

    /// Validate and persist a new agenda owned by `owner`.
    pub async fn create_agenda(
        &self,
        new: NewAgenda,
        owner: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Agenda, CoreError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be blank".into()));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(CoreError::Validation(format!(
                "title exceeds {MAX_TITLE_LEN} bytes"
            )));
        }

        let mut option_texts = Vec::with_capacity(new.options.len());
        for text in &new.options {
            let text = text.trim();
            if text.is_empty() {
                return Err(CoreError::Validation("option text must not be blank".into()));
            }
            option_texts.push(text.to_string());
        }
        if option_texts.len() < MIN_AGENDA_OPTIONS {
            return Err(CoreError::Validation(format!(
                "agenda needs at least {MIN_AGENDA_OPTIONS} options"
            )));
        }

        if let (Some(start), Some(deadline)) = (new.start_time, new.deadline) {
            if deadline <= start {
                return Err(CoreError::Validation(
                    "deadline must fall after start time".into(),
                ));
            }
        }

        let mut agenda = Agenda::new(title, option_texts, owner.user_id.clone());
        agenda.description = new
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        agenda.start_time = new.start_time;
        agenda.deadline = new.deadline;
        agenda.vote_limit = new.vote_limit;
        agenda.tags = new.tags;
        agenda.created_at = now;

        self.store.put_agenda(agenda.clone()).await?;
        tracing::info!(
            agenda_id = %agenda.id,
            owner = %owner.user_id,
            options = agenda.options.len(),
            "Agenda created"
        );
        Ok(agenda)
    }

    /// Mark an agenda closed by its owner. Idempotent; the closed state
    /// is terminal for admission regardless of window or cap headroom.
    pub async fn close_agenda(
        &self,
        agenda_id: &str,
        caller: &UserId,
    ) -> Result<Agenda, CoreError> {
        let _guard = self.locks.acquire(agenda_id).await;

        let mut agenda = self
            .store
            .agenda(agenda_id)
            .await?
            .ok_or_else(|| CoreError::AgendaNotFound(agenda_id.to_string()))?;
        if agenda.owner_id != *caller {
            return Err(CoreError::Forbidden {
                user_id: caller.to_string(),
                agenda_id: agenda_id.to_string(),
            });
        }

        if !agenda.manually_closed {
            agenda.manually_closed = true;
            self.store.put_agenda(agenda.clone()).await?;
            tracing::info!(agenda_id = %agenda.id, "Agenda closed by owner");
        }
        Ok(agenda)
    }

    /// Remove an agenda and all of its votes. Returns the number of
    /// votes the cascade removed.
    pub async fn delete_agenda(
        &self,
        agenda_id: &str,
        caller: &UserId,
    ) -> Result<usize, CoreError> {
        let guard = self.locks.acquire(agenda_id).await;

        let agenda = self
            .store
            .agenda(agenda_id)
            .await?
            .ok_or_else(|| CoreError::AgendaNotFound(agenda_id.to_string()))?;
        if agenda.owner_id != *caller {
            return Err(CoreError::Forbidden {
                user_id: caller.to_string(),
                agenda_id: agenda_id.to_string(),
            });
        }

        let removed_votes = self.store.remove_votes_for(agenda_id).await?;
        self.store.remove_agenda(agenda_id).await?;
        drop(guard);
        self.locks.discard(agenda_id).await;

        tracing::info!(
            agenda_id = %agenda_id,
            removed_votes,
            "Agenda deleted"
        );
        Ok(removed_votes)
    }

    /// Load agendas from a JSON seed file, skipping ids already present.
    /// Returns the number of agendas inserted.
    pub async fn load_seed(&self, path: &Path) -> Result<usize, CoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Seed(format!("read {}: {e}", path.display())))?;
        let agendas: Vec<Agenda> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Seed(format!("parse {}: {e}", path.display())))?;

        let mut loaded = 0;
        let mut skipped = 0;
        for agenda in agendas {
            if self.store.agenda(&agenda.id).await?.is_some() {
                skipped += 1;
                continue;
            }
            self.store.put_agenda(agenda).await?;
            loaded += 1;
        }
        tracing::info!(loaded, skipped, path = %path.display(), "Seed agendas loaded");
        Ok(loaded)
    }
}
