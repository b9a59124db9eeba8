//! Vote admission and ledger.
//!
//! `submit_vote` is the only write path for votes. The whole
//! check-then-upsert sequence for one agenda runs under that agenda's
//! async mutex, so a cap of N can never admit more than N first-time
//! votes no matter how submissions race, and two concurrent submissions
//! by the same user leave exactly one record with the last-serialized
//! timestamp. Accepted votes are enqueued on the commit feed while the
//! lock is still held, which makes broadcast order equal commit order
//! per agenda.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

use agora_protocol::{UserId, Vote};

use crate::lifecycle;
use crate::store::Store;
use crate::CoreError;

/// Registry of per-agenda mutexes. Shared between the ledger and the
/// directory so manual close and deletion serialize against submissions
/// on the same agenda.
#[derive(Clone, Default)]
pub struct AgendaLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AgendaLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the mutex for one agenda, creating it on first use.
    pub async fn acquire(&self, agenda_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut registry = self.inner.lock().await;
            registry.entry(agenda_id.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Forget the mutex for a deleted agenda. A straggler still holding
    /// the old guard finishes against a store that no longer has the
    /// agenda, so admission fails closed.
    pub async fn discard(&self, agenda_id: &str) {
        self.inner.lock().await.remove(agenda_id);
    }
}

/// Admission control and storage for votes.
pub struct VoteLedger<S> {
    store: Arc<S>,
    locks: AgendaLocks,
    commits: mpsc::UnboundedSender<Vote>,
}

impl<S> Clone for VoteLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            commits: self.commits.clone(),
        }
    }
}

impl<S: Store> VoteLedger<S> {
    /// Create a ledger over `store`. Accepted votes are pushed to
    /// `commits` in per-agenda commit order for fan-out.
    pub fn new(store: Arc<S>, locks: AgendaLocks, commits: mpsc::UnboundedSender<Vote>) -> Self {
        Self {
            store,
            locks,
            commits,
        }
    }

    /// Admit or reject one submission.
    ///
    /// Validates, in order: the agenda exists, the lifecycle engine
    /// reports `open` for (agenda, now), and the option belongs to the
    /// agenda. Then upserts keyed on (agendaId, userId): a first vote
    /// counts toward the cap, a resubmission overwrites optionId and
    /// timestamp in place. Returns the final record for broadcast.
    pub async fn submit_vote(
        &self,
        agenda_id: &str,
        user_id: UserId,
        option_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vote, CoreError> {
        let _guard = self.locks.acquire(agenda_id).await;

        let agenda = self
            .store
            .agenda(agenda_id)
            .await?
            .ok_or_else(|| CoreError::AgendaNotFound(agenda_id.to_string()))?;

        let vote_count = self.store.vote_count(agenda_id).await?;
        let status = lifecycle::status_at(now, &agenda, vote_count);
        if !status.is_open() {
            return Err(CoreError::NotOpen {
                agenda_id: agenda_id.to_string(),
                status,
            });
        }

        if !agenda.has_option(option_id) {
            return Err(CoreError::InvalidOption {
                agenda_id: agenda_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        let previous = self.store.vote(agenda_id, &user_id).await?;
        let vote = Vote {
            agenda_id: agenda_id.to_string(),
            user_id,
            option_id: option_id.to_string(),
            timestamp: now,
        };
        self.store.put_vote(vote.clone()).await?;

        tracing::debug!(
            agenda_id = %vote.agenda_id,
            user_id = %vote.user_id,
            option_id = %vote.option_id,
            resubmission = previous.is_some(),
            "Vote recorded"
        );

        // Still under the agenda guard: feed order is commit order.
        if self.commits.send(vote.clone()).is_err() {
            tracing::debug!("vote feed receiver dropped; broadcast skipped");
        }

        Ok(vote)
    }

    /// The same count the directory reads use for the participation cap.
    pub async fn vote_count(&self, agenda_id: &str) -> Result<usize, CoreError> {
        Ok(self.store.vote_count(agenda_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use agora_protocol::{Agenda, AgendaOption, AgendaStatus};
    use chrono::Duration;

    fn agenda_with_options(id: &str, vote_limit: u32) -> Agenda {
        Agenda {
            id: id.to_string(),
            title: format!("agenda {id}"),
            description: None,
            options: vec![
                AgendaOption {
                    id: "o1".into(),
                    text: "First".into(),
                },
                AgendaOption {
                    id: "o2".into(),
                    text: "Second".into(),
                },
            ],
            owner_id: UserId::from("owner"),
            start_time: None,
            deadline: None,
            vote_limit,
            tags: Vec::new(),
            created_at: Utc::now(),
            manually_closed: false,
        }
    }

    async fn setup(
        agenda: Agenda,
    ) -> (
        Arc<MemoryStore>,
        VoteLedger<MemoryStore>,
        mpsc::UnboundedReceiver<Vote>,
    ) {
        let store = Arc::new(MemoryStore::new());
        store.put_agenda(agenda).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let ledger = VoteLedger::new(store.clone(), AgendaLocks::new(), tx);
        (store, ledger, rx)
    }

    #[tokio::test]
    async fn test_submit_requires_existing_agenda() {
        let (_store, ledger, _rx) = setup(agenda_with_options("a1", 0)).await;
        let err = ledger
            .submit_vote("missing", UserId::from("u1"), "o1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AgendaNotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_submit_rejects_pending_window() {
        let now = Utc::now();
        let mut agenda = agenda_with_options("a1", 0);
        agenda.start_time = Some(now + Duration::hours(1));
        let (_store, ledger, mut rx) = setup(agenda).await;

        let err = ledger
            .submit_vote("a1", UserId::from("u1"), "o1", now)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::NotOpen {
                    status: AgendaStatus::Pending,
                    ..
                }
            ),
            "got {err:?}"
        );
        assert!(rx.try_recv().is_err(), "rejected vote must not reach the feed");
    }

    #[tokio::test]
    async fn test_submit_rejects_past_deadline_despite_cap_headroom() {
        let now = Utc::now();
        let mut agenda = agenda_with_options("a1", 100);
        agenda.deadline = Some(now - Duration::seconds(1));
        let (_store, ledger, mut rx) = setup(agenda).await;

        let err = ledger
            .submit_vote("a1", UserId::from("u1"), "o1", now)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::NotOpen {
                    status: AgendaStatus::ClosedByTime,
                    ..
                }
            ),
            "got {err:?}"
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_rejects_manual_close_inside_window() {
        let now = Utc::now();
        let mut agenda = agenda_with_options("a1", 0);
        agenda.deadline = Some(now + Duration::hours(1));
        agenda.manually_closed = true;
        let (_store, ledger, _rx) = setup(agenda).await;

        let err = ledger
            .submit_vote("a1", UserId::from("u1"), "o1", now)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::NotOpen {
                    status: AgendaStatus::ClosedManually,
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_option() {
        let (store, ledger, _rx) = setup(agenda_with_options("a1", 0)).await;
        let err = ledger
            .submit_vote("a1", UserId::from("u1"), "nope", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOption { .. }), "got {err:?}");
        assert_eq!(store.vote_count("a1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_submit_inserts_and_feeds() {
        let (store, ledger, mut rx) = setup(agenda_with_options("a1", 0)).await;
        let vote = ledger
            .submit_vote("a1", UserId::from("u1"), "o1", Utc::now())
            .await
            .unwrap();
        assert_eq!(vote.option_id, "o1");
        assert_eq!(store.vote_count("a1").await.unwrap(), 1);

        let fed = rx.try_recv().unwrap();
        assert_eq!(fed, vote);
    }

    #[tokio::test]
    async fn test_resubmission_overwrites_in_place() {
        let (store, ledger, mut rx) = setup(agenda_with_options("a1", 0)).await;
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);

        ledger
            .submit_vote("a1", UserId::from("u1"), "o1", t1)
            .await
            .unwrap();
        let second = ledger
            .submit_vote("a1", UserId::from("u1"), "o2", t2)
            .await
            .unwrap();

        assert_eq!(store.vote_count("a1").await.unwrap(), 1, "count must not change");
        let stored = store.vote("a1", &UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(stored.option_id, "o2");
        assert_eq!(stored.timestamp, t2);
        assert_eq!(stored, second);

        // Both accepted submissions reach the feed as upsert-shaped events.
        assert_eq!(rx.try_recv().unwrap().option_id, "o1");
        assert_eq!(rx.try_recv().unwrap().option_id, "o2");
    }

    #[tokio::test]
    async fn test_cap_blocks_all_submissions_once_reached() {
        let (store, ledger, _rx) = setup(agenda_with_options("a1", 1)).await;
        ledger
            .submit_vote("a1", UserId::from("u1"), "o1", Utc::now())
            .await
            .unwrap();

        let err = ledger
            .submit_vote("a1", UserId::from("u2"), "o1", Utc::now())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::NotOpen {
                    status: AgendaStatus::ClosedByLimit,
                    ..
                }
            ),
            "got {err:?}"
        );

        // Closed is terminal: even the admitted user's resubmission is refused.
        let err = ledger
            .submit_vote("a1", UserId::from("u1"), "o2", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotOpen { .. }), "got {err:?}");
        assert_eq!(store.vote_count("a1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_feed_preserves_submission_order() {
        let (_store, ledger, mut rx) = setup(agenda_with_options("a1", 0)).await;
        for user in ["u1", "u2", "u3"] {
            ledger
                .submit_vote("a1", UserId::from(user), "o1", Utc::now())
                .await
                .unwrap();
        }
        for expected in ["u1", "u2", "u3"] {
            assert_eq!(rx.try_recv().unwrap().user_id.as_str(), expected);
        }
    }
}
