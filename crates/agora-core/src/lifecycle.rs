//! Agenda lifecycle engine.
//!
//! A pure function over `{now, startTime, deadline, voteLimit, voteCount,
//! manuallyClosed}`. There is no background timer: status is recomputed on
//! every admission check and on every directory read, so a transition is
//! observed exactly when something asks. Closed is terminal for voting;
//! chat and viewing remain allowed.

use chrono::{DateTime, Utc};

use agora_protocol::{Agenda, AgendaStatus};

/// Classify `agenda` at time `now` given the current vote count.
///
/// Closed causes take precedence in the order manual, deadline, limit,
/// so a status never flips between closed causes once several hold.
pub fn status_at(now: DateTime<Utc>, agenda: &Agenda, vote_count: usize) -> AgendaStatus {
    if agenda.manually_closed {
        return AgendaStatus::ClosedManually;
    }
    if let Some(deadline) = agenda.deadline {
        if now >= deadline {
            return AgendaStatus::ClosedByTime;
        }
    }
    if agenda.vote_limit > 0 && vote_count >= agenda.vote_limit as usize {
        return AgendaStatus::ClosedByLimit;
    }
    if let Some(start) = agenda.start_time {
        if now < start {
            return AgendaStatus::Pending;
        }
    }
    AgendaStatus::Open
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_protocol::UserId;
    use chrono::Duration;

    fn base_agenda() -> Agenda {
        Agenda::new(
            "test".into(),
            vec!["A".into(), "B".into()],
            UserId::from("owner"),
        )
    }

    #[test]
    fn test_no_window_no_cap_is_open() {
        let agenda = base_agenda();
        assert_eq!(status_at(Utc::now(), &agenda, 0), AgendaStatus::Open);
        assert_eq!(status_at(Utc::now(), &agenda, 10_000), AgendaStatus::Open);
    }

    #[test]
    fn test_future_start_is_pending() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.start_time = Some(now + Duration::hours(1));
        assert_eq!(status_at(now, &agenda, 0), AgendaStatus::Pending);
    }

    #[test]
    fn test_start_boundary_is_open() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.start_time = Some(now);
        assert_eq!(status_at(now, &agenda, 0), AgendaStatus::Open);
    }

    #[test]
    fn test_deadline_boundary_is_closed() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.deadline = Some(now);
        assert_eq!(status_at(now, &agenda, 0), AgendaStatus::ClosedByTime);
    }

    #[test]
    fn test_past_deadline_is_closed_by_time() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.deadline = Some(now - Duration::seconds(1));
        assert_eq!(status_at(now, &agenda, 0), AgendaStatus::ClosedByTime);
    }

    #[test]
    fn test_cap_reached_is_closed_by_limit() {
        let mut agenda = base_agenda();
        agenda.vote_limit = 2;
        assert_eq!(status_at(Utc::now(), &agenda, 1), AgendaStatus::Open);
        assert_eq!(status_at(Utc::now(), &agenda, 2), AgendaStatus::ClosedByLimit);
        assert_eq!(status_at(Utc::now(), &agenda, 3), AgendaStatus::ClosedByLimit);
    }

    #[test]
    fn test_zero_limit_means_unlimited() {
        let agenda = base_agenda();
        assert_eq!(agenda.vote_limit, 0);
        assert_eq!(status_at(Utc::now(), &agenda, 1_000_000), AgendaStatus::Open);
    }

    #[test]
    fn test_manual_close_wins_over_everything() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.manually_closed = true;
        agenda.deadline = Some(now - Duration::hours(1));
        agenda.vote_limit = 1;
        assert_eq!(status_at(now, &agenda, 5), AgendaStatus::ClosedManually);
    }

    #[test]
    fn test_deadline_wins_over_limit() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.deadline = Some(now - Duration::hours(1));
        agenda.vote_limit = 1;
        assert_eq!(status_at(now, &agenda, 5), AgendaStatus::ClosedByTime);
    }

    #[test]
    fn test_degenerate_window_never_opens() {
        // Deadline before start: pending until the deadline, closed after,
        // with no observable open interval.
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.start_time = Some(now + Duration::hours(2));
        agenda.deadline = Some(now + Duration::hours(1));

        assert_eq!(status_at(now, &agenda, 0), AgendaStatus::Pending);
        let after = now + Duration::hours(3);
        assert_eq!(status_at(after, &agenda, 0), AgendaStatus::ClosedByTime);
    }

    #[test]
    fn test_closed_is_terminal_as_time_advances() {
        let now = Utc::now();
        let mut agenda = base_agenda();
        agenda.deadline = Some(now);
        for offset_hours in [0, 1, 24, 24 * 30] {
            let at = now + Duration::hours(offset_hours);
            assert!(
                status_at(at, &agenda, 0).is_closed(),
                "agenda must stay closed at +{offset_hours}h"
            );
        }
    }
}
