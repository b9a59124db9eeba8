use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a user, resolved from a credential at handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Resolved user identity bound to a connection for its lifetime.
/// Never mutated after the handshake; discarded on connection close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

/// A user record as served by the bootstrap reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
}

/// One selectable option within an agenda. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaOption {
    pub id: String,
    pub text: String,
}

/// A proposal with options, a voting window, and an optional participation cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agenda {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<AgendaOption>,
    pub owner_id: UserId,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Participation cap; 0 means unlimited.
    #[serde(default)]
    pub vote_limit: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub manually_closed: bool,
}

impl Agenda {
    /// Create an agenda from option texts, generating fresh identifiers.
    pub fn new(title: String, option_texts: Vec<String>, owner_id: UserId) -> Self {
        let options = option_texts
            .into_iter()
            .map(|text| AgendaOption {
                id: Uuid::new_v4().to_string(),
                text,
            })
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description: None,
            options,
            owner_id,
            start_time: None,
            deadline: None,
            vote_limit: 0,
            tags: Vec::new(),
            created_at: Utc::now(),
            manually_closed: false,
        }
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// Derived lifecycle classification of an agenda at a point in time.
/// Never persisted; recomputed on every admission check and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgendaStatus {
    /// Start time lies in the future; no votes admitted yet.
    Pending,
    /// Inside the voting window with cap headroom; votes admitted.
    Open,
    /// Deadline passed.
    ClosedByTime,
    /// Participation cap reached.
    ClosedByLimit,
    /// Closed by its owner.
    ClosedManually,
}

impl AgendaStatus {
    pub fn is_open(self) -> bool {
        self == AgendaStatus::Open
    }

    pub fn is_closed(self) -> bool {
        matches!(
            self,
            AgendaStatus::ClosedByTime | AgendaStatus::ClosedByLimit | AgendaStatus::ClosedManually
        )
    }
}

impl fmt::Display for AgendaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgendaStatus::Pending => "pending",
            AgendaStatus::Open => "open",
            AgendaStatus::ClosedByTime => "closedByTime",
            AgendaStatus::ClosedByLimit => "closedByLimit",
            AgendaStatus::ClosedManually => "closedManually",
        };
        write!(f, "{label}")
    }
}

/// A counted vote. The (agendaId, userId) pair is the uniqueness key:
/// resubmission overwrites optionId and timestamp in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub agenda_id: String,
    pub user_id: UserId,
    pub option_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Sender snapshot carried on a relayed chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSender {
    pub id: UserId,
    pub name: String,
}

/// A chat message scoped to one agenda room. Ephemeral: relayed to the
/// room's current members and not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub agenda_id: String,
    pub sender: ChatSender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(agenda_id: String, sender: ChatSender, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agenda_id,
            sender,
            text,
            timestamp: Utc::now(),
        }
    }
}

/// Authoring input for a new agenda, as submitted over REST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgenda {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Option texts; identifiers are generated on creation.
    pub options: Vec<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vote_limit: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Read model served by the directory: the stored agenda plus its
/// derived status and current vote count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaView {
    #[serde(flatten)]
    pub agenda: Agenda,
    pub status: AgendaStatus,
    pub vote_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agenda_new_generates_distinct_option_ids() {
        let agenda = Agenda::new(
            "Lunch spot".into(),
            vec!["Ramen".into(), "Tacos".into()],
            UserId::from("u1"),
        );
        assert_eq!(agenda.options.len(), 2);
        assert_ne!(agenda.options[0].id, agenda.options[1].id);
        assert!(agenda.has_option(&agenda.options[0].id));
        assert!(!agenda.has_option("missing"));
    }

    #[test]
    fn test_status_predicates() {
        assert!(AgendaStatus::Open.is_open());
        assert!(!AgendaStatus::Open.is_closed());
        assert!(AgendaStatus::ClosedByLimit.is_closed());
        assert!(!AgendaStatus::Pending.is_open());
        assert!(!AgendaStatus::Pending.is_closed());
    }

    #[test]
    fn test_agenda_wire_fields_are_camel_case() {
        let mut agenda = Agenda::new("Title".into(), vec!["A".into(), "B".into()], UserId::from("u1"));
        agenda.vote_limit = 3;
        let json = serde_json::to_value(&agenda).unwrap();
        assert!(json.get("ownerId").is_some());
        assert!(json.get("voteLimit").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn test_agenda_view_flattens_record() {
        let agenda = Agenda::new("Title".into(), vec!["A".into(), "B".into()], UserId::from("u1"));
        let view = AgendaView {
            agenda: agenda.clone(),
            status: AgendaStatus::Open,
            vote_count: 1,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], agenda.id);
        assert_eq!(json["status"], "open");
        assert_eq!(json["voteCount"], 1);
    }
}
