//! Wire events exchanged over the realtime channel.
//!
//! Every frame is a JSON object tagged by a `type` field with camelCase
//! payload keys, e.g. `{"type":"voteSubmit","agendaId":"...","optionId":"..."}`.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, UserId, Vote};

/// Events a client may send after the connection is established.
/// `handshake` must be the first frame; nothing else is processed before
/// an identity is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Handshake { credential: String },
    VoteSubmit { agenda_id: String, option_id: String },
    JoinRoom { agenda_id: String },
    LeaveRoom { agenda_id: String },
    ChatMessage { agenda_id: String, text: String },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Confirms the handshake and echoes the bound identity.
    HandshakeAck { user_id: UserId, display_name: String },
    /// An accepted vote, fanned out to every connected client. Clients
    /// merge by (agendaId, userId), replacing any prior entry.
    VoteUpdate(Vote),
    /// A chat message relayed to the other members of its room.
    ChatMessage(ChatMessage),
    /// Delivered only to the submitter when a vote was not admitted.
    VoteRejected { agenda_id: String, reason: RejectReason },
}

/// Why a vote submission was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    AgendaNotFound,
    NotOpen,
    InvalidOption,
    StoreUnavailable,
}
