use agora_protocol::AgendaStatus;
use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the directory and the vote ledger.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("agenda not found: {0}")]
    AgendaNotFound(String),

    #[error("agenda {agenda_id} is not open (status: {status})")]
    NotOpen {
        agenda_id: String,
        status: AgendaStatus,
    },

    #[error("option {option_id} does not belong to agenda {agenda_id}")]
    InvalidOption {
        agenda_id: String,
        option_id: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user {user_id} does not own agenda {agenda_id}")]
    Forbidden { user_id: String, agenda_id: String },

    #[error("seed file error: {0}")]
    Seed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
