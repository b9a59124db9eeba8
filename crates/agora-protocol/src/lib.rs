//! Agora Protocol - Core types and wire event definitions
//!
//! Shared vocabulary for the Agora realtime voting service: agenda and
//! vote records, the JSON event envelopes exchanged over the realtime
//! channel, and the signed bearer credential that binds a user identity
//! to a connection.

pub mod auth;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod events;
pub mod types;

pub use auth::{
    current_timestamp_secs,
    issue_credential,
    verify_credential,
    Credential,
};
pub use constants::*;
pub use error::*;
pub use events::*;
pub use types::*;
