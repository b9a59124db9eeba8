//! Protocol-wide constants.

/// Default lifetime of an issued credential.
pub const DEFAULT_CREDENTIAL_TTL_SECS: i64 = 24 * 3600; // 24 hours

/// Allowed clock skew when checking credential timestamps.
pub const CREDENTIAL_SKEW_TOLERANCE_SECS: i64 = 300; // 5 minutes

/// Longest accepted chat message, in bytes.
pub const MAX_CHAT_TEXT_LEN: usize = 2000;

/// Longest accepted display name, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Longest accepted agenda title, in bytes.
pub const MAX_TITLE_LEN: usize = 200;

/// Fewest options an agenda may carry.
pub const MIN_AGENDA_OPTIONS: usize = 2;
