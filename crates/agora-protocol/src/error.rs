use thiserror::Error;

/// Errors raised while issuing or verifying bearer credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential expired {0}s ago")]
    Expired(i64),

    #[error("credential issued {0}s in the future")]
    IssuedInFuture(i64),

    #[error("invalid credential signature: {0}")]
    InvalidSignature(String),

    #[error("credential encoding failed: {0}")]
    Encode(String),

    #[error("key handling failed: {0}")]
    Key(String),
}
