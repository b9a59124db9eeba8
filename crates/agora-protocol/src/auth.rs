//! Signed bearer credentials.
//!
//! A credential binds `{userId, displayName}` to a validity window and is
//! signed by the issuing authority's Ed25519 key. On the wire it travels as
//! hex-encoded JSON. Verification happens once, at connection handshake;
//! expiry of an already-bound credential only takes effect on the next
//! connection attempt.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::constants::{CREDENTIAL_SKEW_TOLERANCE_SECS, MAX_DISPLAY_NAME_LEN};
use crate::crypto;
use crate::{CredentialError, Identity, UserId};

/// A signed identity assertion presented at handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub user_id: UserId,
    pub display_name: String,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
    /// Ed25519 signature over the canonical JSON of the fields above.
    pub signature: Vec<u8>,
}

impl Credential {
    /// Hex-encoded JSON wire form, as carried in the handshake event and
    /// in REST `Authorization: Bearer` headers.
    pub fn encode(&self) -> Result<String, CredentialError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| CredentialError::Encode(e.to_string()))?;
        Ok(hex::encode(bytes))
    }
}

pub fn current_timestamp_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Canonical bytes covered by the signature.
fn signing_payload(user_id: &UserId, display_name: &str, issued_at: i64, expires_at: i64) -> Vec<u8> {
    let canonical = serde_json::json!({
        "userId": user_id,
        "displayName": display_name,
        "issuedAt": issued_at,
        "expiresAt": expires_at,
    });
    serde_json::to_vec(&canonical).unwrap_or_default()
}

/// Issue a credential for `{user_id, display_name}` valid for `ttl_secs`
/// starting at `now`.
pub fn issue_credential(
    signing_key: &SigningKey,
    user_id: UserId,
    display_name: &str,
    ttl_secs: i64,
    now: i64,
) -> Result<Credential, CredentialError> {
    if user_id.as_str().trim().is_empty() {
        return Err(CredentialError::Malformed("empty userId".into()));
    }
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(CredentialError::Malformed("empty displayName".into()));
    }
    if display_name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(CredentialError::Malformed(format!(
            "displayName longer than {MAX_DISPLAY_NAME_LEN} bytes"
        )));
    }

    let expires_at = now + ttl_secs;
    let payload = signing_payload(&user_id, display_name, now, expires_at);
    let signature = crypto::sign_message(signing_key, &payload).to_bytes().to_vec();

    Ok(Credential {
        user_id,
        display_name: display_name.to_string(),
        issued_at: now,
        expires_at,
        signature,
    })
}

/// Verify an encoded credential against the issuer key at time `now` and
/// resolve the identity it asserts.
///
/// Checks, in order: wire decoding, the validity window (with clock-skew
/// tolerance), then the signature over the canonical payload.
pub fn verify_credential(
    encoded: &str,
    verifying_key: &VerifyingKey,
    now: i64,
) -> Result<Identity, CredentialError> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| CredentialError::Malformed(format!("invalid hex: {e}")))?;
    let cred: Credential = serde_json::from_slice(&bytes)
        .map_err(|e| CredentialError::Malformed(format!("invalid payload: {e}")))?;

    if cred.user_id.as_str().trim().is_empty() {
        return Err(CredentialError::Malformed("empty userId".into()));
    }
    if cred.display_name.trim().is_empty() {
        return Err(CredentialError::Malformed("empty displayName".into()));
    }

    let expired_for = now - cred.expires_at;
    if expired_for > CREDENTIAL_SKEW_TOLERANCE_SECS {
        return Err(CredentialError::Expired(expired_for));
    }
    let early_by = cred.issued_at - now;
    if early_by > CREDENTIAL_SKEW_TOLERANCE_SECS {
        return Err(CredentialError::IssuedInFuture(early_by));
    }

    let sig_arr: [u8; 64] = cred
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CredentialError::Malformed("signature wrong length".into()))?;
    let signature = Signature::from_bytes(&sig_arr);

    let payload = signing_payload(
        &cred.user_id,
        &cred.display_name,
        cred.issued_at,
        cred.expires_at,
    );
    crypto::verify_signature(verifying_key, &payload, &signature)?;

    Ok(Identity {
        user_id: cred.user_id,
        display_name: cred.display_name,
    })
}
