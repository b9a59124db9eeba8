use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::CredentialError;

/// Generate a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut rng = rand::thread_rng();
    SigningKey::generate(&mut rng)
}

/// Short fingerprint of a public key for logs: first 16 hex chars of SHA-256.
pub fn key_fingerprint(verifying_key: &VerifyingKey) -> String {
    let hash = Sha256::digest(verifying_key.as_bytes());
    hex::encode(hash)[..16].to_string()
}

/// Sign a payload with the issuing key.
pub fn sign_message(signing_key: &SigningKey, payload: &[u8]) -> Signature {
    signing_key.sign(payload)
}

/// Verify a payload signature against the verifying key.
pub fn verify_signature(
    verifying_key: &VerifyingKey,
    payload: &[u8],
    signature: &Signature,
) -> Result<(), CredentialError> {
    verifying_key
        .verify(payload, signature)
        .map_err(|e| CredentialError::InvalidSignature(e.to_string()))
}

/// Load an Ed25519 keypair from a file, or create a new one if the file
/// doesn't exist. The file stores the raw 32-byte Ed25519 seed with mode 0600.
pub fn load_or_create_keypair(path: &Path) -> Result<SigningKey, CredentialError> {
    if path.exists() {
        let seed_bytes = std::fs::read(path)
            .map_err(|e| CredentialError::Key(format!("read key file: {e}")))?;
        let seed: [u8; 32] = seed_bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| {
                CredentialError::Key(format!("key file is {} bytes, expected 32", bytes.len()))
            })?;
        Ok(SigningKey::from_bytes(&seed))
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CredentialError::Key(format!("create dir: {e}")))?;
        }
        let mut rng = rand::thread_rng();
        let key = SigningKey::generate(&mut rng);
        std::fs::write(path, key.to_bytes())
            .map_err(|e| CredentialError::Key(format!("write key file: {e}")))?;
        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| CredentialError::Key(format!("set permissions: {e}")))?;
        }
        Ok(key)
    }
}
