use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use crate::error::AuditError;

/// Capability for authenticating record hashes.
///
/// The store calls the configured signer on every append; when none is
/// configured, record signatures stay empty and verification treats them as
/// not-applicable.
pub trait RecordSigner: Send + Sync {
    /// Produce a hex-encoded signature over the given `data_hash`.
    fn sign(&self, data_hash: &str) -> Result<String, AuditError>;
}

/// Ed25519 record signer.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Ed25519Signer {
    /// Wrap an existing signing key.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a fresh keypair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a signer from 32 raw key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuditError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuditError::InvalidKey("expected 32 key bytes".to_owned()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&array),
        })
    }

    /// The public half used for verification.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl RecordSigner for Ed25519Signer {
    fn sign(&self, data_hash: &str) -> Result<String, AuditError> {
        let signature = self.key.sign(data_hash.as_bytes());
        Ok(hex::encode(signature.to_bytes()))
    }
}

/// Verify a hex-encoded signature over a record hash.
pub fn verify_signature(
    key: &VerifyingKey,
    data_hash: &str,
    signature_hex: &str,
) -> Result<bool, AuditError> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| AuditError::InvalidKey(format!("signature is not hex: {e}")))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| AuditError::InvalidKey(format!("malformed signature: {e}")))?;
    Ok(key.verify(data_hash.as_bytes(), &signature).is_ok())
}
