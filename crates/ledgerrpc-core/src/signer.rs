//! Request/transaction signing seam.
//!
//! The service authenticates every query round trip and every submitted
//! transaction. The scheme itself is pluggable behind [`Signer`]; the
//! built-in [`Ed25519Signer`] covers the common case (deterministic
//! signatures, no RNG at signing time).

use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;

use crate::error::SignError;

/// Signs canonical payload bytes on behalf of one authority.
pub trait Signer: Send + Sync + 'static {
    /// Hex-encoded public key identifying the authority.
    fn public_key(&self) -> String;

    /// Hex-encoded signature over `payload`.
    fn sign(&self, payload: &[u8]) -> String;
}

/// Ed25519 signer over a 32-byte seed.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Build from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Build from a hex-encoded 32-byte seed.
    pub fn from_hex_seed(hex_seed: &str) -> Result<Self, SignError> {
        let bytes = hex::decode(hex_seed)
            .map_err(|e| SignError::InvalidKey(format!("seed is not hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignError::InvalidKey("seed must be exactly 32 bytes".into()))?;
        Ok(Self::from_seed(seed))
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.signing_key.sign(payload).to_bytes())
    }
}

/// Serialize `value` into the canonical byte form that signatures and
/// transaction hashes are computed over.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SignError> {
    Ok(serde_json::to_vec(value)?)
}

/// Verify a hex signature against a hex public key. Used by tests and
/// by callers that double-check server-echoed payloads.
pub fn verify(public_key_hex: &str, payload: &[u8], signature_hex: &str) -> Result<(), SignError> {
    let key_bytes: [u8; 32] = hex::decode(public_key_hex)
        .map_err(|e| SignError::InvalidKey(format!("public key is not hex: {e}")))?
        .try_into()
        .map_err(|_| SignError::InvalidKey("public key must be 32 bytes".into()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;

    let sig_bytes: [u8; 64] = hex::decode(signature_hex)
        .map_err(|e| SignError::InvalidKey(format!("signature is not hex: {e}")))?
        .try_into()
        .map_err(|_| SignError::InvalidKey("signature must be 64 bytes".into()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    key.verify(payload, &signature)
        .map_err(|e| SignError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_are_deterministic_and_verify() {
        let signer = Ed25519Signer::from_seed([7u8; 32]);
        let payload = b"start list_accounts";

        let sig_a = signer.sign(payload);
        let sig_b = signer.sign(payload);
        assert_eq!(sig_a, sig_b);

        verify(&signer.public_key(), payload, &sig_a).unwrap();
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let signer = Ed25519Signer::from_seed([9u8; 32]);
        let sig = signer.sign(b"original");
        assert!(verify(&signer.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn hex_seed_round_trip() {
        let seed_hex = "11".repeat(32);
        let signer = Ed25519Signer::from_hex_seed(&seed_hex).unwrap();
        assert_eq!(signer.public_key().len(), 64);

        assert!(Ed25519Signer::from_hex_seed("abcd").is_err());
        assert!(Ed25519Signer::from_hex_seed("zz").is_err());
    }
}
