//! Local Ed25519 implementation of the `Signer` capability.
//!
//! Production deployments plug a KMS-backed `Signer` in instead; this one
//! keeps the key in process memory and is meant for single-host setups and
//! tests. Signatures are 64-byte Ed25519 signatures, hex encoded.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use ledgerguard_contracts::error::{LedgerError, LedgerResult};
use ledgerguard_core::traits::Signer;

pub struct Ed25519Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519Signer {
    /// Derive a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }
}

impl Signer for Ed25519Signer {
    /// First 8 bytes of the public key, hex encoded.
    fn key_id(&self) -> String {
        hex::encode(&self.verifying_key.as_bytes()[..8])
    }

    fn sign(&self, bytes: &[u8]) -> LedgerResult<String> {
        Ok(hex::encode(self.signing_key.sign(bytes).to_bytes()))
    }

    fn verify(&self, bytes: &[u8], signature: &str) -> LedgerResult<bool> {
        let raw = hex::decode(signature).map_err(|e| LedgerError::Crypto {
            reason: format!("signature is not valid hex: {e}"),
        })?;
        let raw: [u8; 64] = raw.as_slice().try_into().map_err(|_| LedgerError::Crypto {
            reason: format!("signature must be 64 bytes, got {}", raw.len()),
        })?;
        let signature = Signature::from_bytes(&raw);
        Ok(self.verifying_key.verify(bytes, &signature).is_ok())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use ledgerguard_core::traits::Signer;

    use super::Ed25519Signer;

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]);
        let signature = signer.sign(b"block bytes").unwrap();

        assert_eq!(signature.len(), 128);
        assert!(signer.verify(b"block bytes", &signature).unwrap());
        assert!(!signer.verify(b"other bytes", &signature).unwrap());
    }

    /// The same seed always yields the same key.
    #[test]
    fn test_seed_is_deterministic() {
        let a = Ed25519Signer::from_seed(&[1u8; 32]);
        let b = Ed25519Signer::from_seed(&[1u8; 32]);
        assert_eq!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.key_id().len(), 16);
    }

    #[test]
    fn test_foreign_key_rejects() {
        let signer = Ed25519Signer::generate();
        let other = Ed25519Signer::generate();
        let signature = other.sign(b"payload").unwrap();
        assert!(!signer.verify(b"payload", &signature).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_crypto_error() {
        let signer = Ed25519Signer::from_seed(&[2u8; 32]);
        assert!(signer.verify(b"payload", "zz").is_err());
        assert!(signer.verify(b"payload", "abcd").is_err());
    }
}
