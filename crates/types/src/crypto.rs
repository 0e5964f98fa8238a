//! Signing keys and signatures (secp256k1 ECDSA).
//!
//! Keys are deterministic from a seed so that committees can be rebuilt
//! reproducibly in tests and simulation.

use crate::Hash;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sbor::prelude::*;
use std::fmt;

/// SEC1-compressed public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "PublicKey({}..)", &hex[..hex.len().min(12)])
    }
}

/// Fixed-size ECDSA signature bytes. Empty until a vote is attested.
#[derive(Clone, PartialEq, Eq, Hash, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Placeholder for a vote that has not been signed yet.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wrap arbitrary bytes. Used to build deliberately malformed signatures.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("Signature(unsigned)");
        }
        let hex = hex::encode(&self.0);
        write!(f, "Signature({}..)", &hex[..hex.len().min(12)])
    }
}

/// Private signing key.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Derive a key deterministically from seed bytes.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut counter = 0u32;
        loop {
            let candidate = Hash::from_parts(&[b"concord/key", seed, &counter.to_le_bytes()]);
            // Rejects zero and values above the curve order; retry with the next counter.
            if let Ok(key) = SigningKey::from_slice(candidate.as_bytes()) {
                return Self(key);
            }
            counter += 1;
        }
    }

    pub fn public_key(&self) -> PublicKey {
        let point = self.0.verifying_key().to_encoded_point(true);
        PublicKey(point.as_bytes().to_vec())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature: EcdsaSignature = self.0.sign(message);
        Signature(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Verify `signature` over `message` against `public_key`.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key.as_bytes()) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_slice(signature.as_bytes()) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let key = SecretKey::from_seed(b"validator-0");
        let sig = key.sign(b"message");
        assert!(verify_signature(&key.public_key(), b"message", &sig));
        assert!(!verify_signature(&key.public_key(), b"other", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let a = SecretKey::from_seed(b"a");
        let b = SecretKey::from_seed(b"b");
        let sig = a.sign(b"message");
        assert!(!verify_signature(&b.public_key(), b"message", &sig));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let k1 = SecretKey::from_seed(b"seed");
        let k2 = SecretKey::from_seed(b"seed");
        assert_eq!(k1.public_key(), k2.public_key());
        assert_eq!(k1.public_key().as_bytes().len(), 33);
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let key = SecretKey::from_seed(b"x");
        assert!(!verify_signature(
            &key.public_key(),
            b"message",
            &Signature::empty()
        ));
        assert!(!verify_signature(
            &key.public_key(),
            b"message",
            &Signature::from_bytes(vec![7; 64])
        ));
    }
}
