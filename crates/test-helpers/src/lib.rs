//! Test helpers for Concord: properly-signed fixtures for crypto testing.
//!
//! Fixtures carry real secp256k1 signatures and sortition credentials, so
//! tests exercise the actual verification paths.
//!
//! # Example
//!
//! ```rust
//! use concord_test_helpers::{fixtures, TestCommittee};
//! use concord_types::{verify_signature, Hash, Position, Value};
//!
//! let committee = TestCommittee::new(4, 42);
//! let value = Value::Proposal(Hash::from_bytes(b"block"));
//! let vote = fixtures::make_signed_vote(&committee, 0, Position::new(1, 0, 1), value);
//!
//! assert!(verify_signature(
//!     committee.public_key(0),
//!     &vote.signing_message(),
//!     &vote.signature,
//! ));
//! ```

pub mod byzantine;
pub mod fixtures;

use concord_types::{
    PublicKey, SecretKey, StaticSortition, ValidatorId, ValidatorInfo, ValidatorSet,
};
use std::sync::Arc;

/// A test committee of validators with deterministic keys and unit stake.
pub struct TestCommittee {
    keys: Vec<SecretKey>,
    public_keys: Vec<PublicKey>,
    validator_set: ValidatorSet,
}

impl std::fmt::Debug for TestCommittee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCommittee")
            .field("size", &self.keys.len())
            .field("total_weight", &self.validator_set.total_voting_power())
            .finish()
    }
}

impl TestCommittee {
    /// Create a committee of `size` validators, each with stake 1.
    ///
    /// The seed makes key generation deterministic; different seeds produce
    /// different committees.
    pub fn new(size: usize, seed: u64) -> Self {
        Self::with_stakes(&vec![1; size], seed)
    }

    /// Create a committee where validator `i` holds `stakes[i]`.
    pub fn with_stakes(stakes: &[u64], seed: u64) -> Self {
        let mut keys = Vec::with_capacity(stakes.len());
        let mut public_keys = Vec::with_capacity(stakes.len());
        let mut validators = Vec::with_capacity(stakes.len());

        for (i, &stake) in stakes.iter().enumerate() {
            let mut seed_bytes = [0u8; 24];
            let key_seed = seed.wrapping_add(i as u64).wrapping_mul(0x517cc1b727220a95);
            seed_bytes[..8].copy_from_slice(&key_seed.to_le_bytes());
            seed_bytes[8..16].copy_from_slice(&(i as u64).to_le_bytes());
            seed_bytes[16..24].copy_from_slice(&seed.to_le_bytes());

            let key = SecretKey::from_seed(&seed_bytes);
            let public_key = key.public_key();
            validators.push(ValidatorInfo {
                validator_id: ValidatorId(i as u64),
                public_key: public_key.clone(),
                voting_power: stake,
            });
            keys.push(key);
            public_keys.push(public_key);
        }

        Self {
            keys,
            public_keys,
            validator_set: ValidatorSet::new(validators),
        }
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// # Panics
    ///
    /// Panics if `idx >= size()`.
    pub fn secret_key(&self, idx: usize) -> &SecretKey {
        &self.keys[idx]
    }

    /// # Panics
    ///
    /// Panics if `idx >= size()`.
    pub fn public_key(&self, idx: usize) -> &PublicKey {
        &self.public_keys[idx]
    }

    pub fn validator_id(&self, idx: usize) -> ValidatorId {
        ValidatorId(idx as u64)
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        &self.validator_set
    }

    /// Sortition over this committee as seen by validator `idx`.
    pub fn sortition(&self, idx: usize) -> Arc<StaticSortition> {
        Arc::new(StaticSortition::new(
            self.validator_id(idx),
            self.validator_set.clone(),
        ))
    }

    /// Smallest count of unit-stake members strictly above two thirds.
    pub fn quorum_threshold(&self) -> usize {
        (self.size() * 2 / 3) + 1
    }

    /// The first `quorum_threshold()` indices.
    pub fn quorum_indices(&self) -> Vec<usize> {
        (0..self.quorum_threshold()).collect()
    }
}
