//! Validator set types.

use crate::{PublicKey, ValidatorId};
use sbor::prelude::*;

/// Information about a validator.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ValidatorInfo {
    /// Unique identifier for this validator.
    pub validator_id: ValidatorId,

    /// Key votes and proposals are verified against.
    pub public_key: PublicKey,

    /// Stake weight.
    pub voting_power: u64,
}

/// A set of validators, ordered by validator ID.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor, Default)]
pub struct ValidatorSet {
    pub validators: Vec<ValidatorInfo>,
}

impl ValidatorSet {
    pub fn new(mut validators: Vec<ValidatorInfo>) -> Self {
        validators.sort_by_key(|v| v.validator_id);
        Self { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_voting_power(&self) -> u64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }

    /// Find a validator by ID.
    pub fn get(&self, validator_id: ValidatorId) -> Option<&ValidatorInfo> {
        self.validators
            .binary_search_by_key(&validator_id, |v| v.validator_id)
            .ok()
            .map(|idx| &self.validators[idx])
    }

    pub fn get_by_index(&self, index: usize) -> Option<&ValidatorInfo> {
        self.validators.get(index)
    }

    pub fn contains(&self, validator_id: ValidatorId) -> bool {
        self.get(validator_id).is_some()
    }

    pub fn voting_power(&self, validator_id: ValidatorId) -> u64 {
        self.get(validator_id).map_or(0, |v| v.voting_power)
    }

    pub fn ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.validators.iter().map(|v| v.validator_id)
    }
}
