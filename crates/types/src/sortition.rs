//! Committee selection.
//!
//! The agreement core never computes eligibility itself; it asks a
//! [`Sortition`] implementation who may vote, with what weight, and who
//! proposes. [`StaticSortition`] is the stake-weighted implementation used in
//! tests and simulation: every validator sits on every committee with its
//! full stake, and proposers rotate round-robin.

use crate::{Hash, Period, Position, PublicKey, Round, Step, ValidatorId, ValidatorSet};
use sbor::prelude::*;
use std::fmt;

/// Proof of committee selection carried by a vote.
#[derive(Clone, PartialEq, Eq, Hash, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "Credential({}..)", &hex[..hex.len().min(12)])
    }
}

/// Committee membership, weights and proposer selection.
pub trait Sortition: Send + Sync {
    /// This node's validator identity.
    fn local_validator_id(&self) -> ValidatorId;

    /// Every validator that may ever be selected.
    fn committee(&self) -> &ValidatorSet;

    /// Total weight of the committee for a step. Thresholds are fractions of it.
    fn committee_weight(&self, round: Round, step: Step) -> u64;

    /// Weight and credential for `validator` at `position`, or `None` if it
    /// was not selected.
    fn credential(&self, validator: ValidatorId, position: Position) -> Option<(u64, Credential)>;

    /// Check a credential and return the weight it proves.
    fn verify_credential(
        &self,
        sender: ValidatorId,
        position: Position,
        credential: &Credential,
    ) -> Option<u64>;

    /// The proposer selected for `(round, period)`.
    fn proposer(&self, round: Round, period: Period) -> Option<ValidatorId>;

    fn is_proposer(&self, validator: ValidatorId, round: Round, period: Period) -> bool {
        self.proposer(round, period) == Some(validator)
    }

    fn public_key(&self, validator: ValidatorId) -> Option<&PublicKey> {
        self.committee().get(validator).map(|v| &v.public_key)
    }
}

/// Stake-weighted sortition over a fixed validator set.
#[derive(Debug, Clone)]
pub struct StaticSortition {
    local_validator_id: ValidatorId,
    validator_set: ValidatorSet,
}

impl StaticSortition {
    pub fn new(local_validator_id: ValidatorId, validator_set: ValidatorSet) -> Self {
        Self {
            local_validator_id,
            validator_set,
        }
    }

    /// Same committee, viewed from another validator.
    pub fn for_validator(&self, validator_id: ValidatorId) -> Self {
        Self {
            local_validator_id: validator_id,
            validator_set: self.validator_set.clone(),
        }
    }

    fn expected_credential(validator: ValidatorId, position: Position) -> Credential {
        let digest = Hash::from_parts(&[
            b"concord/credential",
            &validator.0.to_le_bytes(),
            &position.round.0.to_le_bytes(),
            &position.period.0.to_le_bytes(),
            &position.step.0.to_le_bytes(),
        ]);
        Credential(digest.as_bytes().to_vec())
    }
}

impl Sortition for StaticSortition {
    fn local_validator_id(&self) -> ValidatorId {
        self.local_validator_id
    }

    fn committee(&self) -> &ValidatorSet {
        &self.validator_set
    }

    fn committee_weight(&self, _round: Round, _step: Step) -> u64 {
        self.validator_set.total_voting_power()
    }

    fn credential(&self, validator: ValidatorId, position: Position) -> Option<(u64, Credential)> {
        let weight = self.validator_set.voting_power(validator);
        if weight == 0 {
            return None;
        }
        Some((weight, Self::expected_credential(validator, position)))
    }

    fn verify_credential(
        &self,
        sender: ValidatorId,
        position: Position,
        credential: &Credential,
    ) -> Option<u64> {
        let weight = self.validator_set.voting_power(sender);
        if weight == 0 || *credential != Self::expected_credential(sender, position) {
            return None;
        }
        Some(weight)
    }

    fn proposer(&self, round: Round, period: Period) -> Option<ValidatorId> {
        let n = self.validator_set.len() as u64;
        if n == 0 {
            return None;
        }
        let idx = round.0.wrapping_add(period.0) % n;
        self.validator_set
            .get_by_index(idx as usize)
            .map(|v| v.validator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SecretKey, ValidatorInfo};

    fn sortition(powers: &[u64]) -> StaticSortition {
        let validators = powers
            .iter()
            .enumerate()
            .map(|(i, &power)| ValidatorInfo {
                validator_id: ValidatorId(i as u64),
                public_key: SecretKey::from_seed(&[i as u8]).public_key(),
                voting_power: power,
            })
            .collect();
        StaticSortition::new(ValidatorId(0), ValidatorSet::new(validators))
    }

    #[test]
    fn test_credential_verifies_to_stake() {
        let s = sortition(&[3, 5]);
        let position = Position::new(2, 0, 1);
        let (weight, credential) = s.credential(ValidatorId(1), position).unwrap();
        assert_eq!(weight, 5);
        assert_eq!(
            s.verify_credential(ValidatorId(1), position, &credential),
            Some(5)
        );
        assert_eq!(
            s.verify_credential(ValidatorId(0), position, &credential),
            None
        );
        assert_eq!(
            s.verify_credential(ValidatorId(1), Position::new(2, 0, 2), &credential),
            None
        );
    }

    #[test]
    fn test_zero_stake_not_selected() {
        let s = sortition(&[1, 0]);
        assert!(s.credential(ValidatorId(1), Position::new(1, 0, 1)).is_none());
        assert!(s.credential(ValidatorId(9), Position::new(1, 0, 1)).is_none());
    }

    #[test]
    fn test_proposer_rotates() {
        let s = sortition(&[1, 1, 1, 1]);
        assert_eq!(s.proposer(Round(1), Period(0)), Some(ValidatorId(1)));
        assert_eq!(s.proposer(Round(1), Period(1)), Some(ValidatorId(2)));
        assert_eq!(s.proposer(Round(3), Period(1)), Some(ValidatorId(0)));
        assert!(s.is_proposer(ValidatorId(2), Round(2), Period(0)));
        assert_eq!(s.committee_weight(Round(1), Step::SOFT), 4);
    }
}
