//! Vote bundles (certificates).

use crate::{Period, Position, Round, Step, StepKind, ValidatorId, Value, Vote};
use sbor::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons a bundle fails structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("bundle contains no votes")]
    Empty,

    #[error("vote from {0} does not match the bundle's position or value")]
    VoteMismatch(ValidatorId),

    #[error("sender {0} appears more than once")]
    DuplicateSender(ValidatorId),

    #[error("sender {0} has zero weight")]
    ZeroWeight(ValidatorId),

    #[error("sender {0} is not a committee member")]
    NotInCommittee(ValidatorId),

    #[error("bundle weight {weight} below threshold {threshold}")]
    InsufficientWeight { weight: u64, threshold: u64 },

    #[error("{0:?} bundles cannot carry bottom")]
    BottomNotAllowed(StepKind),

    #[error("propose-step bundles are not valid")]
    ProposeStep,

    #[error("bundle weight overflows u64")]
    WeightOverflow,
}

/// Votes for one `(round, period, step, value)` whose weight proves quorum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, BasicSbor)]
pub struct Bundle {
    pub round: Round,
    pub period: Period,
    pub step: Step,
    pub value: Value,
    /// Constituent votes, ordered by sender.
    pub votes: Vec<Vote>,
}

impl Bundle {
    /// Build a bundle from votes, ordering them by sender.
    pub fn new(position: Position, value: Value, mut votes: Vec<Vote>) -> Self {
        votes.sort_by_key(|v| v.sender);
        Self {
            round: position.round,
            period: position.period,
            step: position.step,
            value,
            votes,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            round: self.round,
            period: self.period,
            step: self.step,
        }
    }

    /// Sum of the constituent vote weights.
    ///
    /// Weights are claimed by the sender until the votes are verified, so the
    /// sum is checked.
    pub fn total_weight(&self) -> Result<u64, BundleError> {
        self.votes
            .iter()
            .try_fold(0u64, |acc, v| acc.checked_add(v.weight))
            .ok_or(BundleError::WeightOverflow)
    }

    pub fn senders(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.votes.iter().map(|v| v.sender)
    }

    /// Checks that need no committee context: every vote matches the
    /// bundle, senders are distinct and weights are non-zero.
    pub fn check_structure(&self) -> Result<(), BundleError> {
        match self.step.kind() {
            StepKind::Propose => return Err(BundleError::ProposeStep),
            kind @ (StepKind::Soft | StepKind::Cert) if self.value.is_bottom() => {
                return Err(BundleError::BottomNotAllowed(kind));
            }
            _ => {}
        }
        if self.votes.is_empty() {
            return Err(BundleError::Empty);
        }

        let position = self.position();
        let mut seen = BTreeSet::new();
        for vote in &self.votes {
            if vote.position() != position || vote.value != self.value {
                return Err(BundleError::VoteMismatch(vote.sender));
            }
            if !seen.insert(vote.sender) {
                return Err(BundleError::DuplicateSender(vote.sender));
            }
            if vote.weight == 0 {
                return Err(BundleError::ZeroWeight(vote.sender));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credential, Hash};

    fn vote(sender: u64, position: Position, value: Value) -> Vote {
        Vote::unsigned(
            ValidatorId(sender),
            position,
            value,
            1,
            Credential::default(),
        )
    }

    #[test]
    fn test_new_orders_votes() {
        let position = Position::new(1, 0, 2);
        let value = Value::Proposal(Hash::from_bytes(b"v"));
        let bundle = Bundle::new(
            position,
            value,
            vec![vote(3, position, value), vote(1, position, value)],
        );
        let senders: Vec<_> = bundle.senders().collect();
        assert_eq!(senders, vec![ValidatorId(1), ValidatorId(3)]);
        assert_eq!(bundle.total_weight(), Ok(2));
        assert!(bundle.check_structure().is_ok());
    }

    #[test]
    fn test_mismatched_vote_rejected() {
        let position = Position::new(1, 0, 2);
        let value = Value::Proposal(Hash::from_bytes(b"v"));
        let other = Position::new(1, 1, 2);
        let bundle = Bundle::new(
            position,
            value,
            vec![vote(1, position, value), vote(2, other, value)],
        );
        assert_eq!(
            bundle.check_structure(),
            Err(BundleError::VoteMismatch(ValidatorId(2)))
        );
    }

    #[test]
    fn test_duplicate_sender_rejected() {
        let position = Position::new(1, 0, 1);
        let value = Value::Proposal(Hash::from_bytes(b"v"));
        let bundle = Bundle::new(
            position,
            value,
            vec![vote(1, position, value), vote(1, position, value)],
        );
        assert_eq!(
            bundle.check_structure(),
            Err(BundleError::DuplicateSender(ValidatorId(1)))
        );
    }

    #[test]
    fn test_bottom_cert_rejected() {
        let position = Position::new(1, 0, 2);
        let bundle = Bundle::new(position, Value::Bottom, vec![vote(1, position, Value::Bottom)]);
        assert_eq!(
            bundle.check_structure(),
            Err(BundleError::BottomNotAllowed(StepKind::Cert))
        );

        let next = Position::new(1, 0, 3);
        let bundle = Bundle::new(next, Value::Bottom, vec![vote(1, next, Value::Bottom)]);
        assert!(bundle.check_structure().is_ok());
    }

    #[test]
    fn test_total_weight_overflow_is_an_error() {
        let position = Position::new(1, 0, 2);
        let value = Value::Proposal(Hash::from_bytes(b"v"));
        let mut heavy = vec![vote(1, position, value), vote(2, position, value)];
        for v in &mut heavy {
            v.weight = u64::MAX / 2 + 1;
        }
        let bundle = Bundle::new(position, value, heavy);
        assert_eq!(bundle.total_weight(), Err(BundleError::WeightOverflow));
    }
}
