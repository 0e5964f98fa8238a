//! Agreement votes.

use crate::{signing::vote_message, Credential, Period, Position, Round, Signature, Step};
use crate::{ValidatorId, Value};
use sbor::prelude::*;

/// A weighted, signed assertion for a value at a position.
///
/// The uniqueness key is `(sender, round, period, step)`. A second vote under
/// the same key with a different value is equivocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, BasicSbor)]
pub struct Vote {
    pub sender: ValidatorId,
    pub round: Round,
    pub period: Period,
    pub step: Step,
    pub value: Value,
    /// Committee weight derived from the sender's sortition credential.
    pub weight: u64,
    pub credential: Credential,
    pub signature: Signature,
}

/// Key under which a sender may cast at most one vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoteKey {
    pub sender: ValidatorId,
    pub position: Position,
}

impl Vote {
    /// Build a vote awaiting attestation.
    pub fn unsigned(
        sender: ValidatorId,
        position: Position,
        value: Value,
        weight: u64,
        credential: Credential,
    ) -> Self {
        Self {
            sender,
            round: position.round,
            period: position.period,
            step: position.step,
            value,
            weight,
            credential,
            signature: Signature::empty(),
        }
    }

    pub fn position(&self) -> Position {
        Position {
            round: self.round,
            period: self.period,
            step: self.step,
        }
    }

    pub fn key(&self) -> VoteKey {
        VoteKey {
            sender: self.sender,
            position: self.position(),
        }
    }

    /// Bytes covered by the signature.
    pub fn signing_message(&self) -> Vec<u8> {
        vote_message(
            self.sender,
            self.position(),
            &self.value,
            self.weight,
            &self.credential,
        )
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}
