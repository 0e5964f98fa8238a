//! Block proposals.

use crate::{signing::proposal_message, Hash, Period, Round, SecretKey, Signature};
use crate::{ValidatorId, Value};
use sbor::prelude::*;

/// A candidate block for a round.
///
/// The digest covers the round, the period it was first proposed in, the
/// original proposer and the payload, so reproposing it in a later period
/// keeps the same [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, BasicSbor)]
pub struct Proposal {
    pub round: Round,
    pub original_period: Period,
    pub proposer: ValidatorId,
    /// Opaque block contents, validated by the ledger.
    pub payload: Vec<u8>,
    pub signature: Signature,
}

impl Proposal {
    pub fn unsigned(
        round: Round,
        original_period: Period,
        proposer: ValidatorId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            round,
            original_period,
            proposer,
            payload,
            signature: Signature::empty(),
        }
    }

    pub fn digest(&self) -> Hash {
        Hash::from_parts(&[
            b"concord/proposal",
            &self.round.0.to_le_bytes(),
            &self.original_period.0.to_le_bytes(),
            &self.proposer.0.to_le_bytes(),
            &self.payload,
        ])
    }

    /// The value votes for this proposal are cast for.
    pub fn value(&self) -> Value {
        Value::Proposal(self.digest())
    }

    pub fn signing_message(&self) -> Vec<u8> {
        proposal_message(&self.digest())
    }

    pub fn signed(mut self, key: &SecretKey) -> Self {
        self.signature = key.sign(&self.signing_message());
        self
    }
}
