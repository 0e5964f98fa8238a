//! Agreement storage trait.
//!
//! All methods take `&self`; implementations use interior mutability.

use crate::{Decision, StorageError};
use concord_types::{AgreementCheckpoint, Round};
use sbor::prelude::{BasicDecode, BasicEncode};

/// Durable home of the player's checkpoint and the decided rounds.
pub trait AgreementStore: Send + Sync {
    /// Replace the stored checkpoint.
    ///
    /// **Safety critical**: must complete before any vote recorded in the
    /// checkpoint leaves the node.
    fn put_checkpoint(&self, checkpoint: &AgreementCheckpoint) -> Result<(), StorageError>;

    /// The last checkpoint written, if any.
    fn load_checkpoint(&self) -> Result<Option<AgreementCheckpoint>, StorageError>;

    /// Record a decided round.
    ///
    /// Recording the same value twice is a no-op. A different value for an
    /// already decided round fails with [`StorageError::ConflictingDecision`].
    fn put_decision(&self, decision: &Decision) -> Result<(), StorageError>;

    /// The decision for `round`, if any.
    fn get_decision(&self, round: Round) -> Result<Option<Decision>, StorageError>;

    /// Highest decided round, if any round has been decided.
    fn latest_decided_round(&self) -> Result<Option<Round>, StorageError>;
}

/// SBOR-encode a record for storage.
pub fn encode_record<T: BasicEncode + ?Sized>(
    what: &'static str,
    record: &T,
) -> Result<Vec<u8>, StorageError> {
    sbor::basic_encode(record).map_err(|e| StorageError::Encode {
        what,
        reason: format!("{:?}", e),
    })
}

/// Decode a stored record.
pub fn decode_record<T: BasicDecode>(what: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    sbor::basic_decode(bytes).map_err(|e| StorageError::Decode {
        what,
        reason: format!("{:?}", e),
    })
}

impl<S: AgreementStore + ?Sized> AgreementStore for std::sync::Arc<S> {
    fn put_checkpoint(&self, checkpoint: &AgreementCheckpoint) -> Result<(), StorageError> {
        (**self).put_checkpoint(checkpoint)
    }

    fn load_checkpoint(&self) -> Result<Option<AgreementCheckpoint>, StorageError> {
        (**self).load_checkpoint()
    }

    fn put_decision(&self, decision: &Decision) -> Result<(), StorageError> {
        (**self).put_decision(decision)
    }

    fn get_decision(&self, round: Round) -> Result<Option<Decision>, StorageError> {
        (**self).get_decision(round)
    }

    fn latest_decided_round(&self) -> Result<Option<Round>, StorageError> {
        (**self).latest_decided_round()
    }
}
