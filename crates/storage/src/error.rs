//! Storage errors.

use concord_types::{Round, Value};
use thiserror::Error;

/// Errors returned by [`AgreementStore`](crate::AgreementStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A record could not be SBOR-encoded.
    #[error("failed to encode {what}: {reason}")]
    Encode {
        /// Record kind.
        what: &'static str,
        /// Encoder message.
        reason: String,
    },

    /// Stored bytes could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// Record kind.
        what: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A different value is already recorded as decided for the round.
    #[error("round {round:?} already decided {stored}, refusing {attempted}")]
    ConflictingDecision {
        /// The round.
        round: Round,
        /// Value already on record.
        stored: Value,
        /// Value the caller tried to record.
        attempted: Value,
    },
}
