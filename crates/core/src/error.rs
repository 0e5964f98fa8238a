//! Unrecoverable agreement failures.

use concord_types::{CheckpointError, Round, Value};
use thiserror::Error;

/// An internal invariant was breached. The node must halt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("conflicting certificates for round {round:?}: held {held}, observed {observed}")]
    ConflictingCertificate {
        round: Round,
        held: Value,
        observed: Value,
    },

    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(#[from] CheckpointError),
}
