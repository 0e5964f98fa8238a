//! Node and ledger errors.

use concord_agreement::ConfigError;
use concord_core::FatalError;
use concord_network::{CodecError, RegistryError};
use concord_storage::StorageError;
use concord_types::{Round, Value};
use thiserror::Error;

/// Errors from a [`Ledger`](crate::Ledger).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("certificate value {certified} does not match proposal value {proposed}")]
    ValueMismatch { certified: Value, proposed: Value },

    #[error("round {got:?} cannot be recorded before round {expected:?}")]
    Gap { expected: Round, got: Round },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors that stop the node loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The player breached an internal invariant. The node must halt.
    #[error("fatal agreement error: {0}")]
    Fatal(#[from] FatalError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to encode outbound message: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("inbound registry: {0}")]
    Registry(#[from] RegistryError),

    /// An earlier error halted the node; no further input is accepted.
    #[error("node halted")]
    Halted,
}

impl NodeError {
    /// Whether the error comes from the agreement player itself.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Fatal(_))
    }
}
