//! Storage traits and shared types.
//!
//! This crate defines the storage abstraction runners use to persist the
//! agreement player's checkpoint and the rounds it has decided.
//!
//! # Design
//!
//! Storage is an implementation detail of runners, not the state machine.
//! The player emits `Action::Checkpoint` and `Action::Ensure`; the runner
//! writes them through an [`AgreementStore`] before executing any later
//! action of the same batch. On restart the runner loads the checkpoint and
//! hands it to `Player::from_checkpoint`.
//!
//! Records are stored as SBOR bytes under the keys in [`keys`], so every
//! backend exercises the same encoding a durable store would.

#![warn(missing_docs)]

mod decision;
mod error;
pub mod keys;
mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use decision::Decision;
pub use error::StorageError;
pub use store::{decode_record, encode_record, AgreementStore};
