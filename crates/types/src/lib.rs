//! Core types for the Concord agreement protocol.
//!
//! - **Primitives**: [`Hash`], secp256k1 keys and signatures
//! - **Positions**: [`Round`], [`Period`], [`Step`], [`Position`]
//! - **Agreement types**: [`Value`], [`Vote`], [`Bundle`], [`Proposal`],
//!   [`AgreementCheckpoint`]
//! - **Committees**: [`ValidatorSet`] and the [`Sortition`] trait
//! - **Wire tags**: the closed [`Tag`] registry and [`NetworkMessage`] marker
//!
//! This crate does not depend on any other workspace crate.

mod bundle;
mod checkpoint;
mod crypto;
mod hash;
mod identifiers;
mod network;
mod proposal;
mod signing;
mod sortition;
mod tag;
mod validator;
mod value;
mod vote;

pub use bundle::{Bundle, BundleError};
pub use checkpoint::{AgreementCheckpoint, CheckpointError, PlayerState};
pub use crypto::{verify_signature, PublicKey, SecretKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{Period, Position, Round, Step, StepKind, ValidatorId};
pub use network::{NetworkMessage, Request};
pub use proposal::Proposal;
pub use signing::{proposal_message, vote_message, DOMAIN_PROPOSAL, DOMAIN_VOTE};
pub use sortition::{Credential, Sortition, StaticSortition};
pub use tag::{Tag, UnrecognizedTag};
pub use validator::{ValidatorInfo, ValidatorSet};
pub use value::Value;
pub use vote::{Vote, VoteKey};
