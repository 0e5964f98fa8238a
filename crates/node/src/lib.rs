//! Node loop for the Concord agreement core.
//!
//! This crate wires the agreement [`Player`](concord_agreement::Player) to
//! its collaborators:
//!
//! - [`NodeLoop`]: executes player actions against a store, a transport, a
//!   dispatcher and a [`Ledger`]
//! - [`LocalLedger`]: store-backed ledger that proposes, signs and records
//!   decisions
//! - [`catchup`]: bookkeeping for fetching decided rounds from peers
//! - [`inbound`]: wire tag to typed inbound message routing

pub mod action_handler;
pub mod catchup;
mod config;
mod error;
pub mod inbound;
mod ledger;
mod node_loop;

pub use config::NodeConfig;
pub use error::{LedgerError, NodeError};
pub use ledger::{Ledger, LocalLedger};
pub use node_loop::{NodeLoop, NodeStats};
