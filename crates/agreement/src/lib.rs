//! Agreement core: the per-round state machine that decides the next block.
//!
//! - [`Player`]: the deterministic transducer from [`ProtocolEvent`]s to
//!   [`Action`]s
//! - [`Clock`]: the `(round, period, step)` position and its deadlines
//! - [`Accumulator`]: vote and bundle tallies with quorum detection
//! - [`handlers`]: pure verification functions run by the dispatcher
//!
//! [`ProtocolEvent`]: concord_core::ProtocolEvent
//! [`Action`]: concord_core::Action

mod accumulator;
mod clock;
mod config;
pub mod handlers;
mod player;

pub use accumulator::{
    validate_bundle, Accumulator, AddBundleOutcome, AddVoteOutcome, StepThresholds,
};
pub use clock::Clock;
pub use config::{AgreementConfig, ConfigError, QuorumFraction, Thresholds, TimeoutConfig};
pub use player::Player;
