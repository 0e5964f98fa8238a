//! Network messages for the agreement protocol.

pub mod gossip;
pub mod request;
pub mod response;

pub use gossip::{AgreementVoteGossip, ProposalPayloadGossip, VoteBundleGossip};
pub use request::CatchupRequest;
pub use response::CatchupResponse;
