//! Gossip messages broadcast to every peer.

mod agreement_vote;
mod proposal_payload;
mod vote_bundle;

pub use agreement_vote::AgreementVoteGossip;
pub use proposal_payload::ProposalPayloadGossip;
pub use vote_bundle::VoteBundleGossip;
