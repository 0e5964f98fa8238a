//! Outbound message types for network communication.

use concord_messages::{AgreementVoteGossip, ProposalPayloadGossip, VoteBundleGossip};
use concord_types::{NetworkMessage, Tag};

/// Gossip messages the state machine asks the runner to send.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Vote(AgreementVoteGossip),
    /// Boxed: payloads can be large.
    Proposal(Box<ProposalPayloadGossip>),
    Bundle(VoteBundleGossip),
}

impl OutboundMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Vote(_) => "AgreementVote",
            OutboundMessage::Proposal(_) => "ProposalPayload",
            OutboundMessage::Bundle(_) => "VoteBundle",
        }
    }

    /// Wire tag the message travels under.
    pub fn tag(&self) -> Tag {
        match self {
            OutboundMessage::Vote(_) => AgreementVoteGossip::TAG,
            OutboundMessage::Proposal(_) => ProposalPayloadGossip::TAG,
            OutboundMessage::Bundle(_) => VoteBundleGossip::TAG,
        }
    }
}
