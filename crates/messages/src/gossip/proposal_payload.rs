//! ProposalPayload gossip message.

use concord_types::{NetworkMessage, Proposal, Tag};
use sbor::prelude::BasicSbor;

/// A proposed block, broadcast by its proposer and relayed once verified.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ProposalPayloadGossip {
    pub proposal: Proposal,
}

impl ProposalPayloadGossip {
    pub fn new(proposal: Proposal) -> Self {
        Self { proposal }
    }

    pub fn into_proposal(self) -> Proposal {
        self.proposal
    }
}

impl NetworkMessage for ProposalPayloadGossip {
    const TAG: Tag = Tag::ProposalPayload;
}
