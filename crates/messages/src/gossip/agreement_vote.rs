//! AgreementVote gossip message.

use concord_types::{NetworkMessage, Tag, Vote};
use sbor::prelude::BasicSbor;

/// A single signed agreement vote.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct AgreementVoteGossip {
    pub vote: Vote,
}

impl AgreementVoteGossip {
    pub fn new(vote: Vote) -> Self {
        Self { vote }
    }

    pub fn vote(&self) -> &Vote {
        &self.vote
    }

    pub fn into_vote(self) -> Vote {
        self.vote
    }
}

impl NetworkMessage for AgreementVoteGossip {
    const TAG: Tag = Tag::AgreementVote;
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::{Credential, Position, ValidatorId, Value};

    #[test]
    fn test_agreement_vote_gossip_into_vote() {
        let vote = Vote::unsigned(
            ValidatorId(2),
            Position::new(4, 1, 3),
            Value::Bottom,
            7,
            Credential::default(),
        );
        let gossip = AgreementVoteGossip::new(vote.clone());
        assert_eq!(gossip.vote(), &vote);
        assert_eq!(gossip.into_vote(), vote);
        assert_eq!(AgreementVoteGossip::TAG.as_str(), "AV");
    }
}
