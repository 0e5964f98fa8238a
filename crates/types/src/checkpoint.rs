//! Durable snapshot of the agreement player.

use crate::{Bundle, Period, Position, Proposal, Step, StepKind, Value, Vote};
use sbor::prelude::*;
use thiserror::Error;

/// What the player is waiting for at its current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub enum PlayerState {
    AwaitingProposal,
    AwaitingSoftVotes,
    AwaitingCertVotes,
    /// Next-vote escalation, at the carried step.
    AwaitingNextVotes(Step),
    Decided,
}

impl PlayerState {
    /// The state a player occupies when it first reaches `step`.
    pub fn for_step(step: Step) -> Self {
        match step.kind() {
            StepKind::Propose => PlayerState::AwaitingProposal,
            StepKind::Soft => PlayerState::AwaitingSoftVotes,
            StepKind::Cert => PlayerState::AwaitingCertVotes,
            StepKind::Next => PlayerState::AwaitingNextVotes(step),
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, PlayerState::Decided)
    }
}

/// Everything the player needs to resume its position after a restart.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct AgreementCheckpoint {
    pub position: Position,
    pub state: PlayerState,
    /// Value pinned by the previous period's next-vote quorum.
    pub starting_value: Value,
    /// Value that reached soft quorum in the current period.
    pub staged: Option<Value>,
    /// Verified proposals for the round.
    pub proposals: Vec<Proposal>,
    /// Accepted votes for the round, including this node's own.
    pub votes: Vec<Vote>,
    /// Quorum bundles formed or received for the round.
    pub certificates: Vec<Bundle>,
    /// `(period, step)` pairs this node has already voted at.
    pub own_votes: Vec<(Period, Step)>,
    /// The cert-step bundle once the round is decided.
    pub certified: Option<Bundle>,
}

/// A checkpoint that cannot be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("state {state:?} inconsistent with position {position}")]
    StateMismatch {
        state: PlayerState,
        position: Position,
    },

    #[error("{what} belongs to another round")]
    ForeignRound { what: &'static str },

    #[error("certified bundle is not a concrete cert-step bundle")]
    BadCertificate,

    #[error("own vote recorded for future period {0:?}")]
    FutureOwnVote(Period),
}

impl AgreementCheckpoint {
    /// Fresh checkpoint at the start of a round.
    pub fn at_round_start(position: Position) -> Self {
        Self {
            position,
            state: PlayerState::AwaitingProposal,
            starting_value: Value::Bottom,
            staged: None,
            proposals: Vec::new(),
            votes: Vec::new(),
            certificates: Vec::new(),
            own_votes: Vec::new(),
            certified: None,
        }
    }

    /// Internal consistency checks run before a restore.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        let round = self.position.round;
        let state_ok = match self.state {
            PlayerState::Decided => self.certified.is_some(),
            PlayerState::AwaitingNextVotes(step) => {
                step == self.position.step && step.kind() == StepKind::Next
            }
            PlayerState::AwaitingCertVotes => self.position.step == Step::CERT,
            PlayerState::AwaitingSoftVotes => self.position.step == Step::SOFT,
            PlayerState::AwaitingProposal => self.position.step == Step::PROPOSE,
        };
        if !state_ok {
            return Err(CheckpointError::StateMismatch {
                state: self.state,
                position: self.position,
            });
        }

        if self.proposals.iter().any(|p| p.round != round) {
            return Err(CheckpointError::ForeignRound { what: "proposal" });
        }
        if self.votes.iter().any(|v| v.round != round) {
            return Err(CheckpointError::ForeignRound { what: "vote" });
        }
        if self.certificates.iter().any(|b| b.round != round) {
            return Err(CheckpointError::ForeignRound {
                what: "certificate",
            });
        }
        if let Some(cert) = &self.certified {
            if cert.round != round || cert.step != Step::CERT || cert.value.is_bottom() {
                return Err(CheckpointError::BadCertificate);
            }
        }
        if let Some(&(period, _)) = self
            .own_votes
            .iter()
            .find(|(period, _)| *period > self.position.period)
        {
            return Err(CheckpointError::FutureOwnVote(period));
        }
        Ok(())
    }
}
