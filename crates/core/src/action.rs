//! Actions emitted by the agreement state machine.

use crate::OutboundMessage;
use concord_types::{
    AgreementCheckpoint, Bundle, BundleError, Period, Position, Proposal, Round, ValidatorId,
    Value, Vote,
};
use std::fmt;
use std::time::Duration;

/// When the step timer for a position fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub position: Position,
    pub after: Duration,
}

/// Why an input was dropped without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Belongs to a round or period already left behind.
    Stale,
    /// Belongs to a later round; `peer` can serve catch-up.
    FutureRound { round: Round, peer: ValidatorId },
    /// More than one period ahead of the current position.
    TooFarAhead,
    /// Already seen.
    Duplicate,
    /// Votes are never cast at the propose step.
    ProposeStep,
    /// Soft and cert votes must name a concrete value.
    BottomVote,
    /// The round is already decided.
    Decided,
    InvalidVote,
    InvalidPayload,
}

/// Why a peer is disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Two different values from one sender at one position.
    Equivocation {
        sender: ValidatorId,
        position: Position,
    },
    /// A bundle that failed composition checks.
    MalformedBundle(BundleError),
    /// A bundle whose votes did not verify.
    InvalidBundle,
}

/// Outputs of the agreement state machine.
///
/// Within one `handle` call, actions are ordered: `Rezero` first, then
/// `Ensure`, then at most one `Checkpoint`, then everything else. The runner
/// executes them in order, so durable state is written before any message
/// that depends on it leaves the node.
#[derive(Debug, Clone)]
pub enum Action {
    Noop,

    /// Drop an input.
    Ignore { reason: IgnoreReason },

    /// Send a message to every peer.
    Broadcast { message: OutboundMessage },

    /// Forward a verified message to every peer except its source.
    Relay {
        message: OutboundMessage,
        source: ValidatorId,
    },

    Disconnect {
        peer: ValidatorId,
        reason: DisconnectReason,
    },

    /// Gossip a quorum bundle.
    BroadcastVotes { bundle: Bundle },

    VerifyVote { vote: Vote, sender: ValidatorId },

    VerifyPayload {
        proposal: Proposal,
        sender: ValidatorId,
    },

    VerifyBundle { bundle: Bundle, sender: ValidatorId },

    /// Durably record a decided round in the ledger.
    Ensure {
        round: Round,
        certificate: Bundle,
        proposal: Proposal,
    },

    /// Round-local state was reset; the player now sits at the start of
    /// `(round, period)`. Pending step timers are void.
    Rezero { round: Round, period: Period },

    /// Sign a vote and broadcast it.
    Attest { vote: Vote },

    /// Build a new proposal for `(round, period)`.
    Assemble { round: Round, period: Period },

    /// Re-broadcast the proposal pinned by the previous period.
    Repropose {
        round: Round,
        period: Period,
        value: Value,
        proposal: Option<Proposal>,
    },

    /// Persist the player snapshot and arm the step timer.
    Checkpoint {
        checkpoint: Box<AgreementCheckpoint>,
        deadline: Option<Deadline>,
    },
}

/// Names of the action kinds, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Noop,
    Ignore,
    Broadcast,
    Relay,
    Disconnect,
    BroadcastVotes,
    VerifyVote,
    VerifyPayload,
    VerifyBundle,
    Ensure,
    Rezero,
    Attest,
    Assemble,
    Repropose,
    Checkpoint,
}

impl ActionKind {
    pub const COUNT: usize = 15;

    pub const ALL: [ActionKind; ActionKind::COUNT] = [
        ActionKind::Noop,
        ActionKind::Ignore,
        ActionKind::Broadcast,
        ActionKind::Relay,
        ActionKind::Disconnect,
        ActionKind::BroadcastVotes,
        ActionKind::VerifyVote,
        ActionKind::VerifyPayload,
        ActionKind::VerifyBundle,
        ActionKind::Ensure,
        ActionKind::Rezero,
        ActionKind::Attest,
        ActionKind::Assemble,
        ActionKind::Repropose,
        ActionKind::Checkpoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Noop => "noop",
            ActionKind::Ignore => "ignore",
            ActionKind::Broadcast => "broadcast",
            ActionKind::Relay => "relay",
            ActionKind::Disconnect => "disconnect",
            ActionKind::BroadcastVotes => "broadcastVotes",
            ActionKind::VerifyVote => "verifyVote",
            ActionKind::VerifyPayload => "verifyPayload",
            ActionKind::VerifyBundle => "verifyBundle",
            ActionKind::Ensure => "ensure",
            ActionKind::Rezero => "rezero",
            ActionKind::Attest => "attest",
            ActionKind::Assemble => "assemble",
            ActionKind::Repropose => "repropose",
            ActionKind::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Noop => ActionKind::Noop,
            Action::Ignore { .. } => ActionKind::Ignore,
            Action::Broadcast { .. } => ActionKind::Broadcast,
            Action::Relay { .. } => ActionKind::Relay,
            Action::Disconnect { .. } => ActionKind::Disconnect,
            Action::BroadcastVotes { .. } => ActionKind::BroadcastVotes,
            Action::VerifyVote { .. } => ActionKind::VerifyVote,
            Action::VerifyPayload { .. } => ActionKind::VerifyPayload,
            Action::VerifyBundle { .. } => ActionKind::VerifyBundle,
            Action::Ensure { .. } => ActionKind::Ensure,
            Action::Rezero { .. } => ActionKind::Rezero,
            Action::Attest { .. } => ActionKind::Attest,
            Action::Assemble { .. } => ActionKind::Assemble,
            Action::Repropose { .. } => ActionKind::Repropose,
            Action::Checkpoint { .. } => ActionKind::Checkpoint,
        }
    }

    /// Human-readable name, matching [`ActionKind::name`].
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }
}
