//! Protocol events for the deterministic state machine.
//!
//! [`ProtocolEvent`] contains only the events the agreement player processes.
//! Wire decoding and timer bookkeeping happen in the node loop and never
//! reach the state machine.

use concord_types::{Bundle, Position, Proposal, Round, ValidatorId, Vote};

/// Events that the state machine processes.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// First event after boot or restore.
    Start,

    /// The ledger now expects `round` to be decided next.
    RoundAdvanced { round: Round },

    /// The step timer armed for `position` fired.
    Timeout { position: Position },

    // ═══════════════════════════════════════════════════════════════════════
    // Proposals
    // ═══════════════════════════════════════════════════════════════════════
    ProposalReceived {
        proposal: Proposal,
        sender: ValidatorId,
    },

    /// The ledger built this node's own proposal.
    ProposalAssembled { proposal: Proposal },

    /// Callback from `Action::VerifyPayload`.
    PayloadVerified {
        proposal: Proposal,
        sender: ValidatorId,
        valid: bool,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Votes
    // ═══════════════════════════════════════════════════════════════════════
    VoteReceived { vote: Vote, sender: ValidatorId },

    /// Callback from `Action::VerifyVote`.
    VoteVerified {
        vote: Vote,
        sender: ValidatorId,
        valid: bool,
    },

    /// This node's own vote, signed by the ledger.
    VoteAttested { vote: Vote },

    // ═══════════════════════════════════════════════════════════════════════
    // Bundles
    // ═══════════════════════════════════════════════════════════════════════
    BundleReceived { bundle: Bundle, sender: ValidatorId },

    /// Callback from `Action::VerifyBundle`.
    BundleVerified {
        bundle: Bundle,
        sender: ValidatorId,
        valid: bool,
    },
}

impl ProtocolEvent {
    /// Get the event type name for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolEvent::Start => "Start",
            ProtocolEvent::RoundAdvanced { .. } => "RoundAdvanced",
            ProtocolEvent::Timeout { .. } => "Timeout",
            ProtocolEvent::ProposalReceived { .. } => "ProposalReceived",
            ProtocolEvent::ProposalAssembled { .. } => "ProposalAssembled",
            ProtocolEvent::PayloadVerified { .. } => "PayloadVerified",
            ProtocolEvent::VoteReceived { .. } => "VoteReceived",
            ProtocolEvent::VoteVerified { .. } => "VoteVerified",
            ProtocolEvent::VoteAttested { .. } => "VoteAttested",
            ProtocolEvent::BundleReceived { .. } => "BundleReceived",
            ProtocolEvent::BundleVerified { .. } => "BundleVerified",
        }
    }
}
