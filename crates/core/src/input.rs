//! Inputs to the node loop.

use crate::{ProtocolEvent, TimerId};
use concord_types::ValidatorId;

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,
}

/// All possible inputs a node can receive.
#[derive(Debug, Clone)]
pub enum NodeInput {
    /// Pass-through to the state machine.
    Protocol(ProtocolEvent),

    /// Raw wire bytes from a peer, tag-prefixed.
    MessageReceived { sender: ValidatorId, bytes: Vec<u8> },

    /// A timer armed through [`TimerScheduler`](crate::TimerScheduler) fired.
    TimerFired(TimerId),
}

impl NodeInput {
    /// Get the priority for this input type.
    pub fn priority(&self) -> EventPriority {
        match self {
            NodeInput::Protocol(ProtocolEvent::Timeout { .. }) => EventPriority::Timer,
            NodeInput::Protocol(
                ProtocolEvent::ProposalReceived { .. }
                | ProtocolEvent::VoteReceived { .. }
                | ProtocolEvent::BundleReceived { .. },
            ) => EventPriority::Network,
            NodeInput::Protocol(_) => EventPriority::Internal,
            NodeInput::MessageReceived { .. } => EventPriority::Network,
            NodeInput::TimerFired(_) => EventPriority::Timer,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.priority() == EventPriority::Internal
    }

    pub fn is_network(&self) -> bool {
        self.priority() == EventPriority::Network
    }

    /// Get the event type name for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeInput::Protocol(pe) => pe.type_name(),
            NodeInput::MessageReceived { .. } => "MessageReceived",
            NodeInput::TimerFired(_) => "TimerFired",
        }
    }
}

impl From<ProtocolEvent> for NodeInput {
    fn from(event: ProtocolEvent) -> Self {
        NodeInput::Protocol(event)
    }
}
