//! Inbound wire dispatch: tag → typed message → [`Inbound`].
//!
//! Gossip becomes a [`ProtocolEvent`] for the player. Catch-up traffic is
//! handled by the node loop itself.

use concord_core::ProtocolEvent;
use concord_messages::{
    AgreementVoteGossip, CatchupRequest, CatchupResponse, ProposalPayloadGossip, VoteBundleGossip,
};
use concord_network::{HandlerRegistry, RegistryError};
use concord_types::{Round, ValidatorId};

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum Inbound {
    Protocol(ProtocolEvent),
    CatchupRequest {
        sender: ValidatorId,
        round: Round,
    },
    CatchupResponse {
        sender: ValidatorId,
        response: Box<CatchupResponse>,
    },
}

/// Handlers push decoded messages into the caller's buffer.
pub type InboundRegistry = HandlerRegistry<Vec<Inbound>>;

/// Build a registry with a handler for every tag the node accepts.
pub fn inbound_registry() -> Result<InboundRegistry, RegistryError> {
    let mut registry = InboundRegistry::new();

    // AV → VoteReceived
    registry.register(|out: &mut Vec<Inbound>, sender, gossip: AgreementVoteGossip| {
        out.push(Inbound::Protocol(ProtocolEvent::VoteReceived {
            vote: gossip.into_vote(),
            sender,
        }));
    })?;

    // PP → ProposalReceived
    registry.register(|out: &mut Vec<Inbound>, sender, gossip: ProposalPayloadGossip| {
        out.push(Inbound::Protocol(ProtocolEvent::ProposalReceived {
            proposal: gossip.into_proposal(),
            sender,
        }));
    })?;

    // VB → BundleReceived
    registry.register(|out: &mut Vec<Inbound>, sender, gossip: VoteBundleGossip| {
        out.push(Inbound::Protocol(ProtocolEvent::BundleReceived {
            bundle: gossip.into_bundle(),
            sender,
        }));
    })?;

    registry.register(|out: &mut Vec<Inbound>, sender, request: CatchupRequest| {
        out.push(Inbound::CatchupRequest {
            sender,
            round: request.round,
        });
    })?;

    registry.register(|out: &mut Vec<Inbound>, sender, response: CatchupResponse| {
        out.push(Inbound::CatchupResponse {
            sender,
            response: Box::new(response),
        });
    })?;

    Ok(registry)
}
