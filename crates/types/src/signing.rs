//! Domain-separated signing messages.
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `CONCORD_VOTE` | Agreement votes |
//! | `CONCORD_PROPOSAL` | Proposal payloads |

use crate::{Credential, Hash, Position, ValidatorId, Value};

/// Domain tag for agreement votes.
///
/// Format: `CONCORD_VOTE` || sender || round || period || step || value || weight || credential
pub const DOMAIN_VOTE: &[u8] = b"CONCORD_VOTE";

/// Domain tag for proposals.
///
/// Format: `CONCORD_PROPOSAL` || digest
pub const DOMAIN_PROPOSAL: &[u8] = b"CONCORD_PROPOSAL";

/// Build the signing message for a vote.
pub fn vote_message(
    sender: ValidatorId,
    position: Position,
    value: &Value,
    weight: u64,
    credential: &Credential,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(96 + credential.as_bytes().len());
    message.extend_from_slice(DOMAIN_VOTE);
    message.extend_from_slice(&sender.0.to_le_bytes());
    message.extend_from_slice(&position.round.0.to_le_bytes());
    message.extend_from_slice(&position.period.0.to_le_bytes());
    message.extend_from_slice(&position.step.0.to_le_bytes());
    value.write_bytes(&mut message);
    message.extend_from_slice(&weight.to_le_bytes());
    message.extend_from_slice(credential.as_bytes());
    message
}

/// Build the signing message for a proposal digest.
pub fn proposal_message(digest: &Hash) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_PROPOSAL.len() + Hash::BYTES);
    message.extend_from_slice(DOMAIN_PROPOSAL);
    message.extend_from_slice(digest.as_bytes());
    message
}
