//! Pure verification functions shared between the pooled and inline
//! dispatchers.
//!
//! Nothing here touches player state. The node loop runs these on its
//! `Dispatch` implementation and feeds the results back as
//! `VoteVerified`, `BundleVerified` and `PayloadVerified` events.

use crate::{validate_bundle, StepThresholds};
use concord_types::{verify_signature, Bundle, Proposal, Sortition, Vote};

/// Check a vote's committee membership, credential, weight and signature.
pub fn verify_vote(vote: &Vote, sortition: &dyn Sortition) -> bool {
    let Some(public_key) = sortition.public_key(vote.sender) else {
        return false;
    };
    let Some(weight) = sortition.verify_credential(vote.sender, vote.position(), &vote.credential)
    else {
        return false;
    };
    if weight != vote.weight {
        return false;
    }
    verify_signature(public_key, &vote.signing_message(), &vote.signature)
}

/// Check a bundle's composition against the committee, then every vote.
pub fn verify_bundle(
    bundle: &Bundle,
    sortition: &dyn Sortition,
    thresholds: &StepThresholds,
) -> bool {
    if let Err(error) = validate_bundle(bundle, sortition.committee(), thresholds) {
        tracing::debug!(
            position = %bundle.position(),
            error = %error,
            "Bundle failed composition checks"
        );
        return false;
    }

    let invalid = bundle
        .votes
        .iter()
        .find(|vote| !verify_vote(vote, sortition));
    if let Some(vote) = invalid {
        tracing::warn!(
            position = %bundle.position(),
            voter = %vote.sender,
            "Bundle contains a vote that does not verify"
        );
        return false;
    }
    true
}

/// Check a proposal's proposer eligibility, payload and signature.
///
/// Eligibility is checked against the period the proposal was first made
/// in, so re-proposals of a pinned value verify in later periods.
pub fn verify_payload(proposal: &Proposal, sortition: &dyn Sortition) -> bool {
    if proposal.payload.is_empty() {
        return false;
    }
    if !sortition.is_proposer(proposal.proposer, proposal.round, proposal.original_period) {
        return false;
    }
    let Some(public_key) = sortition.public_key(proposal.proposer) else {
        return false;
    };
    verify_signature(public_key, &proposal.signing_message(), &proposal.signature)
}
