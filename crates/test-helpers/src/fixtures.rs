//! Signed fixture builders for test data.
//!
//! Votes carry the credential the committee's [`StaticSortition`] expects,
//! so they pass `verify_credential` as well as signature checks.

use crate::TestCommittee;
use concord_types::{
    Bundle, Period, Position, Proposal, Round, Sortition, StaticSortition, Value, Vote,
};

fn sortition(committee: &TestCommittee, idx: usize) -> StaticSortition {
    StaticSortition::new(committee.validator_id(idx), committee.validator_set().clone())
}

/// Create a properly-signed vote from validator `voter_idx`.
///
/// # Panics
///
/// Panics if the voter has no stake in the committee.
pub fn make_signed_vote(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    value: Value,
) -> Vote {
    let voter = committee.validator_id(voter_idx);
    let (weight, credential) = sortition(committee, voter_idx)
        .credential(voter, position)
        .expect("voter must hold stake");
    let vote = Vote::unsigned(voter, position, value, weight, credential);
    let signature = committee.secret_key(voter_idx).sign(&vote.signing_message());
    vote.with_signature(signature)
}

/// Signed votes from each of `voter_indices` for the same position and value.
pub fn make_signed_votes(
    committee: &TestCommittee,
    voter_indices: &[usize],
    position: Position,
    value: Value,
) -> Vec<Vote> {
    voter_indices
        .iter()
        .map(|&idx| make_signed_vote(committee, idx, position, value))
        .collect()
}

/// A bundle of signed votes from `voter_indices`.
pub fn make_signed_bundle(
    committee: &TestCommittee,
    voter_indices: &[usize],
    position: Position,
    value: Value,
) -> Bundle {
    Bundle::new(
        position,
        value,
        make_signed_votes(committee, voter_indices, position, value),
    )
}

/// A proposal by `proposer_idx`, signed over its digest.
pub fn make_signed_proposal(
    committee: &TestCommittee,
    proposer_idx: usize,
    round: Round,
    period: Period,
    payload: &[u8],
) -> Proposal {
    Proposal::unsigned(
        round,
        period,
        committee.validator_id(proposer_idx),
        payload.to_vec(),
    )
    .signed(committee.secret_key(proposer_idx))
}

/// A proposal from whichever validator sortition selects for `(round, period)`.
pub fn make_proposal_for(
    committee: &TestCommittee,
    round: Round,
    period: Period,
    payload: &[u8],
) -> Proposal {
    let proposer = sortition(committee, 0)
        .proposer(round, period)
        .expect("committee is not empty");
    make_signed_proposal(committee, proposer.0 as usize, round, period, payload)
}
