//! Byzantine/negative test helpers.
//!
//! These create forged, mis-signed and malformed fixtures for testing that
//! verification and the player reject bad inputs.

use crate::fixtures::{make_signed_bundle, make_signed_vote};
use crate::TestCommittee;
use concord_types::{
    Bundle, Credential, Period, Position, Proposal, Round, Signature, Value, Vote,
};

/// A vote that claims to be from `claimed_voter_idx` but is signed by
/// `actual_signer_idx`.
pub fn make_wrong_key_vote(
    committee: &TestCommittee,
    claimed_voter_idx: usize,
    actual_signer_idx: usize,
    position: Position,
    value: Value,
) -> Vote {
    let vote = make_signed_vote(committee, claimed_voter_idx, position, value);
    let signature = committee
        .secret_key(actual_signer_idx)
        .sign(&vote.signing_message());
    vote.with_signature(signature)
}

/// A vote whose signature covers `signed_value` but which claims
/// `claimed_value`.
pub fn make_wrong_message_vote(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    claimed_value: Value,
    signed_value: Value,
) -> Vote {
    let mut vote = make_signed_vote(committee, voter_idx, position, signed_value);
    vote.value = claimed_value;
    vote
}

/// A correctly signed vote that inflates its weight beyond the voter's stake.
pub fn make_inflated_weight_vote(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    value: Value,
    weight: u64,
) -> Vote {
    let honest = make_signed_vote(committee, voter_idx, position, value);
    let vote = Vote::unsigned(honest.sender, position, value, weight, honest.credential);
    let signature = committee.secret_key(voter_idx).sign(&vote.signing_message());
    vote.with_signature(signature)
}

/// A correctly signed vote carrying a credential sortition never issued.
pub fn make_forged_credential_vote(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    value: Value,
) -> Vote {
    let vote = Vote::unsigned(
        committee.validator_id(voter_idx),
        position,
        value,
        1,
        Credential::new(vec![0xAB; 32]),
    );
    let signature = committee.secret_key(voter_idx).sign(&vote.signing_message());
    vote.with_signature(signature)
}

/// Two validly signed votes from one voter for different values at one
/// position.
pub fn make_equivocating_votes(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    first: Value,
    second: Value,
) -> (Vote, Vote) {
    (
        make_signed_vote(committee, voter_idx, position, first),
        make_signed_vote(committee, voter_idx, position, second),
    )
}

/// A vote with signature bytes that are not a valid ECDSA signature.
pub fn make_garbage_signature_vote(
    committee: &TestCommittee,
    voter_idx: usize,
    position: Position,
    value: Value,
) -> Vote {
    make_signed_vote(committee, voter_idx, position, value)
        .with_signature(Signature::from_bytes(vec![0u8; 64]))
}

/// A structurally valid bundle where the vote of `bad_voter_idx` is signed
/// with `wrong_signer_idx`'s key.
pub fn make_partially_invalid_bundle(
    committee: &TestCommittee,
    valid_voter_indices: &[usize],
    bad_voter_idx: usize,
    wrong_signer_idx: usize,
    position: Position,
    value: Value,
) -> Bundle {
    let mut bundle = make_signed_bundle(committee, valid_voter_indices, position, value);
    bundle.votes.push(make_wrong_key_vote(
        committee,
        bad_voter_idx,
        wrong_signer_idx,
        position,
        value,
    ));
    Bundle::new(position, value, bundle.votes)
}

/// A proposal signed by a validator other than the claimed proposer.
pub fn make_wrong_key_proposal(
    committee: &TestCommittee,
    claimed_proposer_idx: usize,
    actual_signer_idx: usize,
    round: Round,
    period: Period,
    payload: &[u8],
) -> Proposal {
    Proposal::unsigned(
        round,
        period,
        committee.validator_id(claimed_proposer_idx),
        payload.to_vec(),
    )
    .signed(committee.secret_key(actual_signer_idx))
}
