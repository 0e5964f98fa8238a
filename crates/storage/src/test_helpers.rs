//! Shared test helpers for storage implementations.
//!
//! Builders for checkpoints and decisions, plus a conformance suite every
//! [`AgreementStore`] backend runs from its own tests.

use crate::{AgreementStore, Decision, StorageError};
use concord_types::{
    AgreementCheckpoint, Bundle, Credential, Period, PlayerState, Position, Proposal, Round,
    Step, ValidatorId, Value, Vote,
};

/// An unsigned proposal with a payload derived from `seed`.
pub fn make_test_proposal(round: Round, seed: u8) -> Proposal {
    Proposal::unsigned(round, Period(0), ValidatorId(0), vec![seed; 16])
}

/// A cert-step bundle of unit-weight unsigned votes for `value`.
pub fn make_test_certificate(round: Round, value: Value, voters: u64) -> Bundle {
    let position = Position {
        round,
        period: Period(0),
        step: Step::CERT,
    };
    let votes = (0..voters)
        .map(|v| Vote::unsigned(ValidatorId(v), position, value, 1, Credential::default()))
        .collect();
    Bundle::new(position, value, votes)
}

/// A decision for `round` certifying the proposal built from `seed`.
pub fn make_test_decision(round: Round, seed: u8) -> Decision {
    let proposal = make_test_proposal(round, seed);
    let certificate = make_test_certificate(round, proposal.value(), 3);
    Decision::new(round, certificate, proposal)
}

/// A checkpoint waiting for cert votes at `(round, 0, 2)`.
pub fn make_test_checkpoint(round: Round) -> AgreementCheckpoint {
    let proposal = make_test_proposal(round, 7);
    let value = proposal.value();
    let soft = Position {
        round,
        period: Period(0),
        step: Step::SOFT,
    };
    let mut checkpoint = AgreementCheckpoint::at_round_start(Position {
        step: Step::CERT,
        ..soft
    });
    checkpoint.state = PlayerState::AwaitingCertVotes;
    checkpoint.staged = Some(value);
    checkpoint.votes = (0..3)
        .map(|v| Vote::unsigned(ValidatorId(v), soft, value, 1, Credential::default()))
        .collect();
    checkpoint.proposals = vec![proposal];
    checkpoint.own_votes = vec![(Period(0), Step::SOFT), (Period(0), Step::CERT)];
    checkpoint
}

/// Checkpoints are replaced, not accumulated.
pub fn check_checkpoint_roundtrip(store: &dyn AgreementStore) {
    assert_eq!(store.load_checkpoint().unwrap(), None);

    let first = make_test_checkpoint(Round(3));
    store.put_checkpoint(&first).unwrap();
    assert_eq!(store.load_checkpoint().unwrap(), Some(first));

    let second = make_test_checkpoint(Round(4));
    store.put_checkpoint(&second).unwrap();
    assert_eq!(store.load_checkpoint().unwrap(), Some(second));
}

/// Decisions are write-once per value and tracked by round.
pub fn check_decisions(store: &dyn AgreementStore) {
    assert_eq!(store.latest_decided_round().unwrap(), None);
    assert_eq!(store.get_decision(Round(1)).unwrap(), None);

    let one = make_test_decision(Round(1), 1);
    let two = make_test_decision(Round(2), 2);
    store.put_decision(&two).unwrap();
    store.put_decision(&one).unwrap();

    assert_eq!(store.get_decision(Round(1)).unwrap(), Some(one.clone()));
    assert_eq!(store.latest_decided_round().unwrap(), Some(Round(2)));

    // Same value again is fine.
    store.put_decision(&one).unwrap();

    let conflicting = make_test_decision(Round(1), 9);
    assert_eq!(
        store.put_decision(&conflicting),
        Err(StorageError::ConflictingDecision {
            round: Round(1),
            stored: one.value(),
            attempted: conflicting.value(),
        })
    );
    assert_eq!(store.get_decision(Round(1)).unwrap(), Some(one));
}
