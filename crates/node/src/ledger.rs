//! The ledger the agreement player decides for.
//!
//! The player never touches blocks. It asks the ledger to build proposals,
//! sign votes and record decisions through `Assemble`, `Attest` and
//! `Ensure` actions, which the node loop routes here.

use crate::LedgerError;
use concord_storage::{AgreementStore, Decision};
use concord_types::{Bundle, Hash, Period, Proposal, Round, SecretKey, ValidatorId, Vote};
use tracing::{debug, info};

/// Block-level collaborator of the node loop.
pub trait Ledger: Send {
    /// Durably record `round` as decided. Recording the same decision twice
    /// is a no-op.
    fn ensure(
        &mut self,
        round: Round,
        certificate: &Bundle,
        proposal: &Proposal,
    ) -> Result<(), LedgerError>;

    /// Sign a vote prepared by the player.
    fn attest(&self, vote: Vote) -> Vote;

    /// Build this node's proposal for `(round, period)`. `None` when there is
    /// nothing to propose.
    fn assemble(&mut self, round: Round, period: Period) -> Option<Proposal>;

    /// Highest decided round; `Round(0)` before the first decision.
    fn latest_round(&self) -> Round;

    /// The decision recorded for `round`, used to serve catch-up requests.
    fn decision(&self, round: Round) -> Result<Option<Decision>, LedgerError>;
}

/// A ledger that keeps decisions in an [`AgreementStore`] and proposes
/// payloads chained to the previous decision.
pub struct LocalLedger<S: AgreementStore> {
    validator_id: ValidatorId,
    key: SecretKey,
    store: S,
    latest: Round,
    parent: Hash,
}

impl<S: AgreementStore> std::fmt::Debug for LocalLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLedger")
            .field("validator_id", &self.validator_id)
            .field("latest", &self.latest)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl<S: AgreementStore> LocalLedger<S> {
    /// Open a ledger over `store`, resuming after its latest decision.
    pub fn open(validator_id: ValidatorId, key: SecretKey, store: S) -> Result<Self, LedgerError> {
        let latest = store.latest_decided_round()?.unwrap_or_default();
        let parent = match store.get_decision(latest)? {
            Some(decision) => decision.proposal.digest(),
            None => Hash::ZERO,
        };
        debug!(validator = %validator_id, latest = latest.0, "Opened local ledger");
        Ok(Self {
            validator_id,
            key,
            store,
            latest,
            parent,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Digest of the most recently decided proposal.
    pub fn parent(&self) -> Hash {
        self.parent
    }
}

impl<S: AgreementStore> Ledger for LocalLedger<S> {
    fn ensure(
        &mut self,
        round: Round,
        certificate: &Bundle,
        proposal: &Proposal,
    ) -> Result<(), LedgerError> {
        if certificate.value != proposal.value() {
            return Err(LedgerError::ValueMismatch {
                certified: certificate.value,
                proposed: proposal.value(),
            });
        }
        let expected = self.latest.next();
        if round > expected {
            return Err(LedgerError::Gap {
                expected,
                got: round,
            });
        }

        let decision = Decision::new(round, certificate.clone(), proposal.clone());
        self.store.put_decision(&decision)?;

        if round == expected {
            self.latest = round;
            self.parent = proposal.digest();
            info!(
                validator = %self.validator_id,
                round = round.0,
                value = %decision.value(),
                proposer = %proposal.proposer,
                "Decision recorded"
            );
        }
        Ok(())
    }

    fn attest(&self, vote: Vote) -> Vote {
        let signature = self.key.sign(&vote.signing_message());
        vote.with_signature(signature)
    }

    fn assemble(&mut self, round: Round, period: Period) -> Option<Proposal> {
        if round != self.latest.next() {
            debug!(
                validator = %self.validator_id,
                round = round.0,
                latest = self.latest.0,
                "Not assembling for a round the ledger is not at"
            );
            return None;
        }
        let mut payload = Vec::with_capacity(Hash::BYTES + 24);
        payload.extend_from_slice(self.parent.as_bytes());
        payload.extend_from_slice(&round.0.to_le_bytes());
        payload.extend_from_slice(&period.0.to_le_bytes());
        payload.extend_from_slice(&self.validator_id.0.to_le_bytes());

        Some(Proposal::unsigned(round, period, self.validator_id, payload).signed(&self.key))
    }

    fn latest_round(&self) -> Round {
        self.latest
    }

    fn decision(&self, round: Round) -> Result<Option<Decision>, LedgerError> {
        Ok(self.store.get_decision(round)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_storage_memory::MemoryStore;
    use concord_test_helpers::{fixtures, TestCommittee};
    use concord_types::{verify_signature, Position, Sortition, Value};
    use std::sync::Arc;

    fn ledger(committee: &TestCommittee, store: Arc<MemoryStore>) -> LocalLedger<Arc<MemoryStore>> {
        LocalLedger::open(
            committee.validator_id(0),
            committee.secret_key(0).clone(),
            store,
        )
        .unwrap()
    }

    fn certify(committee: &TestCommittee, proposal: &Proposal) -> Bundle {
        fixtures::make_signed_bundle(
            committee,
            &[0, 1, 2],
            Position::new(proposal.round.0, 0, 2),
            proposal.value(),
        )
    }

    #[test]
    fn test_assemble_chains_to_parent() {
        let committee = TestCommittee::new(4, 3);
        let mut ledger = ledger(&committee, Arc::new(MemoryStore::new()));
        assert_eq!(ledger.latest_round(), Round(0));

        let first = ledger.assemble(Round(1), Period(0)).unwrap();
        assert!(verify_signature(
            committee.public_key(0),
            &first.signing_message(),
            &first.signature
        ));
        assert!(ledger.assemble(Round(2), Period(0)).is_none());

        ledger.ensure(Round(1), &certify(&committee, &first), &first).unwrap();
        assert_eq!(ledger.latest_round(), Round(1));
        assert_eq!(ledger.parent(), first.digest());

        let second = ledger.assemble(Round(2), Period(0)).unwrap();
        assert_eq!(&second.payload[..Hash::BYTES], first.digest().as_bytes());
    }

    #[test]
    fn test_ensure_is_idempotent_and_rejects_conflicts() {
        let committee = TestCommittee::new(4, 3);
        let mut ledger = ledger(&committee, Arc::new(MemoryStore::new()));
        let a = fixtures::make_signed_proposal(&committee, 1, Round(1), Period(0), b"a");
        let b = fixtures::make_signed_proposal(&committee, 1, Round(1), Period(0), b"b");

        ledger.ensure(Round(1), &certify(&committee, &a), &a).unwrap();
        ledger.ensure(Round(1), &certify(&committee, &a), &a).unwrap();
        assert_eq!(ledger.latest_round(), Round(1));

        let err = ledger.ensure(Round(1), &certify(&committee, &b), &b).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Storage(concord_storage::StorageError::ConflictingDecision { .. })
        ));
    }

    #[test]
    fn test_ensure_checks_value_and_gap() {
        let committee = TestCommittee::new(4, 3);
        let mut ledger = ledger(&committee, Arc::new(MemoryStore::new()));
        let a = fixtures::make_signed_proposal(&committee, 1, Round(1), Period(0), b"a");
        let b = fixtures::make_signed_proposal(&committee, 1, Round(1), Period(0), b"b");

        assert!(matches!(
            ledger.ensure(Round(1), &certify(&committee, &a), &b),
            Err(LedgerError::ValueMismatch { .. })
        ));

        let later = fixtures::make_signed_proposal(&committee, 1, Round(3), Period(0), b"c");
        assert_eq!(
            ledger.ensure(Round(3), &certify(&committee, &later), &later),
            Err(LedgerError::Gap {
                expected: Round(1),
                got: Round(3)
            })
        );
    }

    #[test]
    fn test_reopen_resumes_after_latest_decision() {
        let committee = TestCommittee::new(4, 3);
        let store = Arc::new(MemoryStore::new());
        let mut first = ledger(&committee, Arc::clone(&store));
        let proposal = first.assemble(Round(1), Period(0)).unwrap();
        first
            .ensure(Round(1), &certify(&committee, &proposal), &proposal)
            .unwrap();

        let reopened = ledger(&committee, store);
        assert_eq!(reopened.latest_round(), Round(1));
        assert_eq!(reopened.parent(), proposal.digest());
        assert_eq!(
            reopened.decision(Round(1)).unwrap().map(|d| d.value()),
            Some(proposal.value())
        );
    }

    #[test]
    fn test_attest_signs_prepared_vote() {
        let committee = TestCommittee::new(4, 3);
        let ledger = ledger(&committee, Arc::new(MemoryStore::new()));
        let sortition = committee.sortition(0);
        let position = Position::new(1, 0, 1);
        let (weight, credential) = sortition
            .credential(committee.validator_id(0), position)
            .unwrap();
        let vote = Vote::unsigned(
            committee.validator_id(0),
            position,
            Value::Bottom,
            weight,
            credential,
        );

        let signed = ledger.attest(vote);
        assert!(concord_agreement::handlers::verify_vote(&signed, sortition.as_ref()));
    }
}
