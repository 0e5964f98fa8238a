//! Delegated verification actions.
//!
//! Both the pooled and the inline dispatcher run these same functions. The
//! node loop picks a pool with [`dispatch_pool_for`], moves the action and a
//! [`VerifyContext`] into the closure, and sends the resulting event back on
//! its input channel.

use concord_agreement::{handlers, StepThresholds, Thresholds};
use concord_core::{Action, ProtocolEvent};
use concord_types::Sortition;
use std::sync::Arc;
use tracing::trace;

/// Everything a verification closure needs. Cheap to clone.
#[derive(Clone)]
pub struct VerifyContext {
    pub sortition: Arc<dyn Sortition>,
    pub thresholds: Thresholds,
}

impl std::fmt::Debug for VerifyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyContext")
            .field("validator", &self.sortition.local_validator_id())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// Which dispatch pool an action runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPool {
    /// Single votes. Quorum progress waits on these.
    ConsensusCrypto,
    /// Bundles and proposal payloads.
    Crypto,
}

/// Map a delegated action to its pool. `None` for actions the node loop
/// executes itself.
pub fn dispatch_pool_for(action: &Action) -> Option<DispatchPool> {
    match action {
        Action::VerifyVote { .. } => Some(DispatchPool::ConsensusCrypto),
        Action::VerifyBundle { .. } | Action::VerifyPayload { .. } => Some(DispatchPool::Crypto),
        _ => None,
    }
}

/// Run a delegated action and build the callback event.
///
/// Returns `None` for non-delegated actions.
pub fn handle_delegated_action(action: Action, ctx: &VerifyContext) -> Option<ProtocolEvent> {
    let sortition = ctx.sortition.as_ref();
    match action {
        Action::VerifyVote { vote, sender } => {
            let valid = handlers::verify_vote(&vote, sortition);
            trace!(position = %vote.position(), voter = %vote.sender, valid, "Vote verified");
            Some(ProtocolEvent::VoteVerified {
                vote,
                sender,
                valid,
            })
        }

        Action::VerifyBundle { bundle, sender } => {
            let thresholds = StepThresholds::compute(&ctx.thresholds, sortition, bundle.round);
            let valid = handlers::verify_bundle(&bundle, sortition, &thresholds);
            trace!(position = %bundle.position(), %sender, valid, "Bundle verified");
            Some(ProtocolEvent::BundleVerified {
                bundle,
                sender,
                valid,
            })
        }

        Action::VerifyPayload { proposal, sender } => {
            let valid = handlers::verify_payload(&proposal, sortition);
            trace!(
                round = proposal.round.0,
                proposer = %proposal.proposer,
                valid,
                "Payload verified"
            );
            Some(ProtocolEvent::PayloadVerified {
                proposal,
                sender,
                valid,
            })
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_test_helpers::{byzantine, fixtures, TestCommittee};
    use concord_types::{Period, Position, Round, ValidatorId, Value};

    fn context(committee: &TestCommittee) -> VerifyContext {
        VerifyContext {
            sortition: committee.sortition(0),
            thresholds: Thresholds::two_thirds(),
        }
    }

    #[test]
    fn test_pools() {
        let committee = TestCommittee::new(4, 1);
        let vote = fixtures::make_signed_vote(&committee, 1, Position::new(1, 0, 1), Value::Bottom);
        let bundle =
            fixtures::make_signed_bundle(&committee, &[0, 1, 2], Position::new(1, 0, 2), Value::Bottom);

        assert_eq!(
            dispatch_pool_for(&Action::VerifyVote {
                vote,
                sender: ValidatorId(1)
            }),
            Some(DispatchPool::ConsensusCrypto)
        );
        assert_eq!(
            dispatch_pool_for(&Action::VerifyBundle {
                bundle,
                sender: ValidatorId(1)
            }),
            Some(DispatchPool::Crypto)
        );
        assert_eq!(dispatch_pool_for(&Action::Noop), None);
    }

    #[test]
    fn test_vote_callbacks_carry_validity() {
        let committee = TestCommittee::new(4, 1);
        let ctx = context(&committee);
        let position = Position::new(1, 0, 1);
        let good = fixtures::make_signed_vote(&committee, 1, position, Value::Bottom);
        let forged = byzantine::make_wrong_key_vote(&committee, 1, 2, position, Value::Bottom);

        for (vote, expected) in [(good, true), (forged, false)] {
            match handle_delegated_action(
                Action::VerifyVote {
                    vote,
                    sender: ValidatorId(1),
                },
                &ctx,
            ) {
                Some(ProtocolEvent::VoteVerified { valid, .. }) => assert_eq!(valid, expected),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_bundle_and_payload_callbacks() {
        let committee = TestCommittee::new(4, 1);
        let ctx = context(&committee);
        let proposal = fixtures::make_proposal_for(&committee, Round(1), Period(0), b"block");
        let bundle = fixtures::make_signed_bundle(
            &committee,
            &[0, 1, 2],
            Position::new(1, 0, 2),
            proposal.value(),
        );
        let short = fixtures::make_signed_bundle(
            &committee,
            &[0, 1],
            Position::new(1, 0, 2),
            proposal.value(),
        );

        let verified = |action| handle_delegated_action(action, &ctx);
        assert!(matches!(
            verified(Action::VerifyBundle {
                bundle,
                sender: ValidatorId(3)
            }),
            Some(ProtocolEvent::BundleVerified { valid: true, .. })
        ));
        assert!(matches!(
            verified(Action::VerifyBundle {
                bundle: short,
                sender: ValidatorId(3)
            }),
            Some(ProtocolEvent::BundleVerified { valid: false, .. })
        ));
        assert!(matches!(
            verified(Action::VerifyPayload {
                proposal,
                sender: ValidatorId(1)
            }),
            Some(ProtocolEvent::PayloadVerified { valid: true, .. })
        ));
        assert!(verified(Action::Noop).is_none());
    }
}
