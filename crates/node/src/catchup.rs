//! Catch-up protocol state machine.
//!
//! Pure synchronous bookkeeping for fetching decided rounds from peers that
//! are ahead. It tracks which round is requested and from whom; sending,
//! verifying and ensuring the response stay in the node loop.
//!
//! ```text
//! NodeLoop ──► CatchupProtocol::handle(CatchupInput) ──► Vec<CatchupOutput>
//! ```

use concord_types::{Round, ValidatorId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Future-round observations after which an unanswered request is resent.
pub const DEFAULT_RETRY_AFTER: u32 = 16;

/// Snapshot for logs and simulation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatchupStatus {
    pub current_round: Round,
    /// Highest round a peer was seen in, while behind it.
    pub target_round: Option<Round>,
    pub in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchupInput {
    /// A peer sent traffic for a round past ours.
    FutureRoundObserved { round: Round, peer: ValidatorId },
    /// A usable response for `round` was ensured into the ledger.
    ResponseApplied { round: Round },
    /// The response for `round` was empty or failed verification.
    ResponseRejected { round: Round, peer: ValidatorId },
    /// The player moved to `round`.
    RoundAdvanced { round: Round },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchupOutput {
    /// Ask `peer` for the decision of `round`.
    Request { round: Round, peer: ValidatorId },
    /// The player reached the highest round seen from peers.
    CaughtUp { round: Round },
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    peer: ValidatorId,
    /// Future-round traffic seen since the request went out.
    observations: u32,
}

/// Tracks the catch-up target and the single in-flight request per round.
///
/// A request or its response may be lost. Every later sighting of a peer
/// ahead of us counts against the outstanding request, and after
/// `retry_after` of them the request is resent to the peer just seen.
#[derive(Debug, Clone)]
pub struct CatchupProtocol {
    current: Round,
    target: Option<(Round, ValidatorId)>,
    in_flight: BTreeMap<Round, InFlight>,
    retry_after: u32,
}

impl CatchupProtocol {
    pub fn new(current: Round) -> Self {
        Self {
            current,
            target: None,
            in_flight: BTreeMap::new(),
            retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn with_retry_after(mut self, observations: u32) -> Self {
        self.retry_after = observations.max(1);
        self
    }

    pub fn handle(&mut self, input: CatchupInput) -> Vec<CatchupOutput> {
        match input {
            CatchupInput::FutureRoundObserved { round, peer } => self.on_future_round(round, peer),
            CatchupInput::ResponseApplied { round } => {
                self.in_flight.remove(&round);
                vec![]
            }
            CatchupInput::ResponseRejected { round, peer } => {
                self.in_flight.remove(&round);
                warn!(round = round.0, %peer, "Catch-up response rejected");
                vec![]
            }
            CatchupInput::RoundAdvanced { round } => self.on_round_advanced(round),
        }
    }

    pub fn is_catching_up(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_in_flight(&self, round: Round) -> bool {
        self.in_flight.contains_key(&round)
    }

    pub fn status(&self) -> CatchupStatus {
        CatchupStatus {
            current_round: self.current,
            target_round: self.target.map(|(round, _)| round),
            in_flight: self.in_flight.len(),
        }
    }

    fn on_future_round(&mut self, round: Round, peer: ValidatorId) -> Vec<CatchupOutput> {
        if round <= self.current {
            return vec![];
        }
        if self.target.map_or(true, |(target, _)| round > target) {
            debug!(round = round.0, %peer, current = self.current.0, "Catch-up target raised");
            self.target = Some((round, peer));
        }
        self.request_current(peer).into_iter().collect()
    }

    fn on_round_advanced(&mut self, round: Round) -> Vec<CatchupOutput> {
        if round <= self.current {
            return vec![];
        }
        self.current = round;
        self.in_flight.retain(|r, _| *r >= round);

        match self.target {
            Some((target, _)) if target <= round => {
                info!(round = round.0, "Caught up");
                self.target = None;
                vec![CatchupOutput::CaughtUp { round }]
            }
            Some((_, peer)) => self.request_current(peer).into_iter().collect(),
            None => vec![],
        }
    }

    fn request_current(&mut self, peer: ValidatorId) -> Option<CatchupOutput> {
        let round = self.current;
        let Some(pending) = self.in_flight.get_mut(&round) else {
            self.in_flight.insert(
                round,
                InFlight {
                    peer,
                    observations: 0,
                },
            );
            return Some(CatchupOutput::Request { round, peer });
        };

        pending.observations += 1;
        if pending.observations < self.retry_after {
            return None;
        }
        debug!(
            round = round.0,
            previous = %pending.peer,
            %peer,
            "Catch-up request unanswered, retrying"
        );
        *pending = InFlight {
            peer,
            observations: 0,
        };
        Some(CatchupOutput::Request { round, peer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests(outputs: &[CatchupOutput]) -> Vec<(Round, ValidatorId)> {
        outputs
            .iter()
            .filter_map(|o| match o {
                CatchupOutput::Request { round, peer } => Some((*round, *peer)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_one_request_per_round() {
        let mut protocol = CatchupProtocol::new(Round(3));

        let first = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(6),
            peer: ValidatorId(1),
        });
        assert_eq!(requests(&first), vec![(Round(3), ValidatorId(1))]);

        let second = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(7),
            peer: ValidatorId(2),
        });
        assert!(second.is_empty());
        assert_eq!(protocol.status().target_round, Some(Round(7)));
        assert_eq!(protocol.status().in_flight, 1);
    }

    #[test]
    fn test_rejected_response_allows_retry() {
        let mut protocol = CatchupProtocol::new(Round(3));
        protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(5),
            peer: ValidatorId(1),
        });
        protocol.handle(CatchupInput::ResponseRejected {
            round: Round(3),
            peer: ValidatorId(1),
        });
        assert!(!protocol.is_in_flight(Round(3)));

        let retry = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(5),
            peer: ValidatorId(2),
        });
        assert_eq!(requests(&retry), vec![(Round(3), ValidatorId(2))]);
    }

    #[test]
    fn test_unanswered_request_is_resent_to_latest_peer() {
        let mut protocol = CatchupProtocol::new(Round(3)).with_retry_after(4);
        let first = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(5),
            peer: ValidatorId(1),
        });
        assert_eq!(requests(&first), vec![(Round(3), ValidatorId(1))]);

        // The request is lost; peer 2 keeps showing up ahead of us.
        let mut resent = Vec::new();
        for round in 5..9 {
            resent.extend(requests(&protocol.handle(CatchupInput::FutureRoundObserved {
                round: Round(round),
                peer: ValidatorId(2),
            })));
        }
        assert_eq!(resent, vec![(Round(3), ValidatorId(2))]);
        assert_eq!(protocol.status().in_flight, 1);
        assert_eq!(protocol.status().target_round, Some(Round(8)));

        // The retry window starts over.
        let quiet = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(9),
            peer: ValidatorId(3),
        });
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_default_retry_window_bounds_the_stall() {
        let mut protocol = CatchupProtocol::new(Round(3));
        protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(5),
            peer: ValidatorId(1),
        });
        let resent: Vec<_> = (0..50)
            .flat_map(|i| {
                requests(&protocol.handle(CatchupInput::FutureRoundObserved {
                    round: Round(5 + i / 10),
                    peer: ValidatorId(2),
                }))
            })
            .collect();
        assert_eq!(resent.len(), 50 / DEFAULT_RETRY_AFTER as usize);
        assert!(resent.iter().all(|r| *r == (Round(3), ValidatorId(2))));
    }

    #[test]
    fn test_advancing_requests_next_round_until_caught_up() {
        let mut protocol = CatchupProtocol::new(Round(1));
        protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(3),
            peer: ValidatorId(4),
        });
        protocol.handle(CatchupInput::ResponseApplied { round: Round(1) });

        let next = protocol.handle(CatchupInput::RoundAdvanced { round: Round(2) });
        assert_eq!(requests(&next), vec![(Round(2), ValidatorId(4))]);
        assert!(protocol.is_catching_up());

        let done = protocol.handle(CatchupInput::RoundAdvanced { round: Round(3) });
        assert_eq!(done, vec![CatchupOutput::CaughtUp { round: Round(3) }]);
        assert!(!protocol.is_catching_up());
        assert_eq!(protocol.status().in_flight, 0);
    }

    #[test]
    fn test_past_rounds_are_ignored() {
        let mut protocol = CatchupProtocol::new(Round(5));
        let outputs = protocol.handle(CatchupInput::FutureRoundObserved {
            round: Round(5),
            peer: ValidatorId(1),
        });
        assert!(outputs.is_empty());
        assert!(protocol
            .handle(CatchupInput::RoundAdvanced { round: Round(4) })
            .is_empty());
        assert_eq!(protocol.status(), CatchupStatus {
            current_round: Round(5),
            target_round: None,
            in_flight: 0,
        });
    }
}
