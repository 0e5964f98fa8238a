//! Vote and bundle accumulator.
//!
//! Tallies are kept per `(period, step)` for a single round. Every map is a
//! `BTreeMap` so iteration order, and with it quorum selection and
//! checkpoint contents, is identical on every node that saw the same votes.

use crate::Thresholds;
use concord_types::{
    Bundle, BundleError, Period, Position, Round, Sortition, Step, StepKind, ValidatorId,
    ValidatorSet, Value, Vote,
};
use std::collections::{BTreeMap, BTreeSet};

/// Absolute quorum weights for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepThresholds {
    pub soft: u64,
    pub cert: u64,
    pub next: u64,
}

impl StepThresholds {
    /// Apply the configured fractions to the committee weight of `round`.
    pub fn compute(thresholds: &Thresholds, sortition: &dyn Sortition, round: Round) -> Self {
        Self {
            soft: thresholds
                .soft
                .threshold(sortition.committee_weight(round, Step::SOFT)),
            cert: thresholds
                .cert
                .threshold(sortition.committee_weight(round, Step::CERT)),
            next: thresholds
                .next
                .threshold(sortition.committee_weight(round, Step::NEXT)),
        }
    }

    /// Threshold for `step`; the propose step has none.
    pub fn for_step(&self, step: Step) -> Option<u64> {
        match step.kind() {
            StepKind::Propose => None,
            StepKind::Soft => Some(self.soft),
            StepKind::Cert => Some(self.cert),
            StepKind::Next => Some(self.next),
        }
    }
}

/// Result of [`Accumulator::add_vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddVoteOutcome {
    Accepted,
    /// Same sender, position and value as a vote already held.
    Duplicate,
    /// Same sender and position, different value. `existing` keeps its effect.
    Equivocation { existing: Vote },
    /// Wrong round, or a non-cert vote below the period floor.
    Stale,
}

/// Result of [`Accumulator::add_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBundleOutcome {
    /// The bundle's votes were folded in; `new_votes` of them were unseen.
    /// `equivocations` pairs each held vote with the bundle vote that
    /// contradicts it.
    Accepted {
        new_votes: usize,
        equivocations: Vec<(Vote, Vote)>,
    },
    Invalid(BundleError),
    Stale,
}

/// Check a bundle's composition against a committee.
///
/// Every vote must match the bundle, senders must be distinct committee
/// members with non-zero weight, and the total must reach the step threshold.
pub fn validate_bundle(
    bundle: &Bundle,
    committee: &ValidatorSet,
    thresholds: &StepThresholds,
) -> Result<(), BundleError> {
    bundle.check_structure()?;

    if let Some(outsider) = bundle.senders().find(|s| committee.voting_power(*s) == 0) {
        return Err(BundleError::NotInCommittee(outsider));
    }

    let threshold = thresholds
        .for_step(bundle.step)
        .ok_or(BundleError::ProposeStep)?;
    let weight = bundle.total_weight()?;
    if weight < threshold {
        return Err(BundleError::InsufficientWeight { weight, threshold });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct StepTally {
    by_sender: BTreeMap<ValidatorId, Vote>,
    weight_by_value: BTreeMap<Value, u64>,
    equivocators: BTreeSet<ValidatorId>,
    certificate: Option<Bundle>,
    reported: bool,
}

impl StepTally {
    /// Heaviest value at or above `threshold`; ties go to the smaller value.
    fn leader(&self, threshold: u64) -> Option<Value> {
        self.weight_by_value
            .iter()
            .filter(|(_, weight)| **weight >= threshold)
            .max_by(|(va, wa), (vb, wb)| wa.cmp(wb).then_with(|| vb.cmp(va)))
            .map(|(value, _)| *value)
    }

    fn has_quorum(&self, threshold: u64) -> bool {
        self.certificate.is_some() || self.leader(threshold).is_some()
    }
}

/// Votes and bundles for one round.
#[derive(Debug, Clone)]
pub struct Accumulator {
    round: Round,
    thresholds: StepThresholds,
    /// Non-cert tallies below this period are discarded.
    period_floor: Period,
    tallies: BTreeMap<(Period, Step), StepTally>,
}

impl Accumulator {
    pub fn new(round: Round, thresholds: StepThresholds) -> Self {
        Self {
            round,
            thresholds,
            period_floor: Period(0),
            tallies: BTreeMap::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn thresholds(&self) -> &StepThresholds {
        &self.thresholds
    }

    fn is_stale(&self, round: Round, period: Period, step: Step) -> bool {
        round != self.round || (step != Step::CERT && period < self.period_floor)
    }

    pub fn add_vote(&mut self, vote: Vote) -> AddVoteOutcome {
        if self.is_stale(vote.round, vote.period, vote.step) {
            return AddVoteOutcome::Stale;
        }

        let tally = self.tallies.entry((vote.period, vote.step)).or_default();
        if let Some(existing) = tally.by_sender.get(&vote.sender) {
            if existing.value == vote.value {
                return AddVoteOutcome::Duplicate;
            }
            tally.equivocators.insert(vote.sender);
            return AddVoteOutcome::Equivocation {
                existing: existing.clone(),
            };
        }

        let weight = tally.weight_by_value.entry(vote.value).or_default();
        *weight = weight.saturating_add(vote.weight);
        tally.by_sender.insert(vote.sender, vote);
        AddVoteOutcome::Accepted
    }

    /// The vote held for `sender` at `position`, if any.
    pub fn vote_of(&self, sender: ValidatorId, position: Position) -> Option<&Vote> {
        if position.round != self.round {
            return None;
        }
        self.tallies
            .get(&(position.period, position.step))
            .and_then(|t| t.by_sender.get(&sender))
    }

    /// The first time some value reaches the step threshold, return its
    /// bundle. Later calls for the same `(period, step)` return `None`.
    pub fn check_quorum(&mut self, period: Period, step: Step) -> Option<Bundle> {
        let threshold = self.thresholds.for_step(step)?;
        let round = self.round;
        let tally = self.tallies.get_mut(&(period, step))?;
        if tally.reported {
            return None;
        }

        if let Some(certificate) = &tally.certificate {
            tally.reported = true;
            return Some(certificate.clone());
        }

        let value = tally.leader(threshold)?;
        let votes = tally
            .by_sender
            .values()
            .filter(|v| v.value == value)
            .cloned()
            .collect();
        let bundle = Bundle::new(
            Position {
                round,
                period,
                step,
            },
            value,
            votes,
        );
        tally.reported = true;
        tally.certificate = Some(bundle.clone());
        Some(bundle)
    }

    pub fn validate_bundle(
        &self,
        bundle: &Bundle,
        committee: &ValidatorSet,
    ) -> Result<(), BundleError> {
        validate_bundle(bundle, committee, &self.thresholds)
    }

    /// Fold a verified bundle in as if all its votes had arrived at once.
    pub fn add_bundle(&mut self, bundle: Bundle, committee: &ValidatorSet) -> AddBundleOutcome {
        if self.is_stale(bundle.round, bundle.period, bundle.step) {
            return AddBundleOutcome::Stale;
        }
        if let Err(e) = self.validate_bundle(&bundle, committee) {
            return AddBundleOutcome::Invalid(e);
        }

        let mut new_votes = 0;
        let mut equivocations = Vec::new();
        for vote in &bundle.votes {
            match self.add_vote(vote.clone()) {
                AddVoteOutcome::Accepted => new_votes += 1,
                AddVoteOutcome::Equivocation { existing } => {
                    equivocations.push((existing, vote.clone()))
                }
                AddVoteOutcome::Duplicate | AddVoteOutcome::Stale => {}
            }
        }

        let tally = self
            .tallies
            .entry((bundle.period, bundle.step))
            .or_default();
        if tally.certificate.is_none() {
            tally.certificate = Some(bundle);
        }
        AddBundleOutcome::Accepted {
            new_votes,
            equivocations,
        }
    }

    /// Whether a bundle is already held for `(period, step)`.
    pub fn has_certificate(&self, period: Period, step: Step) -> bool {
        self.tallies
            .get(&(period, step))
            .is_some_and(|t| t.certificate.is_some())
    }

    /// Steps of `period` with any tally.
    pub fn steps_in(&self, period: Period) -> Vec<Step> {
        self.tallies
            .range((period, Step(0))..=(period, Step(u64::MAX)))
            .map(|((_, step), _)| *step)
            .collect()
    }

    /// Drop non-cert tallies of periods before `period`.
    pub fn advance_period(&mut self, period: Period) {
        if period <= self.period_floor {
            return;
        }
        self.period_floor = period;
        self.tallies
            .retain(|(p, step), _| *step == Step::CERT || *p >= period);
    }

    pub fn period_floor(&self) -> Period {
        self.period_floor
    }

    /// Senders caught equivocating at `(period, step)`.
    pub fn equivocators(&self, period: Period, step: Step) -> Vec<ValidatorId> {
        self.tallies
            .get(&(period, step))
            .map(|t| t.equivocators.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every held vote, in `(period, step, sender)` order.
    pub fn votes(&self) -> Vec<Vote> {
        self.tallies
            .values()
            .flat_map(|t| t.by_sender.values().cloned())
            .collect()
    }

    /// Every held bundle, in `(period, step)` order.
    pub fn certificates(&self) -> Vec<Bundle> {
        self.tallies
            .values()
            .filter_map(|t| t.certificate.clone())
            .collect()
    }

    /// Install a bundle from a checkpoint without re-validating it.
    pub fn restore_certificate(&mut self, bundle: Bundle) {
        if bundle.round != self.round {
            return;
        }
        let tally = self
            .tallies
            .entry((bundle.period, bundle.step))
            .or_default();
        tally.certificate.get_or_insert(bundle);
    }

    /// Mark every quorum already present as reported.
    ///
    /// Used after a restore: the checkpointed player state already reflects
    /// those quorums.
    pub fn settle(&mut self) {
        for ((_, step), tally) in self.tallies.iter_mut() {
            if let Some(threshold) = self.thresholds.for_step(*step) {
                if tally.has_quorum(threshold) {
                    tally.reported = true;
                }
            }
        }
    }
}
