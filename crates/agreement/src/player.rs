//! Agreement player.
//!
//! One [`Player`] drives one node through rounds of Byzantine agreement. It
//! owns the clock and the accumulator, performs no I/O, and communicates only
//! through the [`Action`]s returned from [`StateMachine::handle`].

use crate::{Accumulator, AddBundleOutcome, AddVoteOutcome, AgreementConfig, Clock, StepThresholds};
use concord_core::{
    Action, DisconnectReason, FatalError, IgnoreReason, OutboundMessage, ProtocolEvent,
    StateMachine,
};
use concord_messages::{AgreementVoteGossip, ProposalPayloadGossip, VoteBundleGossip};
use concord_types::{
    AgreementCheckpoint, Bundle, Period, PlayerState, Position, Proposal, Round, Sortition, Step,
    StepKind, ValidatorId, Value, Vote,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Collects actions for one `handle` call and emits them in durable order.
#[derive(Default)]
struct Outbox {
    rezero: Vec<Action>,
    ensure: Vec<Action>,
    checkpoint: bool,
    rest: Vec<Action>,
}

impl Outbox {
    fn rezero(&mut self, round: Round, period: Period) {
        self.rezero.push(Action::Rezero { round, period });
    }

    fn ensure(&mut self, round: Round, certificate: Bundle, proposal: Proposal) {
        self.ensure.push(Action::Ensure {
            round,
            certificate,
            proposal,
        });
    }

    fn checkpoint(&mut self) {
        self.checkpoint = true;
    }

    fn push(&mut self, action: Action) {
        self.rest.push(action);
    }

    fn ignore(&mut self, reason: IgnoreReason) {
        self.rest.push(Action::Ignore { reason });
    }

    fn into_actions(self, player: &Player) -> Vec<Action> {
        let mut actions = self.rezero;
        actions.extend(self.ensure);
        if self.checkpoint {
            actions.push(player.checkpoint_action());
        }
        actions.extend(self.rest);
        actions
    }
}

/// Per-node agreement state machine.
pub struct Player {
    config: AgreementConfig,
    sortition: Arc<dyn Sortition>,

    // ═══════════════════════════════════════════════════════════════════════
    // Position
    // ═══════════════════════════════════════════════════════════════════════
    clock: Clock,
    state: PlayerState,

    // ═══════════════════════════════════════════════════════════════════════
    // Round-local state (reset on every new round)
    // ═══════════════════════════════════════════════════════════════════════
    accumulator: Accumulator,
    /// Value pinned by the previous period's next-vote quorum.
    starting_value: Value,
    /// Soft-quorum value of the current period.
    staged: Option<Value>,
    /// Verified proposals, by value.
    proposals: BTreeMap<Value, Proposal>,
    /// Proposals with a verification in flight.
    pending_payloads: BTreeSet<Value>,
    /// `(period, step)` pairs this node has voted at.
    voted: BTreeSet<(Period, Step)>,
    certified: Option<Bundle>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("validator_id", &self.local_id())
            .field("position", &self.clock.position())
            .field("state", &self.state)
            .field("starting_value", &self.starting_value)
            .field("staged", &self.staged)
            .field("proposals", &self.proposals.len())
            .field("certified", &self.certified.as_ref().map(|b| b.value))
            .finish()
    }
}

impl Player {
    /// Create a player at the start of `round`. Feed it `Start` to begin.
    pub fn new(config: AgreementConfig, sortition: Arc<dyn Sortition>, round: Round) -> Self {
        let thresholds = StepThresholds::compute(&config.thresholds, sortition.as_ref(), round);
        Self {
            clock: Clock::new(Position::round_start(round), config.timeouts),
            state: PlayerState::AwaitingProposal,
            accumulator: Accumulator::new(round, thresholds),
            starting_value: Value::Bottom,
            staged: None,
            proposals: BTreeMap::new(),
            pending_payloads: BTreeSet::new(),
            voted: BTreeSet::new(),
            certified: None,
            config,
            sortition,
        }
    }

    /// Rebuild a player from a persisted checkpoint.
    ///
    /// Quorums present in the checkpoint are not reported again; their
    /// effects are already part of the checkpointed state.
    pub fn from_checkpoint(
        config: AgreementConfig,
        sortition: Arc<dyn Sortition>,
        checkpoint: AgreementCheckpoint,
    ) -> Result<Self, FatalError> {
        checkpoint.validate()?;

        let position = checkpoint.position;
        let thresholds =
            StepThresholds::compute(&config.thresholds, sortition.as_ref(), position.round);
        let mut accumulator = Accumulator::new(position.round, thresholds);
        accumulator.advance_period(position.period);
        for vote in checkpoint.votes {
            accumulator.add_vote(vote);
        }
        for bundle in checkpoint.certificates {
            accumulator.restore_certificate(bundle);
        }
        accumulator.settle();

        let proposals = checkpoint
            .proposals
            .into_iter()
            .map(|p| (p.value(), p))
            .collect();

        info!(
            validator = %sortition.local_validator_id(),
            position = %position,
            state = ?checkpoint.state,
            "Restored agreement player from checkpoint"
        );

        Ok(Self {
            clock: Clock::new(position, config.timeouts),
            state: checkpoint.state,
            accumulator,
            starting_value: checkpoint.starting_value,
            staged: checkpoint.staged,
            proposals,
            pending_payloads: BTreeSet::new(),
            voted: checkpoint.own_votes.into_iter().collect(),
            certified: checkpoint.certified,
            config,
            sortition,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn position(&self) -> Position {
        self.clock.position()
    }

    pub fn round(&self) -> Round {
        self.clock.round()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn certified(&self) -> Option<&Bundle> {
        self.certified.as_ref()
    }

    pub fn staged(&self) -> Option<Value> {
        self.staged
    }

    pub fn starting_value(&self) -> Value {
        self.starting_value
    }

    pub fn config(&self) -> &AgreementConfig {
        &self.config
    }

    pub fn proposal(&self, value: &Value) -> Option<&Proposal> {
        self.proposals.get(value)
    }

    fn local_id(&self) -> ValidatorId {
        self.sortition.local_validator_id()
    }

    /// Snapshot of everything needed to resume at the current position.
    pub fn checkpoint(&self) -> AgreementCheckpoint {
        AgreementCheckpoint {
            position: self.clock.position(),
            state: self.state,
            starting_value: self.starting_value,
            staged: self.staged,
            proposals: self.proposals.values().cloned().collect(),
            votes: self.accumulator.votes(),
            certificates: self.accumulator.certificates(),
            own_votes: self.voted.iter().copied().collect(),
            certified: self.certified.clone(),
        }
    }

    fn checkpoint_action(&self) -> Action {
        let deadline = if self.state.is_decided() {
            None
        } else {
            Some(self.clock.deadline())
        };
        Action::Checkpoint {
            checkpoint: Box::new(self.checkpoint()),
            deadline,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    fn on_start(&mut self, out: &mut Outbox) {
        if self.state.is_decided() {
            out.checkpoint();
            return;
        }
        if self.clock.step() == Step::PROPOSE {
            self.enter_period(out);
        } else {
            out.checkpoint();
        }
        self.maybe_cert_vote(out);
    }

    fn on_round_advanced(&mut self, round: Round, out: &mut Outbox) {
        if round <= self.clock.round() {
            out.ignore(IgnoreReason::Stale);
            return;
        }

        info!(
            validator = %self.local_id(),
            from = self.clock.round().0,
            round = round.0,
            "Starting round"
        );

        self.clock.advance_round(round);
        let thresholds =
            StepThresholds::compute(&self.config.thresholds, self.sortition.as_ref(), round);
        self.accumulator = Accumulator::new(round, thresholds);
        self.state = PlayerState::AwaitingProposal;
        self.starting_value = Value::Bottom;
        self.staged = None;
        self.proposals.clear();
        self.pending_payloads.clear();
        self.voted.clear();
        self.certified = None;

        out.rezero(round, Period(0));
        self.enter_period(out);
    }

    /// Run the period-entry actions for the current period.
    fn enter_period(&mut self, out: &mut Outbox) {
        let round = self.clock.round();
        let period = self.clock.period();

        if !self.starting_value.is_bottom() {
            let value = self.starting_value;
            out.push(Action::Repropose {
                round,
                period,
                value,
                proposal: self.proposals.get(&value).cloned(),
            });
            self.try_soft_vote(value, out);
        } else {
            if self.sortition.is_proposer(self.local_id(), round, period)
                && !self.has_own_proposal(period)
            {
                debug!(
                    validator = %self.local_id(),
                    round = round.0,
                    period = period.0,
                    "Selected as proposer"
                );
                out.push(Action::Assemble { round, period });
            }
            // A proposal for this period may have arrived while we were
            // still in the previous one.
            let early = self
                .proposals
                .values()
                .find(|p| p.original_period == period)
                .map(Proposal::value);
            if let Some(value) = early {
                self.try_soft_vote(value, out);
            }
        }
        out.checkpoint();
    }

    fn has_own_proposal(&self, period: Period) -> bool {
        let me = self.local_id();
        self.proposals
            .values()
            .any(|p| p.proposer == me && p.original_period == period)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Voting
    // ═══════════════════════════════════════════════════════════════════════

    /// Emit `Attest` for an own vote at `step` of the current period.
    fn cast_vote(&mut self, step: Step, value: Value, out: &mut Outbox) -> bool {
        let period = self.clock.period();
        if self.voted.contains(&(period, step)) {
            return false;
        }

        let position = Position {
            round: self.clock.round(),
            period,
            step,
        };
        let Some((weight, credential)) = self.sortition.credential(self.local_id(), position)
        else {
            trace!(
                validator = %self.local_id(),
                position = %position,
                "Not selected to vote"
            );
            return false;
        };

        debug!(
            validator = %self.local_id(),
            round = position.round.0,
            period = period.0,
            step = step.0,
            value = %value,
            "Casting vote"
        );
        self.voted.insert((period, step));
        out.push(Action::Attest {
            vote: Vote::unsigned(self.local_id(), position, value, weight, credential),
        });
        out.checkpoint();
        true
    }

    fn try_soft_vote(&mut self, value: Value, out: &mut Outbox) {
        if self.voted.contains(&(self.clock.period(), Step::SOFT)) {
            return;
        }
        if !self.starting_value.is_bottom() && self.starting_value != value {
            return;
        }
        if !matches!(
            self.state,
            PlayerState::AwaitingProposal | PlayerState::AwaitingSoftVotes
        ) {
            return;
        }
        self.cast_vote(Step::SOFT, value, out);
    }

    /// Soft-vote a freshly verified proposal if it is a candidate for the
    /// current period.
    fn consider_proposal(&mut self, proposal_period: Period, value: Value, out: &mut Outbox) {
        let pinned = !self.starting_value.is_bottom();
        if (pinned && self.starting_value == value)
            || (!pinned && proposal_period == self.clock.period())
        {
            self.try_soft_vote(value, out);
        }
        self.maybe_cert_vote(out);
    }

    /// Cert-vote the staged value once its proposal is known.
    fn maybe_cert_vote(&mut self, out: &mut Outbox) {
        let Some(value) = self.staged else {
            return;
        };
        if !self.proposals.contains_key(&value) {
            return;
        }
        if !matches!(
            self.state,
            PlayerState::AwaitingProposal | PlayerState::AwaitingSoftVotes
        ) {
            return;
        }
        if self.voted.contains(&(self.clock.period(), Step::CERT)) {
            return;
        }

        self.clock.advance_step(Step::CERT);
        self.state = PlayerState::AwaitingCertVotes;
        out.checkpoint();
        self.cast_vote(Step::CERT, value, out);
    }

    /// Escalate to next-vote `step` of the current period.
    fn next_vote(&mut self, step: Step, out: &mut Outbox) -> Result<(), FatalError> {
        self.clock.advance_step(step);
        self.state = PlayerState::AwaitingNextVotes(step);

        // Staged value first, then the pinned value, which may be bottom.
        let value = self.staged.unwrap_or(self.starting_value);
        debug!(
            validator = %self.local_id(),
            position = %self.clock.position(),
            value = %value,
            "Step timed out, next-voting"
        );
        self.cast_vote(step, value, out);
        out.checkpoint();
        let period = self.clock.period();
        self.check_quorum(period, step, out)
    }

    fn on_timeout(&mut self, position: Position, out: &mut Outbox) -> Result<(), FatalError> {
        if position != self.clock.position() || self.state.is_decided() {
            trace!(
                validator = %self.local_id(),
                timer = %position,
                current = %self.clock.position(),
                "Stale timeout"
            );
            return Ok(());
        }

        match position.step.kind() {
            StepKind::Propose => {
                self.clock.advance_step(Step::SOFT);
                self.state = PlayerState::AwaitingSoftVotes;
                out.checkpoint();
                Ok(())
            }
            StepKind::Soft | StepKind::Cert => self.next_vote(Step::NEXT, out),
            StepKind::Next => self.next_vote(position.step.next(), out),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Quorums
    // ═══════════════════════════════════════════════════════════════════════

    /// React to a quorum at `(period, step)` if one has formed and matters
    /// at the current position.
    fn check_quorum(
        &mut self,
        period: Period,
        step: Step,
        out: &mut Outbox,
    ) -> Result<(), FatalError> {
        let relevant = match step.kind() {
            StepKind::Propose => false,
            StepKind::Soft => !self.state.is_decided() && period == self.clock.period(),
            StepKind::Cert => true,
            StepKind::Next => !self.state.is_decided() && period >= self.clock.period(),
        };
        if !relevant {
            return Ok(());
        }
        let Some(bundle) = self.accumulator.check_quorum(period, step) else {
            return Ok(());
        };

        match step.kind() {
            StepKind::Soft => {
                self.on_soft_quorum(bundle, out);
                Ok(())
            }
            StepKind::Cert => self.on_cert_quorum(bundle, out),
            StepKind::Next => self.on_next_quorum(bundle, out),
            StepKind::Propose => Ok(()),
        }
    }

    fn on_soft_quorum(&mut self, bundle: Bundle, out: &mut Outbox) {
        info!(
            validator = %self.local_id(),
            round = bundle.round.0,
            period = bundle.period.0,
            value = %bundle.value,
            votes = bundle.votes.len(),
            "Soft quorum"
        );
        self.staged = Some(bundle.value);
        out.checkpoint();
        self.maybe_cert_vote(out);
    }

    fn on_cert_quorum(&mut self, bundle: Bundle, out: &mut Outbox) -> Result<(), FatalError> {
        if let Some(held) = &self.certified {
            if held.value != bundle.value {
                return Err(FatalError::ConflictingCertificate {
                    round: bundle.round,
                    held: held.value,
                    observed: bundle.value,
                });
            }
            return Ok(());
        }

        info!(
            validator = %self.local_id(),
            round = bundle.round.0,
            period = bundle.period.0,
            value = %bundle.value,
            votes = bundle.votes.len(),
            "Round decided"
        );

        self.state = PlayerState::Decided;
        self.certified = Some(bundle.clone());
        if let Some(proposal) = self.proposals.get(&bundle.value) {
            out.ensure(bundle.round, bundle.clone(), proposal.clone());
        } else {
            debug!(
                validator = %self.local_id(),
                value = %bundle.value,
                "Certified value without its proposal, waiting for payload"
            );
        }
        out.checkpoint();
        out.push(Action::BroadcastVotes { bundle });
        Ok(())
    }

    fn on_next_quorum(&mut self, bundle: Bundle, out: &mut Outbox) -> Result<(), FatalError> {
        let round = bundle.round;
        let period = bundle.period.next();
        info!(
            validator = %self.local_id(),
            round = round.0,
            period = bundle.period.0,
            step = bundle.step.0,
            value = %bundle.value,
            "Next quorum, advancing period"
        );

        self.starting_value = bundle.value;
        out.push(Action::BroadcastVotes { bundle });

        self.clock.advance_period_to(period);
        self.accumulator.advance_period(period);
        self.state = PlayerState::AwaitingProposal;
        self.staged = None;
        self.voted.retain(|(p, _)| *p >= period);
        // Only the pinned value's payload is still wanted.
        let pinned = self.starting_value;
        self.pending_payloads.retain(|v| *v == pinned);

        out.rezero(round, period);
        self.enter_period(out);

        for step in self.accumulator.steps_in(period) {
            self.check_quorum(period, step, out)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Filters
    // ═══════════════════════════════════════════════════════════════════════

    fn filter_round(&self, round: Round, peer: ValidatorId) -> Option<IgnoreReason> {
        let current = self.clock.round();
        if round < current {
            Some(IgnoreReason::Stale)
        } else if round > current {
            Some(IgnoreReason::FutureRound { round, peer })
        } else {
            None
        }
    }

    /// Filter shared by votes and bundles.
    fn filter_position(
        &self,
        position: Position,
        value: Value,
        peer: ValidatorId,
    ) -> Option<IgnoreReason> {
        if let Some(reason) = self.filter_round(position.round, peer) {
            return Some(reason);
        }
        // Cert-step evidence still counts once decided, so a conflicting
        // certificate surfaces as a fatal error.
        if self.state.is_decided() && position.step != Step::CERT {
            return Some(IgnoreReason::Decided);
        }
        match position.step.kind() {
            StepKind::Propose => return Some(IgnoreReason::ProposeStep),
            StepKind::Soft | StepKind::Cert if value.is_bottom() => {
                return Some(IgnoreReason::BottomVote)
            }
            _ => {}
        }
        let current = self.clock.period();
        if position.step != Step::CERT && position.period < current {
            return Some(IgnoreReason::Stale);
        }
        if position.period > current.next() {
            return Some(IgnoreReason::TooFarAhead);
        }
        None
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Proposals
    // ═══════════════════════════════════════════════════════════════════════

    fn on_proposal_received(&mut self, proposal: Proposal, sender: ValidatorId, out: &mut Outbox) {
        if let Some(reason) = self.filter_round(proposal.round, sender) {
            out.ignore(reason);
            return;
        }
        let value = proposal.value();
        if let Some(cert) = &self.certified {
            if cert.value != value {
                out.ignore(IgnoreReason::Decided);
                return;
            }
        }
        if self.proposals.contains_key(&value) || self.pending_payloads.contains(&value) {
            out.ignore(IgnoreReason::Duplicate);
            return;
        }
        if proposal.original_period > self.clock.period().next() {
            out.ignore(IgnoreReason::TooFarAhead);
            return;
        }

        trace!(
            validator = %self.local_id(),
            sender = %sender,
            proposer = %proposal.proposer,
            value = %value,
            "Verifying proposal"
        );
        self.pending_payloads.insert(value);
        out.push(Action::VerifyPayload { proposal, sender });
    }

    fn on_payload_verified(
        &mut self,
        proposal: Proposal,
        sender: ValidatorId,
        valid: bool,
        out: &mut Outbox,
    ) {
        let value = proposal.value();
        if !self.pending_payloads.remove(&value) {
            trace!(
                validator = %self.local_id(),
                value = %value,
                "Payload verification superseded"
            );
            out.ignore(IgnoreReason::Stale);
            return;
        }

        if !valid {
            debug!(
                validator = %self.local_id(),
                sender = %sender,
                proposer = %proposal.proposer,
                "Invalid proposal payload"
            );
            out.ignore(IgnoreReason::InvalidPayload);
            return;
        }
        if proposal.round != self.clock.round() {
            out.ignore(IgnoreReason::Stale);
            return;
        }
        if self.proposals.contains_key(&value) {
            out.ignore(IgnoreReason::Duplicate);
            return;
        }

        let proposal_period = proposal.original_period;
        self.proposals.insert(value, proposal.clone());
        out.checkpoint();
        out.push(Action::Relay {
            message: OutboundMessage::Proposal(Box::new(ProposalPayloadGossip::new(
                proposal.clone(),
            ))),
            source: sender,
        });

        if let Some(cert) = &self.certified {
            if cert.value == value {
                out.ensure(cert.round, cert.clone(), proposal);
            }
            return;
        }
        self.consider_proposal(proposal_period, value, out);
    }

    fn on_proposal_assembled(&mut self, proposal: Proposal, out: &mut Outbox) {
        if proposal.round != self.clock.round() {
            out.ignore(IgnoreReason::Stale);
            return;
        }
        if self.state.is_decided() {
            out.ignore(IgnoreReason::Decided);
            return;
        }

        let value = proposal.value();
        info!(
            validator = %self.local_id(),
            round = proposal.round.0,
            period = proposal.original_period.0,
            value = %value,
            "Proposing"
        );
        let proposal_period = proposal.original_period;
        self.proposals.insert(value, proposal.clone());
        out.checkpoint();
        out.push(Action::Broadcast {
            message: OutboundMessage::Proposal(Box::new(ProposalPayloadGossip::new(proposal))),
        });
        self.consider_proposal(proposal_period, value, out);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Votes
    // ═══════════════════════════════════════════════════════════════════════

    fn on_vote_received(&mut self, vote: Vote, sender: ValidatorId, out: &mut Outbox) {
        if let Some(reason) = self.filter_position(vote.position(), vote.value, sender) {
            out.ignore(reason);
            return;
        }
        if self
            .accumulator
            .vote_of(vote.sender, vote.position())
            .is_some_and(|held| held.value == vote.value)
        {
            out.ignore(IgnoreReason::Duplicate);
            return;
        }
        out.push(Action::VerifyVote { vote, sender });
    }

    fn on_vote_verified(
        &mut self,
        vote: Vote,
        sender: ValidatorId,
        valid: bool,
        out: &mut Outbox,
    ) -> Result<(), FatalError> {
        if !valid {
            debug!(
                validator = %self.local_id(),
                sender = %sender,
                voter = %vote.sender,
                position = %vote.position(),
                "Invalid vote"
            );
            out.ignore(IgnoreReason::InvalidVote);
            return Ok(());
        }
        if let Some(reason) = self.filter_position(vote.position(), vote.value, sender) {
            out.ignore(reason);
            return Ok(());
        }
        self.count_vote(vote, Some(sender), out)
    }

    fn on_vote_attested(&mut self, vote: Vote, out: &mut Outbox) -> Result<(), FatalError> {
        if let Some(reason) = self.filter_position(vote.position(), vote.value, self.local_id()) {
            out.ignore(reason);
            return Ok(());
        }
        self.count_vote(vote, None, out)
    }

    /// Add a verified vote. `relay_from` is the delivering peer, or `None`
    /// for this node's own votes.
    fn count_vote(
        &mut self,
        vote: Vote,
        relay_from: Option<ValidatorId>,
        out: &mut Outbox,
    ) -> Result<(), FatalError> {
        let position = vote.position();
        match self.accumulator.add_vote(vote.clone()) {
            AddVoteOutcome::Accepted => {
                trace!(
                    validator = %self.local_id(),
                    voter = %vote.sender,
                    position = %position,
                    value = %vote.value,
                    "Vote counted"
                );
                if let Some(source) = relay_from {
                    out.push(Action::Relay {
                        message: OutboundMessage::Vote(AgreementVoteGossip::new(vote)),
                        source,
                    });
                }
                out.checkpoint();
                self.check_quorum(position.period, position.step, out)
            }
            AddVoteOutcome::Duplicate => {
                out.ignore(IgnoreReason::Duplicate);
                Ok(())
            }
            AddVoteOutcome::Equivocation { existing } => {
                warn!(
                    validator = %self.local_id(),
                    equivocator = %vote.sender,
                    position = %position,
                    first = %existing.value,
                    second = %vote.value,
                    "Equivocating vote"
                );
                out.push(Action::Disconnect {
                    peer: vote.sender,
                    reason: DisconnectReason::Equivocation {
                        sender: vote.sender,
                        position,
                    },
                });
                Ok(())
            }
            AddVoteOutcome::Stale => {
                out.ignore(IgnoreReason::Stale);
                Ok(())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Bundles
    // ═══════════════════════════════════════════════════════════════════════

    fn on_bundle_received(&mut self, bundle: Bundle, sender: ValidatorId, out: &mut Outbox) {
        if let Some(reason) = self.filter_position(bundle.position(), bundle.value, sender) {
            out.ignore(reason);
            return;
        }
        if self.accumulator.has_certificate(bundle.period, bundle.step) {
            out.ignore(IgnoreReason::Duplicate);
            return;
        }
        if let Err(error) = self
            .accumulator
            .validate_bundle(&bundle, self.sortition.committee())
        {
            warn!(
                validator = %self.local_id(),
                sender = %sender,
                position = %bundle.position(),
                error = %error,
                "Malformed bundle"
            );
            out.push(Action::Disconnect {
                peer: sender,
                reason: DisconnectReason::MalformedBundle(error),
            });
            return;
        }
        out.push(Action::VerifyBundle { bundle, sender });
    }

    fn on_bundle_verified(
        &mut self,
        bundle: Bundle,
        sender: ValidatorId,
        valid: bool,
        out: &mut Outbox,
    ) -> Result<(), FatalError> {
        if !valid {
            warn!(
                validator = %self.local_id(),
                sender = %sender,
                position = %bundle.position(),
                value = %bundle.value,
                "Bundle carries invalid votes"
            );
            out.push(Action::Disconnect {
                peer: sender,
                reason: DisconnectReason::InvalidBundle,
            });
            return Ok(());
        }
        if let Some(reason) = self.filter_position(bundle.position(), bundle.value, sender) {
            out.ignore(reason);
            return Ok(());
        }
        if self.accumulator.has_certificate(bundle.period, bundle.step) {
            out.ignore(IgnoreReason::Duplicate);
            return Ok(());
        }

        let (period, step) = (bundle.period, bundle.step);
        match self
            .accumulator
            .add_bundle(bundle.clone(), self.sortition.committee())
        {
            AddBundleOutcome::Accepted {
                new_votes,
                equivocations,
            } => {
                for (existing, conflicting) in equivocations {
                    warn!(
                        validator = %self.local_id(),
                        equivocator = %conflicting.sender,
                        sender = %sender,
                        position = %conflicting.position(),
                        first = %existing.value,
                        second = %conflicting.value,
                        "Equivocating vote in bundle"
                    );
                    out.push(Action::Disconnect {
                        peer: conflicting.sender,
                        reason: DisconnectReason::Equivocation {
                            sender: conflicting.sender,
                            position: conflicting.position(),
                        },
                    });
                }
                debug!(
                    validator = %self.local_id(),
                    sender = %sender,
                    position = %bundle.position(),
                    value = %bundle.value,
                    new_votes,
                    "Bundle accepted"
                );
                out.push(Action::Relay {
                    message: OutboundMessage::Bundle(VoteBundleGossip::new(bundle)),
                    source: sender,
                });
                out.checkpoint();
                self.check_quorum(period, step, out)
            }
            AddBundleOutcome::Invalid(error) => {
                out.push(Action::Disconnect {
                    peer: sender,
                    reason: DisconnectReason::MalformedBundle(error),
                });
                Ok(())
            }
            AddBundleOutcome::Stale => {
                out.ignore(IgnoreReason::Stale);
                Ok(())
            }
        }
    }
}

impl StateMachine for Player {
    fn handle(&mut self, event: ProtocolEvent) -> Result<Vec<Action>, FatalError> {
        let mut out = Outbox::default();
        match event {
            ProtocolEvent::Start => self.on_start(&mut out),
            ProtocolEvent::RoundAdvanced { round } => self.on_round_advanced(round, &mut out),
            ProtocolEvent::Timeout { position } => self.on_timeout(position, &mut out)?,
            ProtocolEvent::ProposalReceived { proposal, sender } => {
                self.on_proposal_received(proposal, sender, &mut out)
            }
            ProtocolEvent::ProposalAssembled { proposal } => {
                self.on_proposal_assembled(proposal, &mut out)
            }
            ProtocolEvent::PayloadVerified {
                proposal,
                sender,
                valid,
            } => self.on_payload_verified(proposal, sender, valid, &mut out),
            ProtocolEvent::VoteReceived { vote, sender } => {
                self.on_vote_received(vote, sender, &mut out)
            }
            ProtocolEvent::VoteVerified {
                vote,
                sender,
                valid,
            } => self.on_vote_verified(vote, sender, valid, &mut out)?,
            ProtocolEvent::VoteAttested { vote } => self.on_vote_attested(vote, &mut out)?,
            ProtocolEvent::BundleReceived { bundle, sender } => {
                self.on_bundle_received(bundle, sender, &mut out)
            }
            ProtocolEvent::BundleVerified {
                bundle,
                sender,
                valid,
            } => self.on_bundle_verified(bundle, sender, valid, &mut out)?,
        }
        Ok(out.into_actions(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thresholds;
    use concord_core::ActionKind;
    use concord_test_helpers::{fixtures, TestCommittee};
    use concord_types::Hash;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn config() -> AgreementConfig {
        AgreementConfig::default().with_thresholds(Thresholds::two_thirds())
    }

    fn player(committee: &TestCommittee, idx: usize, round: u64) -> Player {
        Player::new(config(), committee.sortition(idx), Round(round))
    }

    fn handle(player: &mut Player, event: ProtocolEvent) -> Vec<Action> {
        player.handle(event).expect("no fatal error")
    }

    fn kinds(actions: &[Action]) -> Vec<ActionKind> {
        actions.iter().map(Action::kind).collect()
    }

    fn attested(actions: &[Action]) -> Vec<Vote> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Attest { vote } => Some(vote.clone()),
                _ => None,
            })
            .collect()
    }

    fn value(tag: &[u8]) -> Value {
        Value::Proposal(Hash::from_bytes(tag))
    }

    /// Receive and verify a vote relayed by `sender`.
    fn deliver_vote(player: &mut Player, vote: Vote, sender: ValidatorId) -> Vec<Action> {
        let actions = handle(
            player,
            ProtocolEvent::VoteReceived {
                vote: vote.clone(),
                sender,
            },
        );
        assert_eq!(kinds(&actions), vec![ActionKind::VerifyVote]);
        handle(
            player,
            ProtocolEvent::VoteVerified {
                vote,
                sender,
                valid: true,
            },
        )
    }

    /// Receive and verify a bundle relayed by validator 1.
    fn deliver_bundle(player: &mut Player, bundle: Bundle) -> Vec<Action> {
        let sender = ValidatorId(1);
        let actions = handle(
            player,
            ProtocolEvent::BundleReceived {
                bundle: bundle.clone(),
                sender,
            },
        );
        assert_eq!(kinds(&actions), vec![ActionKind::VerifyBundle]);
        handle(
            player,
            ProtocolEvent::BundleVerified {
                bundle,
                sender,
                valid: true,
            },
        )
    }

    /// Feed this node's own attested votes back in.
    fn attest_back(player: &mut Player, actions: &[Action]) {
        for vote in attested(actions) {
            handle(player, ProtocolEvent::VoteAttested { vote });
        }
    }

    /// Drive validator 0 from round start to a soft vote for the round's
    /// proposal.
    fn soft_vote_proposal(player: &mut Player, committee: &TestCommittee) -> Proposal {
        let round = player.round();
        handle(player, ProtocolEvent::Start);
        let proposal = fixtures::make_proposal_for(committee, round, Period(0), b"block");
        let sender = proposal.proposer;

        let actions = handle(
            player,
            ProtocolEvent::ProposalReceived {
                proposal: proposal.clone(),
                sender,
            },
        );
        assert_eq!(kinds(&actions), vec![ActionKind::VerifyPayload]);

        let actions = handle(
            player,
            ProtocolEvent::PayloadVerified {
                proposal: proposal.clone(),
                sender,
                valid: true,
            },
        );
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Checkpoint, ActionKind::Relay, ActionKind::Attest]
        );
        attest_back(player, &actions);
        proposal
    }

    #[test]
    fn test_start_as_proposer_assembles() {
        let committee = TestCommittee::new(4, 1);
        // Proposer of (4, 0) is (4 + 0) % 4 = validator 0.
        let mut player = player(&committee, 0, 4);

        let actions = handle(&mut player, ProtocolEvent::Start);
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Checkpoint, ActionKind::Assemble]
        );
        match &actions[0] {
            Action::Checkpoint {
                checkpoint,
                deadline,
            } => {
                assert_eq!(checkpoint.position, Position::new(4, 0, 0));
                assert_eq!(
                    *deadline,
                    Some(concord_core::Deadline {
                        position: Position::new(4, 0, 0),
                        after: Duration::from_secs(4),
                    })
                );
            }
            other => panic!("expected checkpoint, got {other:?}"),
        }
    }

    #[test]
    fn test_start_as_follower_only_checkpoints() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);

        let actions = handle(&mut player, ProtocolEvent::Start);
        assert_eq!(kinds(&actions), vec![ActionKind::Checkpoint]);
        assert_eq!(player.state(), PlayerState::AwaitingProposal);
    }

    #[test]
    fn test_assembled_proposal_is_broadcast_and_soft_voted() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 4);
        handle(&mut player, ProtocolEvent::Start);

        let proposal = fixtures::make_signed_proposal(&committee, 0, Round(4), Period(0), b"own");
        let actions = handle(
            &mut player,
            ProtocolEvent::ProposalAssembled {
                proposal: proposal.clone(),
            },
        );
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Checkpoint, ActionKind::Broadcast, ActionKind::Attest]
        );
        let votes = attested(&actions);
        assert_eq!(votes[0].step, Step::SOFT);
        assert_eq!(votes[0].value, proposal.value());
    }

    #[test]
    fn test_soft_quorum_leads_to_cert_vote() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        let proposal = soft_vote_proposal(&mut player, &committee);
        let soft = Position::new(1, 0, 1);

        let actions = deliver_vote(
            &mut player,
            fixtures::make_signed_vote(&committee, 1, soft, proposal.value()),
            ValidatorId(1),
        );
        assert_eq!(kinds(&actions), vec![ActionKind::Checkpoint, ActionKind::Relay]);

        let actions = deliver_vote(
            &mut player,
            fixtures::make_signed_vote(&committee, 2, soft, proposal.value()),
            ValidatorId(2),
        );
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Checkpoint, ActionKind::Relay, ActionKind::Attest]
        );
        let cert = attested(&actions);
        assert_eq!(cert[0].position(), Position::new(1, 0, 2));
        assert_eq!(player.staged(), Some(proposal.value()));
        assert_eq!(player.state(), PlayerState::AwaitingCertVotes);
        assert_eq!(player.position(), Position::new(1, 0, 2));
    }

    #[test]
    fn test_cert_quorum_orders_ensure_before_checkpoint() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        let proposal = soft_vote_proposal(&mut player, &committee);
        let value = proposal.value();

        for idx in [1, 2] {
            let vote = fixtures::make_signed_vote(&committee, idx, Position::new(1, 0, 1), value);
            let actions = deliver_vote(&mut player, vote, ValidatorId(idx as u64));
            attest_back(&mut player, &actions);
        }

        deliver_vote(
            &mut player,
            fixtures::make_signed_vote(&committee, 1, Position::new(1, 0, 2), value),
            ValidatorId(1),
        );
        let actions = deliver_vote(
            &mut player,
            fixtures::make_signed_vote(&committee, 2, Position::new(1, 0, 2), value),
            ValidatorId(2),
        );
        assert_eq!(
            kinds(&actions),
            vec![
                ActionKind::Ensure,
                ActionKind::Checkpoint,
                ActionKind::Relay,
                ActionKind::BroadcastVotes
            ]
        );
        match &actions[1] {
            Action::Checkpoint { deadline, .. } => assert_eq!(*deadline, None),
            other => panic!("expected checkpoint, got {other:?}"),
        }
        assert!(player.state().is_decided());
        assert_eq!(player.certified().map(|b| b.value), Some(value));

        // The next round starts with a rezero.
        let actions = handle(&mut player, ProtocolEvent::RoundAdvanced { round: Round(2) });
        assert_eq!(kinds(&actions), vec![ActionKind::Rezero, ActionKind::Checkpoint]);
        assert_eq!(player.position(), Position::new(2, 0, 0));
        assert_eq!(player.certified(), None);
    }

    #[test]
    fn test_decision_waits_for_payload() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let proposal = fixtures::make_proposal_for(&committee, Round(1), Period(0), b"late");
        let bundle = fixtures::make_signed_bundle(
            &committee,
            &[1, 2, 3],
            Position::new(1, 0, 2),
            proposal.value(),
        );
        let actions = deliver_bundle(&mut player, bundle);
        assert!(!kinds(&actions).contains(&ActionKind::Ensure));
        assert!(player.state().is_decided());

        let sender = proposal.proposer;
        handle(
            &mut player,
            ProtocolEvent::ProposalReceived {
                proposal: proposal.clone(),
                sender,
            },
        );
        let actions = handle(
            &mut player,
            ProtocolEvent::PayloadVerified {
                proposal,
                sender,
                valid: true,
            },
        );
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Ensure, ActionKind::Checkpoint, ActionKind::Relay]
        );
    }

    #[test]
    fn test_timeouts_escalate_to_next_votes() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let actions = handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(1, 0, 0),
            },
        );
        assert_eq!(kinds(&actions), vec![ActionKind::Checkpoint]);
        assert_eq!(player.state(), PlayerState::AwaitingSoftVotes);

        let actions = handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(1, 0, 1),
            },
        );
        assert_eq!(kinds(&actions), vec![ActionKind::Checkpoint, ActionKind::Attest]);
        let votes = attested(&actions);
        assert_eq!(votes[0].position(), Position::new(1, 0, 3));
        assert_eq!(votes[0].value, Value::Bottom);

        let actions = handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(1, 0, 3),
            },
        );
        assert_eq!(attested(&actions)[0].position(), Position::new(1, 0, 4));
        assert_eq!(player.state(), PlayerState::AwaitingNextVotes(Step(4)));
    }

    #[test]
    fn test_next_vote_prefers_staged_value() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        // Soft quorum without the proposal: staged, but no cert vote.
        let staged = value(b"unseen");
        for idx in 1..4 {
            let vote = fixtures::make_signed_vote(&committee, idx, Position::new(1, 0, 1), staged);
            deliver_vote(&mut player, vote, ValidatorId(idx as u64));
        }
        assert_eq!(player.staged(), Some(staged));
        assert_eq!(player.state(), PlayerState::AwaitingProposal);

        handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(1, 0, 0),
            },
        );
        let actions = handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(1, 0, 1),
            },
        );
        assert_eq!(attested(&actions)[0].value, staged);
    }

    #[test]
    fn test_next_quorum_pins_value_and_reproposes() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let pinned = value(b"pinned");
        let bundle =
            fixtures::make_signed_bundle(&committee, &[1, 2, 3], Position::new(1, 0, 3), pinned);
        let actions = deliver_bundle(&mut player, bundle);
        assert_eq!(
            kinds(&actions),
            vec![
                ActionKind::Rezero,
                ActionKind::Checkpoint,
                ActionKind::Relay,
                ActionKind::BroadcastVotes,
                ActionKind::Repropose,
                ActionKind::Attest
            ]
        );
        assert_eq!(player.position(), Position::new(1, 1, 0));
        assert_eq!(player.starting_value(), pinned);

        let soft = attested(&actions);
        assert_eq!(soft[0].position(), Position::new(1, 1, 1));
        assert_eq!(soft[0].value, pinned);

        // A different proposal cannot draw a soft vote while a value is pinned.
        let other = fixtures::make_proposal_for(&committee, Round(1), Period(1), b"other");
        let sender = other.proposer;
        handle(
            &mut player,
            ProtocolEvent::ProposalReceived {
                proposal: other.clone(),
                sender,
            },
        );
        let actions = handle(
            &mut player,
            ProtocolEvent::PayloadVerified {
                proposal: other,
                sender,
                valid: true,
            },
        );
        assert!(attested(&actions).is_empty());
    }

    #[test]
    fn test_stale_timeout_is_silent() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 5);
        handle(&mut player, ProtocolEvent::Start);

        for period in 0..3 {
            for step in [0, 1] {
                handle(
                    &mut player,
                    ProtocolEvent::Timeout {
                        position: Position::new(5, period, step),
                    },
                );
            }
            assert_eq!(player.position(), Position::new(5, period, 3));
            let bundle = fixtures::make_signed_bundle(
                &committee,
                &[1, 2, 3],
                Position::new(5, period, 3),
                Value::Bottom,
            );
            deliver_bundle(&mut player, bundle);
        }
        assert_eq!(player.position(), Position::new(5, 3, 0));
        let before = player.checkpoint();

        let actions = handle(
            &mut player,
            ProtocolEvent::Timeout {
                position: Position::new(5, 2, 3),
            },
        );
        assert!(actions.is_empty());
        assert_eq!(player.checkpoint(), before);
    }

    #[traced_test]
    #[test]
    fn test_equivocation_disconnects_the_equivocator() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let soft = Position::new(1, 0, 1);
        let (first, second) = concord_test_helpers::byzantine::make_equivocating_votes(
            &committee,
            2,
            soft,
            value(b"a"),
            value(b"b"),
        );
        deliver_vote(&mut player, first.clone(), ValidatorId(2));

        // The second vote arrives relayed by an honest peer.
        let actions = deliver_vote(&mut player, second, ValidatorId(3));
        assert_eq!(kinds(&actions), vec![ActionKind::Disconnect]);
        match &actions[0] {
            Action::Disconnect { peer, reason } => {
                assert_eq!(*peer, ValidatorId(2));
                assert_eq!(
                    *reason,
                    DisconnectReason::Equivocation {
                        sender: ValidatorId(2),
                        position: soft,
                    }
                );
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(logs_contain("Equivocating vote"));

        let held: Vec<_> = player
            .checkpoint()
            .votes
            .into_iter()
            .filter(|v| v.sender == ValidatorId(2))
            .collect();
        assert_eq!(held, vec![first]);
    }

    #[test]
    fn test_vote_filters() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 3);
        handle(&mut player, ProtocolEvent::Start);
        let a = value(b"a");
        let peer = ValidatorId(1);

        let cases = [
            (
                fixtures::make_signed_vote(&committee, 1, Position::new(4, 0, 1), a),
                IgnoreReason::FutureRound {
                    round: Round(4),
                    peer,
                },
            ),
            (
                fixtures::make_signed_vote(&committee, 1, Position::new(2, 0, 1), a),
                IgnoreReason::Stale,
            ),
            (
                fixtures::make_signed_vote(&committee, 1, Position::new(3, 0, 0), a),
                IgnoreReason::ProposeStep,
            ),
            (
                fixtures::make_signed_vote(&committee, 1, Position::new(3, 0, 2), Value::Bottom),
                IgnoreReason::BottomVote,
            ),
            (
                fixtures::make_signed_vote(&committee, 1, Position::new(3, 2, 3), a),
                IgnoreReason::TooFarAhead,
            ),
        ];
        for (vote, reason) in cases {
            let actions = handle(&mut player, ProtocolEvent::VoteReceived { vote, sender: peer });
            match actions.as_slice() {
                [Action::Ignore { reason: got }] => assert_eq!(*got, reason),
                other => panic!("expected ignore {reason:?}, got {other:?}"),
            }
        }

        let vote = fixtures::make_signed_vote(&committee, 1, Position::new(3, 0, 1), a);
        deliver_vote(&mut player, vote.clone(), peer);
        let actions = handle(&mut player, ProtocolEvent::VoteReceived { vote, sender: peer });
        assert!(matches!(
            actions.as_slice(),
            [Action::Ignore {
                reason: IgnoreReason::Duplicate
            }]
        ));
    }

    #[test]
    fn test_invalid_vote_is_ignored() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let vote = fixtures::make_signed_vote(&committee, 1, Position::new(1, 0, 1), value(b"a"));
        let actions = handle(
            &mut player,
            ProtocolEvent::VoteVerified {
                vote,
                sender: ValidatorId(1),
                valid: false,
            },
        );
        assert!(matches!(
            actions.as_slice(),
            [Action::Ignore {
                reason: IgnoreReason::InvalidVote
            }]
        ));
        assert!(player.checkpoint().votes.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_bad_bundles_disconnect_the_sender() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);
        let position = Position::new(1, 0, 2);

        let light = fixtures::make_signed_bundle(&committee, &[1, 2], position, value(b"a"));
        let actions = handle(
            &mut player,
            ProtocolEvent::BundleReceived {
                bundle: light,
                sender: ValidatorId(3),
            },
        );
        match actions.as_slice() {
            [Action::Disconnect { peer, reason }] => {
                assert_eq!(*peer, ValidatorId(3));
                assert!(matches!(
                    reason,
                    DisconnectReason::MalformedBundle(
                        concord_types::BundleError::InsufficientWeight { .. }
                    )
                ));
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(logs_contain("Malformed bundle"));

        let full = fixtures::make_signed_bundle(&committee, &[1, 2, 3], position, value(b"a"));
        let actions = handle(
            &mut player,
            ProtocolEvent::BundleVerified {
                bundle: full,
                sender: ValidatorId(3),
                valid: false,
            },
        );
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect {
                reason: DisconnectReason::InvalidBundle,
                ..
            }]
        ));
        assert!(!player.state().is_decided());
    }

    #[test]
    fn test_overflowing_bundle_weight_disconnects_the_sender() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let mut bundle =
            fixtures::make_signed_bundle(&committee, &[1, 2], Position::new(1, 0, 2), value(b"a"));
        for vote in &mut bundle.votes {
            vote.weight = u64::MAX / 2 + 1;
        }
        let actions = handle(
            &mut player,
            ProtocolEvent::BundleReceived {
                bundle,
                sender: ValidatorId(3),
            },
        );
        match actions.as_slice() {
            [Action::Disconnect { peer, reason }] => {
                assert_eq!(*peer, ValidatorId(3));
                assert_eq!(
                    *reason,
                    DisconnectReason::MalformedBundle(concord_types::BundleError::WeightOverflow)
                );
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(player.checkpoint().certificates.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_equivocation_inside_bundle_disconnects_the_signer() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);
        let next = Position::new(1, 0, 3);

        let held = fixtures::make_signed_vote(&committee, 1, next, value(b"a"));
        deliver_vote(&mut player, held.clone(), ValidatorId(1));

        let bundle = fixtures::make_signed_bundle(&committee, &[1, 2, 3], next, value(b"b"));
        let actions = deliver_bundle(&mut player, bundle);
        assert_eq!(
            kinds(&actions),
            vec![
                ActionKind::Rezero,
                ActionKind::Checkpoint,
                ActionKind::Disconnect,
                ActionKind::Relay,
                ActionKind::BroadcastVotes,
                ActionKind::Repropose,
                ActionKind::Attest
            ]
        );
        match &actions[2] {
            Action::Disconnect { peer, reason } => {
                assert_eq!(*peer, ValidatorId(1));
                assert_eq!(
                    *reason,
                    DisconnectReason::Equivocation {
                        sender: ValidatorId(1),
                        position: next,
                    }
                );
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(logs_contain("Equivocating vote in bundle"));
        assert_eq!(player.starting_value(), value(b"b"));
    }

    #[test]
    fn test_late_verification_results_are_stale_after_period_change() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let proposal = fixtures::make_proposal_for(&committee, Round(1), Period(0), b"slow");
        let soft = Position::new(1, 0, 1);
        let vote = fixtures::make_signed_vote(&committee, 1, soft, proposal.value());
        let bundle = fixtures::make_signed_bundle(&committee, &[1, 2, 3], soft, proposal.value());
        let sender = ValidatorId(1);

        // Verifications requested in period 0 ...
        let requested = [
            ProtocolEvent::VoteReceived {
                vote: vote.clone(),
                sender,
            },
            ProtocolEvent::BundleReceived {
                bundle: bundle.clone(),
                sender,
            },
            ProtocolEvent::ProposalReceived {
                proposal: proposal.clone(),
                sender: proposal.proposer,
            },
        ];
        let expected = [
            ActionKind::VerifyVote,
            ActionKind::VerifyBundle,
            ActionKind::VerifyPayload,
        ];
        for (event, kind) in requested.into_iter().zip(expected) {
            assert_eq!(kinds(&handle(&mut player, event)), vec![kind]);
        }

        // ... then a bottom next quorum moves the player to period 1.
        let next = fixtures::make_signed_bundle(
            &committee,
            &[1, 2, 3],
            Position::new(1, 0, 3),
            Value::Bottom,
        );
        deliver_bundle(&mut player, next);
        assert_eq!(player.position().period, Period(1));
        let before = player.checkpoint();

        let late = [
            ProtocolEvent::VoteVerified {
                vote,
                sender,
                valid: true,
            },
            ProtocolEvent::BundleVerified {
                bundle,
                sender,
                valid: true,
            },
            ProtocolEvent::PayloadVerified {
                sender: proposal.proposer,
                proposal,
                valid: true,
            },
        ];
        for event in late {
            let actions = handle(&mut player, event);
            assert!(
                matches!(
                    actions.as_slice(),
                    [Action::Ignore {
                        reason: IgnoreReason::Stale
                    }]
                ),
                "late result produced {actions:?}"
            );
        }
        assert_eq!(player.checkpoint(), before);
        assert!(player.staged().is_none());
    }

    #[test]
    fn test_conflicting_certificate_is_fatal() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        handle(&mut player, ProtocolEvent::Start);

        let first = fixtures::make_signed_bundle(
            &committee,
            &[1, 2, 3],
            Position::new(1, 0, 2),
            value(b"a"),
        );
        deliver_bundle(&mut player, first);
        assert!(player.state().is_decided());

        let conflicting = fixtures::make_signed_bundle(
            &committee,
            &[1, 2, 3],
            Position::new(1, 1, 2),
            value(b"b"),
        );
        let result = player.handle(ProtocolEvent::BundleVerified {
            bundle: conflicting,
            sender: ValidatorId(1),
            valid: true,
        });
        assert!(matches!(
            result,
            Err(FatalError::ConflictingCertificate { round: Round(1), .. })
        ));
    }

    #[test]
    fn test_restored_player_does_not_revote() {
        let committee = TestCommittee::new(4, 1);
        let mut player = player(&committee, 0, 1);
        soft_vote_proposal(&mut player, &committee);

        let checkpoint = player.checkpoint();
        assert!(checkpoint.own_votes.contains(&(Period(0), Step::SOFT)));

        let mut restored =
            Player::from_checkpoint(config(), committee.sortition(0), checkpoint).unwrap();
        let actions = handle(&mut restored, ProtocolEvent::Start);
        assert!(attested(&actions).is_empty());
        assert_eq!(restored.position(), Position::new(1, 0, 0));
    }

    #[test]
    fn test_corrupt_checkpoint_is_fatal() {
        let committee = TestCommittee::new(4, 1);
        let mut checkpoint = AgreementCheckpoint::at_round_start(Position::new(2, 0, 0));
        checkpoint.state = PlayerState::AwaitingCertVotes;

        let result = Player::from_checkpoint(config(), committee.sortition(0), checkpoint);
        assert!(matches!(result, Err(FatalError::CorruptCheckpoint(_))));
    }
}
