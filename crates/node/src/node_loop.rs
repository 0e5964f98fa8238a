//! Node loop: drives the agreement player and executes its actions.
//!
//! `NodeLoop` owns the [`Player`] and routes every [`Action`] it returns to
//! the store, the transport, the dispatcher or the ledger. Follow-up inputs
//! (verification results, signed votes, assembled proposals, round advances)
//! are sent on a crossbeam channel that the runner drains back into
//! [`NodeLoop::handle`].
//!
//! # Driving modes
//!
//! - **Simulation**: the harness schedules drained inputs on its event queue
//!   and implements [`TimerScheduler`] against logical time.
//! - **Tests**: [`NodeLoop::drain`] processes the channel until it is empty.

use crate::action_handler::{self, DispatchPool, VerifyContext};
use crate::catchup::{CatchupInput, CatchupOutput, CatchupProtocol, CatchupStatus};
use crate::inbound::{inbound_registry, Inbound, InboundRegistry};
use crate::{Ledger, NodeConfig, NodeError};
use concord_agreement::{handlers, validate_bundle, Player, StepThresholds};
use concord_core::{
    Action, ActionKind, IgnoreReason, NodeInput, ProtocolEvent, StateMachine, TimerId,
    TimerScheduler,
};
use concord_dispatch::Dispatch;
use concord_messages::{
    AgreementVoteGossip, CatchupRequest, CatchupResponse, ProposalPayloadGossip, VoteBundleGossip,
};
use concord_network::{encode_message, encode_outbound, Transport};
use concord_storage::AgreementStore;
use concord_types::{
    Bundle, NetworkMessage, Position, Proposal, Round, Sortition, Step, ValidatorId,
};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

/// Counters for reports and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStats {
    actions: [u64; ActionKind::COUNT],
    /// Inbound frames that failed to decode or had no handler.
    pub malformed: u64,
    pub decisions: u64,
    pub catchup_requests_sent: u64,
    pub catchup_requests_served: u64,
    pub catchup_applied: u64,
}

impl NodeStats {
    /// Actions of `kind` the player has returned.
    pub fn actions(&self, kind: ActionKind) -> u64 {
        self.actions[kind as usize]
    }

    pub fn total_actions(&self) -> u64 {
        self.actions.iter().sum()
    }

    fn record(&mut self, kind: ActionKind) {
        self.actions[kind as usize] += 1;
    }
}

/// Drives one validator.
///
/// Generic over:
/// - `S`: durable checkpoint and decision store
/// - `T`: outbound transport
/// - `D`: verification dispatcher
/// - `L`: ledger collaborator
pub struct NodeLoop<S, T, D, L>
where
    S: AgreementStore,
    T: Transport,
    D: Dispatch,
    L: Ledger,
{
    player: Player,
    store: S,
    transport: T,
    dispatch: D,
    ledger: L,
    sortition: Arc<dyn Sortition>,
    config: NodeConfig,
    registry: InboundRegistry,
    event_sender: Sender<NodeInput>,

    /// Position the step timer is armed for.
    armed: Option<Position>,
    catchup: CatchupProtocol,
    stats: NodeStats,
    halted: bool,
}

impl<S, T, D, L> NodeLoop<S, T, D, L>
where
    S: AgreementStore,
    T: Transport,
    D: Dispatch + 'static,
    L: Ledger,
{
    /// Build a node from its durable state and queue its startup inputs.
    ///
    /// The player resumes from the stored checkpoint, or starts at the round
    /// after the ledger's latest decision. `Start` is queued first. When the
    /// ledger already holds the checkpoint's round, `RoundAdvanced` follows.
    #[allow(clippy::too_many_arguments)]
    pub fn recover(
        config: NodeConfig,
        sortition: Arc<dyn Sortition>,
        store: S,
        transport: T,
        dispatch: D,
        ledger: L,
        event_sender: Sender<NodeInput>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let latest = ledger.latest_round();

        let player = match store.load_checkpoint()? {
            Some(checkpoint) => {
                Player::from_checkpoint(config.agreement.clone(), Arc::clone(&sortition), checkpoint)?
            }
            None => Player::new(config.agreement.clone(), Arc::clone(&sortition), latest.next()),
        };
        let behind_ledger = player.round() <= latest;

        info!(
            validator = %sortition.local_validator_id(),
            position = %player.position(),
            state = ?player.state(),
            ledger_round = latest.0,
            "Recovered node"
        );

        let node = Self {
            catchup: CatchupProtocol::new(player.round())
                .with_retry_after(config.catchup_retry_after),
            player,
            store,
            transport,
            dispatch,
            ledger,
            sortition,
            config,
            registry: inbound_registry()?,
            event_sender,
            armed: None,
            stats: NodeStats::default(),
            halted: false,
        };

        node.enqueue(ProtocolEvent::Start);
        if behind_ledger {
            node.enqueue(ProtocolEvent::RoundAdvanced {
                round: latest.next(),
            });
        }
        Ok(node)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn validator_id(&self) -> ValidatorId {
        self.sortition.local_validator_id()
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn catchup_status(&self) -> CatchupStatus {
        self.catchup.status()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Position the step timer is currently armed for.
    pub fn armed_deadline(&self) -> Option<Position> {
        self.armed
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Process one input to completion.
    ///
    /// Any error halts the node: later calls return [`NodeError::Halted`].
    #[instrument(level = "debug", skip_all, fields(validator = %self.validator_id(), input = input.type_name()))]
    pub fn handle(
        &mut self,
        input: NodeInput,
        timers: &mut dyn TimerScheduler,
    ) -> Result<(), NodeError> {
        if self.halted {
            return Err(NodeError::Halted);
        }
        let result = self.process_input(input, timers);
        if let Err(e) = &result {
            error!(validator = %self.validator_id(), error = %e, "Node halted");
            self.halted = true;
        }
        result
    }

    /// Handle every input already queued on `inputs`. Returns how many were
    /// processed.
    pub fn drain(
        &mut self,
        inputs: &Receiver<NodeInput>,
        timers: &mut dyn TimerScheduler,
    ) -> Result<usize, NodeError> {
        let mut processed = 0;
        while let Ok(input) = inputs.try_recv() {
            self.handle(input, timers)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn process_input(
        &mut self,
        input: NodeInput,
        timers: &mut dyn TimerScheduler,
    ) -> Result<(), NodeError> {
        match input {
            NodeInput::Protocol(event) => self.step(event, timers),
            NodeInput::TimerFired(TimerId::StepDeadline) => match self.armed.take() {
                Some(position) => self.step(ProtocolEvent::Timeout { position }, timers),
                None => {
                    trace!("Step deadline fired while disarmed");
                    Ok(())
                }
            },
            NodeInput::MessageReceived { sender, bytes } => {
                let mut inbound = Vec::new();
                if let Err(e) = self.registry.dispatch(&mut inbound, sender, &bytes) {
                    debug!(%sender, error = %e, "Dropping malformed message");
                    self.stats.malformed += 1;
                    return Ok(());
                }
                for message in inbound {
                    self.process_inbound(message, timers)?;
                }
                Ok(())
            }
        }
    }

    fn process_inbound(
        &mut self,
        message: Inbound,
        timers: &mut dyn TimerScheduler,
    ) -> Result<(), NodeError> {
        match message {
            Inbound::Protocol(event) => self.step(event, timers),
            Inbound::CatchupRequest { sender, round } => {
                self.serve_catchup(sender, round);
                Ok(())
            }
            Inbound::CatchupResponse { sender, response } => {
                self.apply_catchup(sender, *response)
            }
        }
    }

    /// Feed one event to the player and execute its actions in order.
    fn step(&mut self, event: ProtocolEvent, timers: &mut dyn TimerScheduler) -> Result<(), NodeError> {
        let round_before = self.player.round();
        let actions = self.player.handle(event)?;
        for action in actions {
            self.stats.record(action.kind());
            self.process_action(action, timers)?;
        }

        let round = self.player.round();
        if round > round_before {
            self.process_catchup_outputs(CatchupInput::RoundAdvanced { round })?;
        }
        Ok(())
    }

    // ─── Actions ─────────────────────────────────────────────────────────

    fn process_action(
        &mut self,
        action: Action,
        timers: &mut dyn TimerScheduler,
    ) -> Result<(), NodeError> {
        match action {
            Action::Noop => {}

            Action::Ignore { reason } => match reason {
                IgnoreReason::FutureRound { round, peer } => {
                    if self.config.request_catchup {
                        self.process_catchup_outputs(CatchupInput::FutureRoundObserved {
                            round,
                            peer,
                        })?;
                    }
                }
                reason => trace!(?reason, "Input ignored"),
            },

            Action::Broadcast { message } => {
                let bytes = encode_outbound(&message)?;
                self.transport.broadcast(message.tag(), bytes);
            }

            Action::Relay { message, source } => {
                let bytes = encode_outbound(&message)?;
                self.transport.relay(source, message.tag(), bytes);
            }

            Action::BroadcastVotes { bundle } => {
                trace!(position = %bundle.position(), value = %bundle.value, "Broadcasting bundle");
                let bytes = encode_message(&VoteBundleGossip::new(bundle))?;
                self.transport.broadcast(VoteBundleGossip::TAG, bytes);
            }

            Action::Disconnect { peer, reason } => {
                warn!(validator = %self.validator_id(), %peer, ?reason, "Disconnecting peer");
                self.transport.disconnect(peer);
            }

            Action::Ensure {
                round,
                certificate,
                proposal,
            } => {
                self.ensure(round, &certificate, &proposal)?;
                self.enqueue(ProtocolEvent::RoundAdvanced {
                    round: round.next(),
                });
            }

            Action::Rezero { round, period } => {
                trace!(round = round.0, period = period.0, "Rezero");
                timers.cancel_timer(TimerId::StepDeadline);
                self.armed = None;
            }

            Action::Attest { vote } => {
                let vote = self.ledger.attest(vote);
                let bytes = encode_message(&AgreementVoteGossip::new(vote.clone()))?;
                self.transport.broadcast(AgreementVoteGossip::TAG, bytes);
                self.enqueue(ProtocolEvent::VoteAttested { vote });
            }

            Action::Assemble { round, period } => match self.ledger.assemble(round, period) {
                Some(proposal) => self.enqueue(ProtocolEvent::ProposalAssembled { proposal }),
                None => debug!(round = round.0, period = period.0, "Ledger had nothing to propose"),
            },

            Action::Repropose {
                round,
                period,
                value,
                proposal,
            } => {
                let local = self.validator_id();
                match proposal {
                    Some(proposal) if self.sortition.is_proposer(local, round, period) => {
                        debug!(round = round.0, period = period.0, %value, "Reproposing");
                        let bytes = encode_message(&ProposalPayloadGossip::new(proposal))?;
                        self.transport.broadcast(ProposalPayloadGossip::TAG, bytes);
                    }
                    _ => trace!(round = round.0, period = period.0, %value, "Not reproposing"),
                }
            }

            Action::Checkpoint {
                checkpoint,
                deadline,
            } => {
                self.store.put_checkpoint(&checkpoint)?;
                match deadline {
                    Some(deadline) => {
                        timers.set_timer(TimerId::StepDeadline, deadline.after);
                        self.armed = Some(deadline.position);
                    }
                    None => {
                        timers.cancel_timer(TimerId::StepDeadline);
                        self.armed = None;
                    }
                }
            }

            action @ (Action::VerifyVote { .. }
            | Action::VerifyBundle { .. }
            | Action::VerifyPayload { .. }) => self.dispatch_delegated_action(action),
        }
        Ok(())
    }

    fn dispatch_delegated_action(&mut self, action: Action) {
        let Some(pool) = action_handler::dispatch_pool_for(&action) else {
            return;
        };
        let ctx = VerifyContext {
            sortition: Arc::clone(&self.sortition),
            thresholds: self.config.agreement.thresholds,
        };
        let event_tx = self.event_sender.clone();

        let spawn_fn = move || {
            if let Some(event) = action_handler::handle_delegated_action(action, &ctx) {
                if event_tx.send(NodeInput::Protocol(event)).is_err() {
                    debug!("Input channel closed, dropping verification result");
                }
            }
        };

        match pool {
            DispatchPool::ConsensusCrypto => self.dispatch.spawn_consensus_crypto(spawn_fn),
            DispatchPool::Crypto => self.dispatch.spawn_crypto(spawn_fn),
        }
    }

    /// Record a decision, counting it when the ledger moves forward.
    fn ensure(
        &mut self,
        round: Round,
        certificate: &Bundle,
        proposal: &Proposal,
    ) -> Result<(), NodeError> {
        let before = self.ledger.latest_round();
        self.ledger.ensure(round, certificate, proposal)?;
        if self.ledger.latest_round() > before {
            self.stats.decisions += 1;
        }
        Ok(())
    }

    fn enqueue(&self, event: ProtocolEvent) {
        if self.event_sender.send(NodeInput::Protocol(event)).is_err() {
            debug!("Input channel closed");
        }
    }

    // ─── Catch-up ────────────────────────────────────────────────────────

    fn process_catchup_outputs(&mut self, input: CatchupInput) -> Result<(), NodeError> {
        for output in self.catchup.handle(input) {
            match output {
                CatchupOutput::Request { round, peer } => {
                    debug!(round = round.0, %peer, "Requesting catch-up");
                    let bytes = encode_message(&CatchupRequest::new(round))?;
                    self.transport.send_to(peer, CatchupRequest::TAG, bytes);
                    self.stats.catchup_requests_sent += 1;
                }
                CatchupOutput::CaughtUp { round } => {
                    debug!(round = round.0, "Catch-up complete");
                }
            }
        }
        Ok(())
    }

    fn serve_catchup(&mut self, peer: ValidatorId, round: Round) {
        if !self.config.serve_catchup {
            return;
        }
        let response = match self.ledger.decision(round) {
            Ok(Some(decision)) => {
                CatchupResponse::found(round, decision.certificate, decision.proposal)
            }
            Ok(None) => CatchupResponse::not_found(round),
            Err(e) => {
                warn!(round = round.0, %peer, error = %e, "Failed to read decision for catch-up");
                return;
            }
        };
        match encode_message(&response) {
            Ok(bytes) => {
                trace!(round = round.0, %peer, found = response.certificate.is_some(), "Serving catch-up");
                self.transport
                    .send_to(peer, CatchupRequest::TAG.complement(), bytes);
                self.stats.catchup_requests_served += 1;
            }
            Err(e) => warn!(round = round.0, error = %e, "Failed to encode catch-up response"),
        }
    }

    fn apply_catchup(&mut self, sender: ValidatorId, response: CatchupResponse) -> Result<(), NodeError> {
        let round = response.round;
        if !self.catchup.is_in_flight(round) {
            debug!(round = round.0, %sender, "Unsolicited catch-up response");
            return Ok(());
        }

        let usable = response
            .into_parts()
            .filter(|(certificate, proposal)| {
                round == self.player.round() && self.verify_catchup(round, certificate, proposal)
            });
        let Some((certificate, proposal)) = usable else {
            return self.process_catchup_outputs(CatchupInput::ResponseRejected {
                round,
                peer: sender,
            });
        };

        info!(
            validator = %self.validator_id(),
            round = round.0,
            value = %certificate.value,
            %sender,
            "Applying catch-up certificate"
        );
        self.ensure(round, &certificate, &proposal)?;
        self.stats.catchup_applied += 1;
        self.process_catchup_outputs(CatchupInput::ResponseApplied { round })?;
        self.enqueue(ProtocolEvent::RoundAdvanced {
            round: round.next(),
        });
        Ok(())
    }

    /// A catch-up certificate must be a cert-step quorum for the proposal's
    /// value, with every vote valid.
    fn verify_catchup(&self, round: Round, certificate: &Bundle, proposal: &Proposal) -> bool {
        let sortition = self.sortition.as_ref();
        if certificate.round != round
            || certificate.step != Step::CERT
            || proposal.round != round
            || certificate.value != proposal.value()
        {
            return false;
        }
        let thresholds =
            StepThresholds::compute(&self.config.agreement.thresholds, sortition, round);
        if let Err(e) = validate_bundle(certificate, sortition.committee(), &thresholds) {
            debug!(round = round.0, error = %e, "Catch-up certificate failed composition checks");
            return false;
        }
        if !handlers::verify_payload(proposal, sortition) {
            return false;
        }
        self.dispatch
            .map_crypto(&certificate.votes, |vote| handlers::verify_vote(vote, sortition))
            .into_iter()
            .all(|valid| valid)
    }
}
