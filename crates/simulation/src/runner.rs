//! Deterministic simulation runner.
//!
//! Every validator is a real [`NodeLoop`] with its own [`MemoryStore`],
//! [`LocalLedger`] and inline [`SyncDispatch`]. The runner owns logical time:
//! it pops the earliest event, hands it to the node, then moves whatever the
//! node queued on its input channel and its outbox back onto the event queue.

use crate::event_queue::{EventKey, EventQueue};
use crate::network::{DropReason, NetworkConfig, Outbound, SimTransport, SimulatedNetwork};
use crate::NodeIndex;
use concord_agreement::{AgreementConfig, Thresholds};
use concord_core::{NodeInput, TimerId, TimerScheduler};
use concord_dispatch_sync::SyncDispatch;
use concord_node::{LocalLedger, NodeConfig, NodeError, NodeLoop};
use concord_storage::AgreementStore;
use concord_storage_memory::MemoryStore;
use concord_types::{
    Round, SecretKey, Sortition, StaticSortition, Tag, ValidatorId, ValidatorInfo, ValidatorSet,
    Value,
};
use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A simulated validator.
pub type SimNode = NodeLoop<Arc<MemoryStore>, SimTransport, SyncDispatch, LocalLedger<Arc<MemoryStore>>>;

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationStats {
    pub events_processed: u64,
    /// Indexed by `EventPriority as usize`.
    pub events_by_priority: [u64; 3],
    /// Copies scheduled for delivery.
    pub messages_sent: u64,
    pub messages_dropped_partition: u64,
    pub messages_dropped_loss: u64,
    pub messages_dropped_disconnect: u64,
    /// Events discarded because their node was down.
    pub events_dropped_crashed: u64,
    pub timers_set: u64,
    pub timers_cancelled: u64,
    pub disconnects: u64,
    /// Nodes that stopped on a [`NodeError`].
    pub node_halts: u64,
}

impl SimulationStats {
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_dropped_loss + self.messages_dropped_disconnect
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Partition => self.messages_dropped_partition += 1,
            DropReason::PacketLoss | DropReason::Targeted => self.messages_dropped_loss += 1,
            DropReason::Disconnected => self.messages_dropped_disconnect += 1,
        }
    }
}

/// Per-node state that survives a crash.
struct NodeSlot {
    key: SecretKey,
    sortition: Arc<StaticSortition>,
    store: Arc<MemoryStore>,
    /// `None` while crashed.
    node: Option<SimNode>,
    transport: SimTransport,
    inputs: Receiver<NodeInput>,
    timers: HashMap<TimerId, EventKey>,
}

/// [`TimerScheduler`] over the shared event queue, bound to one node.
struct SimTimers<'a> {
    queue: &'a mut EventQueue,
    armed: &'a mut HashMap<TimerId, EventKey>,
    stats: &'a mut SimulationStats,
    node: NodeIndex,
    now: Duration,
}

impl TimerScheduler for SimTimers<'_> {
    fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);
        let key = self
            .queue
            .schedule(self.node, self.now + duration, NodeInput::TimerFired(id));
        self.armed.insert(id, key);
        self.stats.timers_set += 1;
    }

    fn cancel_timer(&mut self, id: TimerId) {
        if let Some(key) = self.armed.remove(&id) {
            if self.queue.cancel(&key) {
                self.stats.timers_cancelled += 1;
            }
        }
    }
}

/// Deterministic simulation runner.
///
/// Given the same configuration and seed, every run processes the same events
/// in the same order and reaches the same decisions.
pub struct SimulationRunner {
    slots: Vec<NodeSlot>,
    queue: EventQueue,
    now: Duration,
    network: SimulatedNetwork,
    rng: ChaCha8Rng,
    node_config: NodeConfig,
    stats: SimulationStats,
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("nodes", &self.slots.len())
            .field("now", &self.now)
            .field("pending_events", &self.queue.len())
            .field("network", &self.network)
            .finish()
    }
}

impl SimulationRunner {
    /// Node configuration sized for simulation: two-thirds quorums and
    /// sub-second step deadlines.
    pub fn default_node_config() -> NodeConfig {
        NodeConfig::default().with_agreement(
            AgreementConfig::default()
                .with_thresholds(Thresholds::two_thirds())
                .with_small_lambda(Duration::from_millis(100))
                .with_big_lambda(Duration::from_millis(500)),
        )
    }

    /// Build every node and queue its startup inputs at time zero.
    pub fn new(
        network_config: NetworkConfig,
        node_config: NodeConfig,
        seed: u64,
    ) -> Result<Self, NodeError> {
        node_config.validate()?;
        let num_nodes = network_config.num_validators as usize;

        let keys: Vec<SecretKey> = (0..num_nodes).map(|i| validator_key(seed, i)).collect();
        let validator_set = ValidatorSet::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| ValidatorInfo {
                    validator_id: ValidatorId(i as u64),
                    public_key: key.public_key(),
                    voting_power: 1,
                })
                .collect(),
        );

        let slots = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| {
                let (_, inputs) = crossbeam_channel::unbounded();
                NodeSlot {
                    key,
                    sortition: Arc::new(StaticSortition::new(
                        ValidatorId(i as u64),
                        validator_set.clone(),
                    )),
                    store: Arc::new(MemoryStore::new()),
                    node: None,
                    transport: SimTransport::new(),
                    inputs,
                    timers: HashMap::new(),
                }
            })
            .collect();

        let mut runner = Self {
            slots,
            queue: EventQueue::new(),
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network_config),
            rng: ChaCha8Rng::seed_from_u64(seed),
            node_config,
            stats: SimulationStats::default(),
        };
        for node in 0..num_nodes as NodeIndex {
            runner.start_node(node)?;
        }

        info!(num_nodes, seed, "Created simulation runner");
        Ok(runner)
    }

    // ─── Accessors ───

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn num_nodes(&self) -> usize {
        self.slots.len()
    }

    /// The running node at `index`, or `None` if it is crashed or unknown.
    pub fn node(&self, index: NodeIndex) -> Option<&SimNode> {
        self.slots.get(index as usize)?.node.as_ref()
    }

    pub fn is_running(&self, index: NodeIndex) -> bool {
        self.node(index).is_some()
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Mutable access for partitions and packet loss.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    // ─── Decisions ───

    /// Highest round `node` has recorded, read from its store. Survives
    /// crashes.
    pub fn latest_decided_round(&self, node: NodeIndex) -> Round {
        self.slots
            .get(node as usize)
            .and_then(|slot| slot.store.latest_decided_round().ok().flatten())
            .unwrap_or_default()
    }

    pub fn decided_value(&self, node: NodeIndex, round: Round) -> Option<Value> {
        let slot = self.slots.get(node as usize)?;
        let decision = slot.store.get_decision(round).ok().flatten()?;
        Some(decision.value())
    }

    /// Lowest latest-decided round across all nodes.
    pub fn min_decided_round(&self) -> Round {
        (0..self.slots.len() as NodeIndex)
            .map(|node| self.latest_decided_round(node))
            .min()
            .unwrap_or_default()
    }

    /// First round where two nodes recorded different values.
    pub fn first_disagreement(&self) -> Option<Round> {
        let highest = (0..self.slots.len() as NodeIndex)
            .map(|node| self.latest_decided_round(node))
            .max()
            .unwrap_or_default();
        (1..=highest.0).map(Round).find(|&round| {
            let mut values = (0..self.slots.len() as NodeIndex)
                .filter_map(|node| self.decided_value(node, round));
            match values.next() {
                Some(first) => values.any(|value| value != first),
                None => false,
            }
        })
    }

    // ─── Fault injection ───

    /// Stop `node`. Its store is kept; everything queued for it is dropped.
    pub fn crash_node(&mut self, node: NodeIndex) {
        let Some(slot) = self.slots.get_mut(node as usize) else {
            return;
        };
        if slot.node.take().is_none() {
            return;
        }
        slot.timers.clear();
        slot.transport.take();
        while slot.inputs.try_recv().is_ok() {}
        let dropped = self.queue.drop_node(node);
        self.stats.events_dropped_crashed += dropped as u64;
        info!(node, dropped, time = ?self.now, "Crashed node");
    }

    /// Bring `node` back, recovering from its own store.
    pub fn restart_node(&mut self, node: NodeIndex) -> Result<(), NodeError> {
        if self.is_running(node) {
            return Ok(());
        }
        self.start_node(node)?;
        info!(
            node,
            time = ?self.now,
            ledger_round = self.latest_decided_round(node).0,
            "Restarted node"
        );
        Ok(())
    }

    fn start_node(&mut self, node: NodeIndex) -> Result<(), NodeError> {
        let (sender, inputs): (Sender<NodeInput>, Receiver<NodeInput>) =
            crossbeam_channel::unbounded();
        let Some(slot) = self.slots.get_mut(node as usize) else {
            return Ok(());
        };
        let ledger = LocalLedger::open(
            slot.sortition.local_validator_id(),
            slot.key.clone(),
            Arc::clone(&slot.store),
        )?;
        let transport = SimTransport::new();
        let sortition: Arc<dyn Sortition> = Arc::clone(&slot.sortition) as Arc<dyn Sortition>;
        let loop_ = NodeLoop::recover(
            self.node_config.clone(),
            sortition,
            Arc::clone(&slot.store),
            transport.clone(),
            SyncDispatch::new(),
            ledger,
            sender,
        )?;
        slot.node = Some(loop_);
        slot.transport = transport;
        slot.inputs = inputs;
        slot.timers.clear();
        self.collect_outputs(node);
        Ok(())
    }

    // ─── Running ───

    /// Process every event up to `end_time`, then advance the clock to it.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(end_time_secs = end_time.as_secs_f64(), "Running simulation step");

        while let Some((key, input)) = self.queue.pop_until(end_time) {
            self.now = key.time;
            self.stats.events_processed += 1;
            self.stats.events_by_priority[key.priority as usize] += 1;
            self.process_event(key, input);
        }

        if self.now < end_time {
            self.now = end_time;
        }
    }

    /// Run in `step` increments until every running node has decided
    /// `round`, or `deadline` passes. Returns whether the round was reached.
    pub fn run_until_decided(&mut self, round: Round, step: Duration, deadline: Duration) -> bool {
        loop {
            let reached = (0..self.slots.len() as NodeIndex)
                .filter(|&node| self.is_running(node))
                .all(|node| self.latest_decided_round(node) >= round);
            if reached {
                return true;
            }
            if self.now >= deadline {
                return false;
            }
            let next = (self.now + step).min(deadline);
            self.run_until(next);
        }
    }

    fn process_event(&mut self, key: EventKey, input: NodeInput) {
        let node = key.node;
        let Self {
            slots,
            queue,
            stats,
            now,
            ..
        } = self;
        let Some(slot) = slots.get_mut(node as usize) else {
            return;
        };
        let Some(node_loop) = slot.node.as_mut() else {
            stats.events_dropped_crashed += 1;
            return;
        };
        if node_loop.is_halted() {
            return;
        }
        if let NodeInput::TimerFired(id) = &input {
            slot.timers.remove(id);
        }

        let mut timers = SimTimers {
            queue,
            armed: &mut slot.timers,
            stats,
            node,
            now: *now,
        };
        if let Err(e) = node_loop.handle(input, &mut timers) {
            warn!(node, error = %e, time = ?*now, "Simulated node halted");
            stats.node_halts += 1;
        }

        self.collect_outputs(node);
    }

    /// Move a node's follow-up inputs and outbound frames onto the queue.
    fn collect_outputs(&mut self, node: NodeIndex) {
        let Some(slot) = self.slots.get(node as usize) else {
            return;
        };
        let followups: Vec<NodeInput> = slot.inputs.try_iter().collect();
        let outbound = slot.transport.take();

        for input in followups {
            self.queue.schedule(node, self.now, input);
        }
        for frame in outbound {
            self.route(node, frame);
        }
    }

    fn route(&mut self, from: NodeIndex, frame: Outbound) {
        let sender = ValidatorId(from as u64);
        match frame {
            Outbound::Broadcast { tag, bytes } => {
                let targets: Vec<NodeIndex> =
                    self.network.all_nodes().filter(|&to| to != from).collect();
                self.deliver(from, sender, &targets, tag, bytes);
            }
            Outbound::Relay { source, tag, bytes } => {
                let targets: Vec<NodeIndex> = self
                    .network
                    .all_nodes()
                    .filter(|&to| to != from && to as u64 != source.0)
                    .collect();
                self.deliver(from, sender, &targets, tag, bytes);
            }
            Outbound::SendTo { peer, tag, bytes } => {
                let Ok(to) = NodeIndex::try_from(peer.0) else {
                    return;
                };
                if (to as usize) < self.slots.len() && to != from {
                    self.deliver(from, sender, &[to], tag, bytes);
                }
            }
            Outbound::Disconnect { peer } => {
                if let Ok(to) = NodeIndex::try_from(peer.0) {
                    debug!(from, to, "Link dropped");
                    self.network.disconnect(from, to);
                    self.stats.disconnects += 1;
                }
            }
        }
    }

    fn deliver(
        &mut self,
        from: NodeIndex,
        sender: ValidatorId,
        targets: &[NodeIndex],
        tag: Tag,
        bytes: Vec<u8>,
    ) {
        for &to in targets {
            match self.network.route_tagged(from, to, tag, &mut self.rng) {
                Ok(latency) => {
                    let input = NodeInput::MessageReceived {
                        sender,
                        bytes: bytes.clone(),
                    };
                    self.queue.schedule(to, self.now + latency, input);
                    self.stats.messages_sent += 1;
                }
                Err(reason) => self.stats.record_drop(reason),
            }
        }
    }
}

/// Deterministic per-validator key.
fn validator_key(seed: u64, index: usize) -> SecretKey {
    let mut seed_bytes = [0u8; 16];
    let key_seed = seed.wrapping_add(index as u64).wrapping_mul(0x517cc1b727220a95);
    seed_bytes[..8].copy_from_slice(&key_seed.to_le_bytes());
    seed_bytes[8..].copy_from_slice(&(index as u64).to_le_bytes());
    SecretKey::from_seed(&seed_bytes)
}
