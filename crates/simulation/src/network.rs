//! Simulated network with deterministic latency, packet loss, partitions
//! and per-link disconnects.
//!
//! Nodes never talk to each other directly. Each node gets a [`SimTransport`]
//! that records what the node loop sends; after every event the runner
//! drains that outbox and asks [`SimulatedNetwork::route`] whether and when
//! each copy arrives.

use crate::NodeIndex;
use concord_network::Transport;
use concord_types::{Tag, ValidatorId};
use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Configuration for the simulated network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Number of validators, each with unit stake.
    pub num_validators: u32,
    /// Base one-way latency.
    pub latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Messages are dropped with this probability.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_validators: 4,
            latency: Duration::from_millis(50),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
        }
    }
}

/// One frame a node loop handed to its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Broadcast {
        tag: Tag,
        bytes: Vec<u8>,
    },
    Relay {
        source: ValidatorId,
        tag: Tag,
        bytes: Vec<u8>,
    },
    SendTo {
        peer: ValidatorId,
        tag: Tag,
        bytes: Vec<u8>,
    },
    Disconnect {
        peer: ValidatorId,
    },
}

/// [`Transport`] that buffers frames for the runner to route.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    outbox: Arc<Mutex<Vec<Outbound>>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything sent since the last call, in send order.
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.outbox.lock())
    }

    fn push(&self, outbound: Outbound) {
        self.outbox.lock().push(outbound);
    }
}

impl Transport for SimTransport {
    fn broadcast(&self, tag: Tag, bytes: Vec<u8>) {
        self.push(Outbound::Broadcast { tag, bytes });
    }

    fn send_to(&self, peer: ValidatorId, tag: Tag, bytes: Vec<u8>) {
        self.push(Outbound::SendTo { peer, tag, bytes });
    }

    fn disconnect(&self, peer: ValidatorId) {
        self.push(Outbound::Disconnect { peer });
    }

    fn relay(&self, source: ValidatorId, tag: Tag, bytes: Vec<u8>) {
        self.push(Outbound::Relay { source, tag, bytes });
    }
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Partition,
    Disconnected,
    PacketLoss,
    /// Consumed by [`SimulatedNetwork::drop_next`].
    Targeted,
}

/// Link state between simulated nodes.
///
/// Partitions are directional: add both `(a, b)` and `(b, a)` for a
/// bidirectional split. Disconnects are the result of a node dropping a
/// misbehaving peer and always cut both directions.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    partitions: HashSet<(NodeIndex, NodeIndex)>,
    disconnects: HashSet<(NodeIndex, NodeIndex)>,
    /// Remaining frames to drop, per tag.
    targeted_drops: HashMap<Tag, u32>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            partitions: HashSet::new(),
            disconnects: HashSet::new(),
            targeted_drops: HashMap::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = NodeIndex> {
        0..self.config.num_validators
    }

    pub fn total_nodes(&self) -> usize {
        self.config.num_validators as usize
    }

    // ─── Partitions ───

    pub fn is_partitioned(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.partitions.contains(&(from, to))
    }

    pub fn partition_unidirectional(&mut self, from: NodeIndex, to: NodeIndex) {
        self.partitions.insert((from, to));
    }

    /// Drop all traffic between `group_a` and `group_b`, both directions.
    pub fn partition_groups(&mut self, group_a: &[NodeIndex], group_b: &[NodeIndex]) {
        for &a in group_a {
            for &b in group_b {
                self.partitions.insert((a, b));
                self.partitions.insert((b, a));
            }
        }
    }

    /// Cut `node` off from every other node.
    pub fn isolate_node(&mut self, node: NodeIndex) {
        for other in self.all_nodes().filter(|&other| other != node) {
            self.partitions.insert((node, other));
            self.partitions.insert((other, node));
        }
    }

    /// Restore full connectivity. Disconnects stay in place.
    pub fn heal_all(&mut self) {
        self.partitions.clear();
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    // ─── Disconnects ───

    /// Record that `node` dropped its link to `peer`.
    pub fn disconnect(&mut self, node: NodeIndex, peer: NodeIndex) {
        self.disconnects.insert((node.min(peer), node.max(peer)));
    }

    pub fn is_disconnected(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.disconnects.contains(&(a.min(b), a.max(b)))
    }

    /// Links dropped so far, as `(lower, higher)` node pairs.
    pub fn disconnected_pairs(&self) -> Vec<(NodeIndex, NodeIndex)> {
        let mut pairs: Vec<_> = self.disconnects.iter().copied().collect();
        pairs.sort_unstable();
        pairs
    }

    // ─── Packet loss ───

    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    pub fn packet_loss_rate(&self) -> f64 {
        self.config.packet_loss_rate
    }

    // ─── Targeted drops ───

    /// Drop the next `count` copies of frames tagged `tag`, on any link.
    pub fn drop_next(&mut self, tag: Tag, count: u32) {
        *self.targeted_drops.entry(tag).or_default() += count;
    }

    pub fn pending_targeted_drops(&self, tag: Tag) -> u32 {
        self.targeted_drops.get(&tag).copied().unwrap_or(0)
    }

    // ─── Delivery ───

    /// Like [`route`](Self::route), but first consumes a targeted drop for
    /// `tag` if one is pending.
    pub fn route_tagged(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        tag: Tag,
        rng: &mut ChaCha8Rng,
    ) -> Result<Duration, DropReason> {
        if let Some(remaining) = self.targeted_drops.get_mut(&tag) {
            if *remaining > 0 {
                *remaining -= 1;
                trace!(from, to, ?tag, "Message dropped: targeted");
                return Err(DropReason::Targeted);
            }
        }
        self.route(from, to, rng)
    }

    /// Decide whether a message from `from` reaches `to`, and after how long.
    ///
    /// Partition and disconnect checks come first and consume no randomness.
    pub fn route(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        rng: &mut ChaCha8Rng,
    ) -> Result<Duration, DropReason> {
        if self.is_partitioned(from, to) {
            trace!(from, to, "Message dropped: partition");
            return Err(DropReason::Partition);
        }
        if self.is_disconnected(from, to) {
            trace!(from, to, "Message dropped: disconnected");
            return Err(DropReason::Disconnected);
        }
        let loss = self.config.packet_loss_rate;
        if loss > 0.0 && rng.gen::<f64>() < loss {
            trace!(from, to, "Message dropped: packet loss");
            return Err(DropReason::PacketLoss);
        }
        Ok(self.sample_latency(rng))
    }

    fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency.as_secs_f64();
        let jitter_range = base * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter).max(0.001))
    }
}
