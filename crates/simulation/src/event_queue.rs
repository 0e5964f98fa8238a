//! Event queue with deterministic ordering.

use crate::NodeIndex;
use concord_core::{EventPriority, NodeInput};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Fields are compared in declaration order: time, then priority (internal
/// before timer before network), then node index, then sequence number for
/// FIFO among otherwise equal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub node: NodeIndex,
    pub sequence: u64,
}

/// Pending inputs for every node, keyed by [`EventKey`].
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, NodeInput>,
    sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `input` for `node` at `time`. The returned key cancels it.
    pub fn schedule(&mut self, node: NodeIndex, time: Duration, input: NodeInput) -> EventKey {
        self.sequence += 1;
        let key = EventKey {
            time,
            priority: input.priority(),
            node,
            sequence: self.sequence,
        };
        self.events.insert(key, input);
        key
    }

    pub fn cancel(&mut self, key: &EventKey) -> bool {
        self.events.remove(key).is_some()
    }

    /// Pop the earliest event at or before `end`.
    pub fn pop_until(&mut self, end: Duration) -> Option<(EventKey, NodeInput)> {
        match self.events.first_key_value() {
            Some((key, _)) if key.time <= end => self.events.pop_first(),
            _ => None,
        }
    }

    /// Drop every pending event for `node`. Returns how many were removed.
    pub fn drop_node(&mut self, node: NodeIndex) -> usize {
        let before = self.events.len();
        self.events.retain(|key, _| key.node != node);
        before - self.events.len()
    }

    pub fn next_time(&self) -> Option<Duration> {
        self.events.first_key_value().map(|(key, _)| key.time)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
