//! Deterministic simulation runner.
//!
//! This crate runs a committee of Concord nodes in a single thread against
//! logical time. Given the same seed, it produces identical results every
//! run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     EventQueue (BTreeMap<EventKey, NodeInput>)     │ │
//! │  │     Ordered by: time, priority, node, sequence     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     NodeLoop per validator                         │ │
//! │  │     MemoryStore + LocalLedger + SyncDispatch       │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  input channel → queue at now                      │ │
//! │  │  SimTransport outbox → SimulatedNetwork → queue    │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod event_queue;
mod network;
mod runner;

pub use event_queue::{EventKey, EventQueue};
pub use network::{DropReason, NetworkConfig, Outbound, SimTransport, SimulatedNetwork};
pub use runner::{SimNode, SimulationRunner, SimulationStats};

/// Index of a simulated node. Node `i` runs as `ValidatorId(i)`.
pub type NodeIndex = u32;
