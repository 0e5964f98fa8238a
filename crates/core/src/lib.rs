//! Core types for the Concord agreement core.
//!
//! - [`NodeInput`]: All possible inputs to the node loop
//! - [`ProtocolEvent`]: Events processed by the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`]: The trait the agreement player implements
//!
//! # Architecture
//!
//! ```text
//! NodeInput → NodeLoop (decodes wire bytes, fires timers) → ProtocolEvent → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner (simulation or node) which executes the
//! returned actions in order and converts their results back into
//! `NodeInput`s.

mod action;
mod error;
mod input;
mod message;
mod protocol_event;
mod timer;
mod traits;

pub use action::{Action, ActionKind, Deadline, DisconnectReason, IgnoreReason};
pub use error::FatalError;
pub use input::{EventPriority, NodeInput};
pub use message::OutboundMessage;
pub use protocol_event::ProtocolEvent;
pub use timer::{TimerId, TimerScheduler};
pub use traits::StateMachine;
