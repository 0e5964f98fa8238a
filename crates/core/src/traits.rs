//! Core traits for state machines.

use crate::{Action, FatalError, ProtocolEvent};

/// A state machine that processes events.
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O
pub trait StateMachine {
    /// Process a protocol event, returning actions to perform in order.
    ///
    /// Errors are fatal: the caller must stop feeding events.
    fn handle(&mut self, event: ProtocolEvent) -> Result<Vec<Action>, FatalError>;
}
