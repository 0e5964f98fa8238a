//! Timer scheduling abstraction.
//!
//! The state machine attaches a [`Deadline`](crate::Deadline) to each
//! checkpoint; the node loop arms a timer for it. This trait abstracts the
//! runtime side:
//! - Simulation: inserts into a deterministic event queue
//! - Tests: record the calls

use std::time::Duration;

/// Timer identification for scheduled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Deadline of the player's current step. Setting it again replaces the
    /// previous one.
    StepDeadline,
}

/// Abstraction for scheduling and cancelling timers.
pub trait TimerScheduler {
    fn set_timer(&mut self, id: TimerId, duration: Duration);
    fn cancel_timer(&mut self, id: TimerId);
}
