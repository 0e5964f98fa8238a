//! Round/period/step clock.
//!
//! The clock only records the current position and answers deadline queries.
//! Every transition is commanded by the player; none of the `advance_*`
//! methods ever move backwards.

use crate::TimeoutConfig;
use concord_core::Deadline;
use concord_types::{Period, Position, Round, Step, StepKind};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Clock {
    position: Position,
    timeouts: TimeoutConfig,
}

impl Clock {
    pub fn new(position: Position, timeouts: TimeoutConfig) -> Self {
        Self { position, timeouts }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn round(&self) -> Round {
        self.position.round
    }

    pub fn period(&self) -> Period {
        self.position.period
    }

    pub fn step(&self) -> Step {
        self.position.step
    }

    /// Move to a later step of the current period.
    pub fn advance_step(&mut self, step: Step) -> bool {
        if step <= self.position.step {
            return false;
        }
        self.position.step = step;
        true
    }

    /// Start the next period at the propose step.
    pub fn advance_period(&mut self) -> Period {
        let next = self.position.period.next();
        self.advance_period_to(next);
        next
    }

    /// Fast-forward to the start of `period`.
    pub fn advance_period_to(&mut self, period: Period) -> bool {
        if period <= self.position.period {
            return false;
        }
        self.position.period = period;
        self.position.step = Step::PROPOSE;
        true
    }

    /// Start `round` at period 0, step 0.
    pub fn advance_round(&mut self, round: Round) -> bool {
        if round <= self.position.round {
            return false;
        }
        self.position = Position::round_start(round);
        true
    }

    /// Deadline of `step` in the current period.
    pub fn timeout_for(&self, step: Step) -> Duration {
        let base = match step.kind() {
            StepKind::Propose => return self.timeouts.filter_timeout(),
            StepKind::Soft | StepKind::Cert => self.timeouts.deadline_timeout(),
            StepKind::Next => self.timeouts.next_vote_interval(),
        };
        let exponent = self
            .position
            .period
            .0
            .min(self.timeouts.max_backoff_exponent as u64) as u32;
        base.saturating_mul(1u32 << exponent.min(31))
            .min(self.timeouts.max_timeout)
    }

    pub fn deadline(&self) -> Deadline {
        Deadline {
            position: self.position,
            after: self.timeout_for(self.position.step),
        }
    }
}
