//! Protocol position counters and participant identifiers.

use sbor::prelude::*;
use std::fmt;

/// Ledger position under decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Round(pub u64);

impl Round {
    /// The round following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Attempt counter within a round. Restarts at zero each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Period(pub u64);

impl Period {
    /// The period following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Sub-phase within a period.
///
/// Steps 0, 1 and 2 are the propose, soft-vote and cert-vote steps. Every
/// step from 3 upwards is a next-vote step; repeated timeouts escalate
/// through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Step(pub u64);

impl Step {
    pub const PROPOSE: Step = Step(0);
    pub const SOFT: Step = Step(1);
    pub const CERT: Step = Step(2);
    pub const NEXT: Step = Step(3);

    /// Classify this step.
    pub fn kind(self) -> StepKind {
        match self.0 {
            0 => StepKind::Propose,
            1 => StepKind::Soft,
            2 => StepKind::Cert,
            _ => StepKind::Next,
        }
    }

    /// The step following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Quorum semantics of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    Propose,
    Soft,
    Cert,
    Next,
}

/// Full `(round, period, step)` position. Ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
pub struct Position {
    pub round: Round,
    pub period: Period,
    pub step: Step,
}

impl Position {
    pub fn new(round: u64, period: u64, step: u64) -> Self {
        Self {
            round: Round(round),
            period: Period(period),
            step: Step(step),
        }
    }

    /// First position of a round.
    pub fn round_start(round: Round) -> Self {
        Self {
            round,
            period: Period(0),
            step: Step::PROPOSE,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.round.0, self.period.0, self.step.0)
    }
}

/// Identity of a committee member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct ValidatorId(pub u64);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kinds() {
        assert_eq!(Step::PROPOSE.kind(), StepKind::Propose);
        assert_eq!(Step::SOFT.kind(), StepKind::Soft);
        assert_eq!(Step::CERT.kind(), StepKind::Cert);
        assert_eq!(Step::NEXT.kind(), StepKind::Next);
        assert_eq!(Step(250).kind(), StepKind::Next);
    }

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(5, 2, 3) < Position::new(5, 3, 0));
        assert!(Position::new(5, 3, 0) < Position::new(6, 0, 0));
        assert_eq!(Position::new(10, 0, 2).to_string(), "(10, 0, 2)");
    }
}
