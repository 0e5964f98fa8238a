//! Agreement configuration.

use concord_types::StepKind;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{step:?} threshold {numerator}/{denominator} is not a fraction in (0, 1]")]
    InvalidFraction {
        step: StepKind,
        numerator: u64,
        denominator: u64,
    },

    #[error("{step:?} threshold must exceed two thirds of committee weight")]
    BelowTwoThirds { step: StepKind },

    #[error("small lambda must be non-zero")]
    ZeroLambda,

    #[error("max timeout {max:?} below the base deadline {deadline:?}")]
    MaxTimeoutTooSmall { max: Duration, deadline: Duration },
}

/// Fraction of committee weight a step's quorum must reach.
///
/// With `strict` set the threshold is `floor(w * n / d) + 1` (strictly more
/// than the fraction); otherwise it is `ceil(w * n / d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumFraction {
    pub numerator: u64,
    pub denominator: u64,
    pub strict: bool,
}

impl QuorumFraction {
    pub const fn at_least(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
            strict: false,
        }
    }

    pub const fn more_than(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
            strict: true,
        }
    }

    /// Absolute weight needed out of `committee_weight`.
    pub fn threshold(&self, committee_weight: u64) -> u64 {
        if self.denominator == 0 {
            return u64::MAX;
        }
        let scaled = committee_weight as u128 * self.numerator as u128;
        let denominator = self.denominator as u128;
        let threshold = if self.strict {
            scaled / denominator + 1
        } else {
            scaled.div_ceil(denominator)
        };
        u64::try_from(threshold.max(1)).unwrap_or(u64::MAX)
    }

    fn validate(&self, step: StepKind) -> Result<(), ConfigError> {
        if self.denominator == 0 || self.numerator == 0 || self.numerator > self.denominator {
            return Err(ConfigError::InvalidFraction {
                step,
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        let (n3, d2) = (
            self.numerator as u128 * 3,
            self.denominator as u128 * 2,
        );
        let above_two_thirds = if self.strict { n3 >= d2 } else { n3 > d2 };
        if !above_two_thirds {
            return Err(ConfigError::BelowTwoThirds { step });
        }
        Ok(())
    }
}

/// Quorum fractions per step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub soft: QuorumFraction,
    pub cert: QuorumFraction,
    pub next: QuorumFraction,
}

impl Thresholds {
    /// Algorand's committee parameters: soft 2267/2990, cert 1112/1500,
    /// next 3838/5000.
    pub const fn algorand() -> Self {
        Self {
            soft: QuorumFraction::at_least(2267, 2990),
            cert: QuorumFraction::at_least(1112, 1500),
            next: QuorumFraction::at_least(3838, 5000),
        }
    }

    /// Strictly more than two thirds for every step. Suited to small
    /// committees where the Algorand fractions round up to unanimity.
    pub const fn two_thirds() -> Self {
        let fraction = QuorumFraction::more_than(2, 3);
        Self {
            soft: fraction,
            cert: fraction,
            next: fraction,
        }
    }

    pub fn for_kind(&self, kind: StepKind) -> Option<QuorumFraction> {
        match kind {
            StepKind::Propose => None,
            StepKind::Soft => Some(self.soft),
            StepKind::Cert => Some(self.cert),
            StepKind::Next => Some(self.next),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::algorand()
    }
}

/// Step deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Bound on the delay of a small message such as a vote.
    pub small_lambda: Duration,

    /// Bound on the delay of a full proposal.
    pub big_lambda: Duration,

    /// Backoff doubles per period up to `2^max_backoff_exponent`.
    pub max_backoff_exponent: u32,

    /// Upper bound on any step deadline.
    pub max_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            small_lambda: Duration::from_secs(2),
            big_lambda: Duration::from_secs(15),
            max_backoff_exponent: 6,
            max_timeout: Duration::from_secs(600),
        }
    }
}

impl TimeoutConfig {
    /// How long the propose step waits for proposals.
    pub fn filter_timeout(&self) -> Duration {
        self.small_lambda * 2
    }

    /// Base deadline of the soft and cert steps.
    pub fn deadline_timeout(&self) -> Duration {
        self.big_lambda + self.small_lambda
    }

    /// Base interval between next-vote steps.
    pub fn next_vote_interval(&self) -> Duration {
        self.small_lambda * 2
    }
}

/// Agreement configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgreementConfig {
    pub thresholds: Thresholds,
    pub timeouts: TimeoutConfig,
}

impl AgreementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_small_lambda(mut self, lambda: Duration) -> Self {
        self.timeouts.small_lambda = lambda;
        self
    }

    pub fn with_big_lambda(mut self, lambda: Duration) -> Self {
        self.timeouts.big_lambda = lambda;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.soft.validate(StepKind::Soft)?;
        self.thresholds.cert.validate(StepKind::Cert)?;
        self.thresholds.next.validate(StepKind::Next)?;

        let timeouts = &self.timeouts;
        if timeouts.small_lambda.is_zero() {
            return Err(ConfigError::ZeroLambda);
        }
        if timeouts.max_timeout < timeouts.deadline_timeout() {
            return Err(ConfigError::MaxTimeoutTooSmall {
                max: timeouts.max_timeout,
                deadline: timeouts.deadline_timeout(),
            });
        }
        Ok(())
    }
}
