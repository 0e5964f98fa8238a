//! Simulator configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! seed = 42
//! duration_secs = 30
//!
//! [network]
//! validators = 4
//! latency_ms = 50
//!
//! [agreement]
//! thresholds = "two_thirds"
//! small_lambda_ms = 100
//!
//! [[faults]]
//! at_ms = 2000
//! action = "crash"
//! node = 3
//! ```

use anyhow::{bail, Context, Result};
use concord_agreement::{AgreementConfig, Thresholds, TimeoutConfig};
use concord_node::catchup::DEFAULT_RETRY_AFTER;
use concord_node::NodeConfig;
use concord_simulation::{NetworkConfig, NodeIndex};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Seed for keys, latency jitter and packet loss.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Logical time to simulate.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub agreement: AgreementSection,

    #[serde(default)]
    pub node: NodeSection,

    /// Scheduled fault injections, applied in `at_ms` order.
    #[serde(default)]
    pub faults: Vec<Fault>,
}

fn default_seed() -> u64 {
    42
}

fn default_duration_secs() -> u64 {
    30
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            duration_secs: default_duration_secs(),
            network: NetworkSection::default(),
            agreement: AgreementSection::default(),
            node: NodeSection::default(),
            faults: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    #[serde(default = "default_validators")]
    pub validators: u32,

    /// Base one-way latency.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,

    #[serde(default)]
    pub packet_loss_rate: f64,
}

fn default_validators() -> u32 {
    4
}

fn default_latency_ms() -> u64 {
    50
}

fn default_jitter_fraction() -> f64 {
    0.1
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            validators: default_validators(),
            latency_ms: default_latency_ms(),
            jitter_fraction: default_jitter_fraction(),
            packet_loss_rate: 0.0,
        }
    }
}

/// Named quorum fraction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPreset {
    /// Strictly more than two thirds at every step.
    #[default]
    TwoThirds,
    /// Algorand's committee fractions. Needs large committees.
    Algorand,
}

impl ThresholdPreset {
    fn thresholds(self) -> Thresholds {
        match self {
            ThresholdPreset::TwoThirds => Thresholds::two_thirds(),
            ThresholdPreset::Algorand => Thresholds::algorand(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgreementSection {
    #[serde(default)]
    pub thresholds: ThresholdPreset,

    #[serde(default = "default_small_lambda_ms")]
    pub small_lambda_ms: u64,

    #[serde(default = "default_big_lambda_ms")]
    pub big_lambda_ms: u64,

    #[serde(default = "default_max_backoff_exponent")]
    pub max_backoff_exponent: u32,

    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

fn default_small_lambda_ms() -> u64 {
    100
}

fn default_big_lambda_ms() -> u64 {
    500
}

fn default_max_backoff_exponent() -> u32 {
    6
}

fn default_max_timeout_ms() -> u64 {
    60_000
}

impl Default for AgreementSection {
    fn default() -> Self {
        Self {
            thresholds: ThresholdPreset::default(),
            small_lambda_ms: default_small_lambda_ms(),
            big_lambda_ms: default_big_lambda_ms(),
            max_backoff_exponent: default_max_backoff_exponent(),
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    #[serde(default = "default_true")]
    pub serve_catchup: bool,

    #[serde(default = "default_true")]
    pub request_catchup: bool,

    #[serde(default = "default_catchup_retry_after")]
    pub catchup_retry_after: u32,
}

fn default_true() -> bool {
    true
}

fn default_catchup_retry_after() -> u32 {
    DEFAULT_RETRY_AFTER
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            serve_catchup: true,
            request_catchup: true,
            catchup_retry_after: default_catchup_retry_after(),
        }
    }
}

/// A fault applied at a fixed logical time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fault {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: FaultAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FaultAction {
    Crash { node: NodeIndex },
    Restart { node: NodeIndex },
    Isolate { node: NodeIndex },
    Partition {
        group_a: Vec<NodeIndex>,
        group_b: Vec<NodeIndex>,
    },
    Heal,
    PacketLoss { rate: f64 },
}

impl SimulatorConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.validators == 0 {
            bail!("network.validators must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.network.packet_loss_rate) {
            bail!(
                "network.packet_loss_rate {} is outside [0, 1]",
                self.network.packet_loss_rate
            );
        }
        if !(0.0..1.0).contains(&self.network.jitter_fraction) {
            bail!(
                "network.jitter_fraction {} is outside [0, 1)",
                self.network.jitter_fraction
            );
        }
        for fault in &self.faults {
            for node in fault.action.nodes() {
                if node >= self.network.validators {
                    bail!(
                        "fault at {}ms names node {node}, but there are {} validators",
                        fault.at_ms,
                        self.network.validators
                    );
                }
            }
        }
        self.node_config()
            .validate()
            .context("Invalid agreement parameters")?;
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            num_validators: self.network.validators,
            latency: Duration::from_millis(self.network.latency_ms),
            jitter_fraction: self.network.jitter_fraction,
            packet_loss_rate: self.network.packet_loss_rate,
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        let section = &self.agreement;
        let agreement = AgreementConfig::default()
            .with_thresholds(section.thresholds.thresholds())
            .with_timeouts(TimeoutConfig {
                small_lambda: Duration::from_millis(section.small_lambda_ms),
                big_lambda: Duration::from_millis(section.big_lambda_ms),
                max_backoff_exponent: section.max_backoff_exponent,
                max_timeout: Duration::from_millis(section.max_timeout_ms),
            });
        NodeConfig {
            agreement,
            serve_catchup: self.node.serve_catchup,
            request_catchup: self.node.request_catchup,
            catchup_retry_after: self.node.catchup_retry_after,
        }
    }
}

impl FaultAction {
    fn nodes(&self) -> Vec<NodeIndex> {
        match self {
            FaultAction::Crash { node } | FaultAction::Restart { node } | FaultAction::Isolate { node } => {
                vec![*node]
            }
            FaultAction::Partition { group_a, group_b } => {
                group_a.iter().chain(group_b).copied().collect()
            }
            FaultAction::Heal | FaultAction::PacketLoss { .. } => vec![],
        }
    }
}
