//! Concord simulator CLI
//!
//! Run deterministic agreement simulations from flags or a TOML file.
//!
//! # Example
//!
//! ```bash
//! # Four validators for 30 simulated seconds
//! concord-sim --seed 42 -v 4 -d 30
//!
//! # A scenario file, with 5% packet loss on top
//! concord-sim --config scenarios/crash.toml --packet-loss 0.05
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use concord_simulator::{Simulator, SimulatorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Concord Simulator
///
/// Single-threaded and reproducible when the same seed is used. Flags
/// override values loaded from `--config`.
#[derive(Parser, Debug)]
#[command(name = "concord-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CONCORD_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Random seed. When omitted (and not set in the file), a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of validators
    #[arg(short = 'v', long)]
    validators: Option<u32>,

    /// Simulation duration in seconds
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Base one-way latency in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Packet loss rate (0.0-1.0)
    #[arg(long)]
    packet_loss: Option<f64>,

    /// Exit non-zero when nodes decided different values
    #[arg(long)]
    strict: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut SimulatorConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(validators) = self.validators {
            config.network.validators = validators;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(latency_ms) = self.latency_ms {
            config.network.latency_ms = latency_ms;
        }
        if let Some(rate) = self.packet_loss {
            config.network.packet_loss_rate = rate;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,concord_simulator=info,concord_simulation=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig {
            seed: rand::random(),
            ..Default::default()
        },
    };
    args.apply_overrides(&mut config);

    info!(
        validators = config.network.validators,
        duration_secs = config.duration_secs,
        seed = config.seed,
        latency_ms = config.network.latency_ms,
        packet_loss = config.network.packet_loss_rate,
        faults = config.faults.len(),
        "Starting simulation"
    );

    let mut simulator = Simulator::new(config)?;
    let report = simulator.run()?;
    report.print_summary();

    if args.strict && !report.is_safe() {
        bail!("nodes disagreed; rerun with --seed {} to reproduce", report.seed);
    }
    Ok(())
}
