//! Concord simulator.
//!
//! Runs a [`SimulationRunner`](concord_simulation::SimulationRunner) for a
//! fixed span of logical time, applying a schedule of crashes, restarts,
//! partitions and loss changes, and reports per-node progress and whether
//! every node decided the same values.
//!
//! # Example
//!
//! ```no_run
//! use concord_simulator::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig {
//!     duration_secs: 10,
//!     ..Default::default()
//! };
//! let mut simulator = Simulator::new(config)?;
//! let report = simulator.run()?;
//! report.print_summary();
//! # Ok::<(), anyhow::Error>(())
//! ```

mod config;
mod report;
mod runner;

pub use config::{
    AgreementSection, Fault, FaultAction, NetworkSection, NodeSection, SimulatorConfig,
    ThresholdPreset,
};
pub use report::{NodeReport, SimulationReport};
pub use runner::Simulator;
