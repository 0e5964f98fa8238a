//! Drives a [`SimulationRunner`] through a configured fault schedule.

use crate::config::{FaultAction, SimulatorConfig};
use crate::report::SimulationReport;
use anyhow::{Context, Result};
use concord_simulation::SimulationRunner;
use std::time::Duration;
use tracing::info;

pub struct Simulator {
    config: SimulatorConfig,
    runner: SimulationRunner,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let runner = SimulationRunner::new(
            config.network_config(),
            config.node_config(),
            config.seed,
        )
        .context("Failed to start simulated nodes")?;
        Ok(Self { config, runner })
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    /// Run to the configured duration, applying faults at their times.
    pub fn run(&mut self) -> Result<SimulationReport> {
        let end = self.config.duration();
        let mut faults = self.config.faults.clone();
        faults.sort_by_key(|fault| fault.at_ms);

        for fault in faults {
            let at = Duration::from_millis(fault.at_ms);
            if at > end {
                break;
            }
            self.runner.run_until(at);
            self.apply(&fault.action)
                .with_context(|| format!("Failed to apply fault at {}ms", fault.at_ms))?;
        }
        self.runner.run_until(end);

        Ok(SimulationReport::from_runner(&self.runner, self.config.seed))
    }

    fn apply(&mut self, action: &FaultAction) -> Result<()> {
        info!(time = ?self.runner.now(), ?action, "Applying fault");
        let runner = &mut self.runner;
        match action {
            FaultAction::Crash { node } => runner.crash_node(*node),
            FaultAction::Restart { node } => runner.restart_node(*node)?,
            FaultAction::Isolate { node } => runner.network_mut().isolate_node(*node),
            FaultAction::Partition { group_a, group_b } => {
                runner.network_mut().partition_groups(group_a, group_b)
            }
            FaultAction::Heal => runner.network_mut().heal_all(),
            FaultAction::PacketLoss { rate } => runner.network_mut().set_packet_loss_rate(*rate),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fault;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_crash_and_restart_schedule() {
        let config = SimulatorConfig {
            duration_secs: 20,
            faults: vec![
                Fault {
                    at_ms: 8_000,
                    action: FaultAction::Restart { node: 2 },
                },
                Fault {
                    at_ms: 1_000,
                    action: FaultAction::Crash { node: 2 },
                },
            ],
            ..Default::default()
        };
        let mut simulator = Simulator::new(config).unwrap();
        let report = simulator.run().unwrap();

        assert!(report.is_safe());
        assert_eq!(report.elapsed, Duration::from_secs(20));
        assert!(report.nodes.iter().all(|n| n.running && !n.halted));
        assert!(report.min_decided_round().0 >= 3);
        assert!(logs_contain("Applying fault"));
    }

    #[test]
    fn test_faults_past_the_end_are_skipped() {
        let config = SimulatorConfig {
            duration_secs: 2,
            faults: vec![Fault {
                at_ms: 5_000,
                action: FaultAction::Crash { node: 0 },
            }],
            ..Default::default()
        };
        let mut simulator = Simulator::new(config).unwrap();
        simulator.run().unwrap();
        assert!(simulator.runner().is_running(0));
    }
}
