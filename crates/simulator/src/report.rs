//! End-of-run report.

use concord_simulation::{NodeIndex, SimulationRunner, SimulationStats};
use concord_types::Round;
use std::time::Duration;

/// One node's standing at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: NodeIndex,
    pub running: bool,
    pub halted: bool,
    pub decided_round: Round,
    pub decisions: u64,
    pub catchup_applied: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub seed: u64,
    pub elapsed: Duration,
    pub nodes: Vec<NodeReport>,
    /// First round two nodes decided differently. `None` on a safe run.
    pub disagreement: Option<Round>,
    pub stats: SimulationStats,
}

impl SimulationReport {
    pub fn from_runner(runner: &SimulationRunner, seed: u64) -> Self {
        let nodes = (0..runner.num_nodes() as NodeIndex)
            .map(|node| {
                let stats = runner.node(node).map(|n| n.stats().clone()).unwrap_or_default();
                NodeReport {
                    node,
                    running: runner.is_running(node),
                    halted: runner.node(node).is_some_and(|n| n.is_halted()),
                    decided_round: runner.latest_decided_round(node),
                    decisions: stats.decisions,
                    catchup_applied: stats.catchup_applied,
                    malformed: stats.malformed,
                }
            })
            .collect();
        Self {
            seed,
            elapsed: runner.now(),
            nodes,
            disagreement: runner.first_disagreement(),
            stats: runner.stats().clone(),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.disagreement.is_none()
    }

    pub fn min_decided_round(&self) -> Round {
        self.nodes
            .iter()
            .map(|n| n.decided_round)
            .min()
            .unwrap_or_default()
    }

    /// Decided rounds per simulated second, by the slowest node.
    pub fn rounds_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.min_decided_round().0 as f64 / secs
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Simulation Report ===");
        println!("Seed:            {}", self.seed);
        println!("Simulated time:  {:.2}s", self.elapsed.as_secs_f64());
        println!(
            "Agreement:       {}",
            match self.disagreement {
                None => "safe".to_string(),
                Some(round) => format!("VIOLATED at round {}", round.0),
            }
        );
        println!(
            "Decided rounds:  {} (slowest node), {:.2}/s",
            self.min_decided_round().0,
            self.rounds_per_second()
        );

        println!("\n--- Nodes ---");
        println!(
            "{:>4}  {:>8}  {:>7}  {:>9}  {:>8}  {:>9}",
            "node", "state", "round", "decisions", "catch-up", "malformed"
        );
        for node in &self.nodes {
            let state = match (node.running, node.halted) {
                (false, _) => "crashed",
                (true, true) => "halted",
                (true, false) => "running",
            };
            println!(
                "{:>4}  {:>8}  {:>7}  {:>9}  {:>8}  {:>9}",
                node.node,
                state,
                node.decided_round.0,
                node.decisions,
                node.catchup_applied,
                node.malformed
            );
        }

        let stats = &self.stats;
        println!("\n--- Network ---");
        println!("Events processed:   {}", stats.events_processed);
        println!("Messages sent:      {}", stats.messages_sent);
        println!(
            "Messages dropped:   {} (partition {}, loss {}, disconnect {})",
            stats.messages_dropped(),
            stats.messages_dropped_partition,
            stats.messages_dropped_loss,
            stats.messages_dropped_disconnect
        );
        println!("Delivery rate:      {:.1}%", stats.delivery_rate() * 100.0);
        println!("Disconnects:        {}", stats.disconnects);
        println!(
            "Timers:             {} set, {} cancelled",
            stats.timers_set, stats.timers_cancelled
        );
    }
}
