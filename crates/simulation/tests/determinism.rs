//! Same seed, same run.

use concord_simulation::{NetworkConfig, SimulationRunner};
use concord_types::Round;
use std::time::Duration;

fn lossy_config() -> NetworkConfig {
    NetworkConfig {
        packet_loss_rate: 0.05,
        ..Default::default()
    }
}

fn run(seed: u64) -> SimulationRunner {
    let mut runner =
        SimulationRunner::new(lossy_config(), SimulationRunner::default_node_config(), seed)
            .unwrap();
    runner.run_until(Duration::from_secs(5));
    runner
}

fn decided_values(runner: &SimulationRunner) -> Vec<Vec<String>> {
    (0..runner.num_nodes() as u32)
        .map(|node| {
            (1..=runner.latest_decided_round(node).0)
                .map(|round| format!("{:?}", runner.decided_value(node, Round(round))))
                .collect()
        })
        .collect()
}

#[test]
fn test_runner_creation() {
    let runner =
        SimulationRunner::new(NetworkConfig::default(), SimulationRunner::default_node_config(), 1)
            .unwrap();
    assert_eq!(runner.num_nodes(), 4);
    assert!(runner.node(3).is_some());
    assert!(runner.node(4).is_none());
    // Every node queued its startup inputs.
    assert!(runner.pending_events() >= 4);
}

#[test]
fn test_determinism_same_seed() {
    let first = run(12345);
    let second = run(12345);

    assert_eq!(first.stats(), second.stats());
    assert_eq!(decided_values(&first), decided_values(&second));
    assert!(first.min_decided_round() >= Round(1));
}

#[test]
fn test_run_until_advances_clock_without_events() {
    let mut runner =
        SimulationRunner::new(NetworkConfig::default(), SimulationRunner::default_node_config(), 9)
            .unwrap();
    runner.run_until(Duration::from_millis(1));
    assert_eq!(runner.now(), Duration::from_millis(1));
    runner.run_until(Duration::from_millis(1));
    assert_eq!(runner.now(), Duration::from_millis(1));
}
