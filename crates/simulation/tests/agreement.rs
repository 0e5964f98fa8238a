//! Multi-node agreement: safety and liveness under loss, crashes and
//! partitions.

use concord_simulation::{NetworkConfig, SimulationRunner};
use concord_types::{Round, Tag, Value};
use std::time::Duration;
use tracing_test::traced_test;

const STEP: Duration = Duration::from_millis(100);

fn runner(config: NetworkConfig, seed: u64) -> SimulationRunner {
    SimulationRunner::new(config, SimulationRunner::default_node_config(), seed).unwrap()
}

fn assert_safe(runner: &SimulationRunner) {
    assert_eq!(runner.first_disagreement(), None, "nodes decided different values");
    assert_eq!(runner.stats().node_halts, 0);
}

#[test]
fn test_all_nodes_agree() {
    let mut runner = runner(NetworkConfig::default(), 42);

    assert!(runner.run_until_decided(Round(5), STEP, Duration::from_secs(30)));
    assert_safe(&runner);

    for round in 1..=5 {
        let value = runner.decided_value(0, Round(round)).unwrap();
        assert!(matches!(value, Value::Proposal(_)), "round {round} decided {value}");
        for node in 1..4 {
            assert_eq!(runner.decided_value(node, Round(round)), Some(value));
        }
    }
    assert_eq!(runner.stats().messages_dropped(), 0);
    assert_eq!(runner.stats().disconnects, 0);
}

#[test]
fn test_progress_under_packet_loss() {
    let config = NetworkConfig {
        packet_loss_rate: 0.1,
        ..Default::default()
    };
    let mut runner = runner(config, 7);

    assert!(runner.run_until_decided(Round(3), STEP, Duration::from_secs(120)));
    assert!(runner.stats().messages_dropped_loss > 0);
    assert_safe(&runner);
}

#[test]
fn test_seven_validators_agree() {
    let config = NetworkConfig {
        num_validators: 7,
        ..Default::default()
    };
    let mut runner = runner(config, 3);

    assert!(runner.run_until_decided(Round(3), STEP, Duration::from_secs(30)));
    assert_safe(&runner);
}

#[test]
#[traced_test]
fn test_crashed_node_catches_up_after_restart() {
    let mut runner = runner(NetworkConfig::default(), 11);
    assert!(runner.run_until_decided(Round(1), STEP, Duration::from_secs(10)));

    runner.crash_node(3);
    assert!(!runner.is_running(3));
    let crashed_at = runner.latest_decided_round(3);

    // Three of four still form a quorum.
    assert!(runner.run_until_decided(Round(crashed_at.0 + 3), STEP, Duration::from_secs(60)));
    assert_eq!(runner.latest_decided_round(3), crashed_at);

    runner.restart_node(3).unwrap();
    assert!(logs_contain("Restarted node"));

    let target = Round(runner.latest_decided_round(0).0 + 2);
    let deadline = runner.now() + Duration::from_secs(60);
    assert!(runner.run_until_decided(target, STEP, deadline));
    assert_safe(&runner);

    let stats = runner.node(3).unwrap().stats();
    assert!(stats.catchup_requests_sent > 0);
    assert!(stats.catchup_applied > 0);
}

#[test]
fn test_lost_catchup_request_is_retried() {
    let mut runner = runner(NetworkConfig::default(), 13);
    assert!(runner.run_until_decided(Round(1), STEP, Duration::from_secs(10)));

    runner.crash_node(3);
    let crashed_at = runner.latest_decided_round(3);
    assert!(runner.run_until_decided(Round(crashed_at.0 + 3), STEP, Duration::from_secs(60)));

    // The restarted node's first catch-up request never arrives.
    runner.network_mut().drop_next(Tag::UniCatchupReq, 1);
    runner.restart_node(3).unwrap();

    let target = Round(runner.latest_decided_round(0).0 + 2);
    let deadline = runner.now() + Duration::from_secs(60);
    assert!(runner.run_until_decided(target, STEP, deadline));
    assert_safe(&runner);

    assert_eq!(runner.network().pending_targeted_drops(Tag::UniCatchupReq), 0);
    let stats = runner.node(3).unwrap().stats();
    assert!(stats.catchup_requests_sent >= 2);
    assert!(stats.catchup_applied > 0);
}

#[test]
fn test_restart_mid_round_resumes_from_checkpoint() {
    let mut runner = runner(NetworkConfig::default(), 5);
    assert!(runner.run_until_decided(Round(2), STEP, Duration::from_secs(20)));

    // Let node 0 vote in the next round, then bounce it.
    runner.run_until(runner.now() + Duration::from_millis(250));
    let before = runner.node(0).unwrap().player().position();
    runner.crash_node(0);
    runner.restart_node(0).unwrap();
    let after = runner.node(0).unwrap().player().position();
    assert_eq!(after.round, before.round);

    let deadline = runner.now() + Duration::from_secs(30);
    assert!(runner.run_until_decided(Round(before.round.0 + 2), STEP, deadline));
    assert_safe(&runner);
}

#[test]
fn test_healed_partition_resumes_progress() {
    let mut runner = runner(NetworkConfig::default(), 21);
    assert!(runner.run_until_decided(Round(1), STEP, Duration::from_secs(10)));

    // Two against two: neither side reaches a quorum.
    runner.network_mut().partition_groups(&[0, 1], &[2, 3]);
    runner.run_until(runner.now() + Duration::from_secs(3));
    let stalled = runner.min_decided_round();
    assert!(runner.stats().messages_dropped_partition > 0);

    runner.network_mut().heal_all();
    let deadline = runner.now() + Duration::from_secs(120);
    assert!(runner.run_until_decided(Round(stalled.0 + 2), STEP, deadline));
    assert_safe(&runner);
}
