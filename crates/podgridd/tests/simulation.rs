//! End-to-end regression tests: full scenarios driven tick by tick
//! through every subsystem, asserting on the cluster state and the
//! event log at the end.

use podgrid_state::{EventKind, PodPhase, StateStore};
use podgridd::{ScenarioConfig, SimDriver};

fn driver_from(toml: &str) -> SimDriver {
    let config = ScenarioConfig::from_toml_str(toml).unwrap();
    SimDriver::new(&config).unwrap()
}

#[tokio::test]
async fn steady_cluster_runs_all_replicas() {
    let mut driver = driver_from(
        r#"
[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[nodes]]
id = "node-2"
cpu_millis = 4000
memory_bytes = 8589934592

[[workloads]]
id = "web"
replicas = 2
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(3).await.unwrap();

    let report = driver.report().unwrap();
    assert_eq!(report.pods_running, 2);
    assert_eq!(report.pods_pending, 0);
    assert_eq!(report.nodes_ready, 2);

    // Unlabeled nodes are their own topology domains, so the two
    // replicas spread across both nodes.
    let pods = driver.state().list_pods().unwrap();
    let nodes: Vec<_> = pods.iter().map(|p| p.assigned_node.clone().unwrap()).collect();
    assert_ne!(nodes[0], nodes[1]);

    driver.state().verify_allocations().unwrap();
}

#[tokio::test]
async fn load_spike_scales_the_workload_up() {
    let mut driver = driver_from(
        r#"
[autoscaler]
scale_up_window_secs = 0

[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[nodes]]
id = "node-2"
cpu_millis = 4000
memory_bytes = 8589934592

[[workloads]]
id = "web"
replicas = 2
metrics = [{ value = 100.0 }, { value = 300.0 }]
hpa = { target = 100.0, max_replicas = 6 }
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(5).await.unwrap();

    // Tick 1: ratio 1.0 is in the dead band. Tick 2: ratio 3.0 wants
    // 6 replicas. The held sample then wants 18, which clamps back to
    // the max and becomes a no-op.
    let workload = driver.state().get_workload("web").unwrap().unwrap();
    assert_eq!(workload.desired_replicas, 6);
    assert_eq!(driver.report().unwrap().pods_running, 6);

    let scale_events: Vec<_> = driver
        .events()
        .snapshot()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::ScalingDecision { .. }))
        .collect();
    assert_eq!(scale_events.len(), 1);
    assert!(matches!(
        &scale_events[0].kind,
        EventKind::ScalingDecision { from: 2, to: 6, .. }
    ));
}

#[tokio::test]
async fn excess_replicas_are_deleted_newest_first() {
    let mut driver = driver_from(
        r#"
[autoscaler]
scale_up_window_secs = 0
scale_down_window_secs = 0

[[nodes]]
id = "node-1"
cpu_millis = 8000
memory_bytes = 17179869184

[[workloads]]
id = "web"
replicas = 2
metrics = [{ value = 400.0 }, { value = 50.0 }, { value = 100.0 }]
hpa = { target = 100.0, max_replicas = 8 }
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(5).await.unwrap();

    // 2 → 8 on the spike, 8 → 4 on the collapse, then ratio 1.0 holds.
    let workload = driver.state().get_workload("web").unwrap().unwrap();
    assert_eq!(workload.desired_replicas, 4);

    let survivors: Vec<_> = driver
        .state()
        .list_pods_for_workload("web")
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    // The two seed replicas plus the two oldest spike replicas remain.
    assert_eq!(survivors, vec!["web-1", "web-2", "web-3", "web-4"]);
    driver.state().verify_allocations().unwrap();
}

#[tokio::test]
async fn metrics_outage_freezes_replica_counts() {
    let mut driver = driver_from(
        r#"
[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[workloads]]
id = "web"
replicas = 2
metrics = [{}]
hpa = { target = 100.0, max_replicas = 6 }
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(4).await.unwrap();

    // Every sample was an outage: no decisions, but the seed replicas
    // still got scheduled and started.
    let workload = driver.state().get_workload("web").unwrap().unwrap();
    assert_eq!(workload.desired_replicas, 2);
    assert_eq!(driver.report().unwrap().pods_running, 2);
    assert!(!driver
        .events()
        .snapshot()
        .iter()
        .any(|e| matches!(e.kind, EventKind::ScalingDecision { .. })));
}

#[tokio::test]
async fn node_failure_moves_pods_to_survivors() {
    let mut driver = driver_from(
        r#"
[simulation]
tick_secs = 5
heartbeat_timeout_secs = 10

[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[nodes]]
id = "node-2"
cpu_millis = 4000
memory_bytes = 8589934592
fail_at_tick = 2

[[workloads]]
id = "web"
replicas = 2
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(8).await.unwrap();

    let report = driver.report().unwrap();
    assert_eq!(report.nodes_ready, 1);
    assert_eq!(report.nodes_not_ready, 1);
    assert_eq!(report.pods_running, 2);

    // Both replicas ended up on the survivor.
    let pods = driver.state().list_pods().unwrap();
    assert!(pods
        .iter()
        .all(|p| p.assigned_node.as_deref() == Some("node-1")));

    assert!(driver.events().snapshot().iter().any(|e| matches!(
        &e.kind,
        EventKind::NodeMarkedUnhealthy { node } if node == "node-2"
    )));
    driver.state().verify_allocations().unwrap();
}

#[tokio::test]
async fn tainted_node_repels_intolerant_pods() {
    let mut driver = driver_from(
        r#"
[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[nodes.taints]]
key = "dedicated"
value = "batch"
effect = "no_schedule"

[[nodes]]
id = "node-2"
cpu_millis = 4000
memory_bytes = 8589934592

[[workloads]]
id = "web"
replicas = 3
template = { cpu_millis = 250, memory_bytes = 268435456 }
"#,
    );

    driver.run(2).await.unwrap();

    let pods = driver.state().list_pods().unwrap();
    assert_eq!(pods.len(), 3);
    assert!(pods
        .iter()
        .all(|p| p.assigned_node.as_deref() == Some("node-2")));
}

#[tokio::test]
async fn oversized_pod_is_reported_every_tick() {
    let mut driver = driver_from(
        r#"
[[nodes]]
id = "node-1"
cpu_millis = 1000
memory_bytes = 1073741824

[[workloads]]
id = "giant"
replicas = 1
template = { cpu_millis = 64000, memory_bytes = 1073741824 }
"#,
    );

    driver.run(3).await.unwrap();

    let report = driver.report().unwrap();
    assert_eq!(report.pods_pending, 1);
    assert_eq!(report.pods_running, 0);

    let pod = &driver.state().list_pods().unwrap()[0];
    assert!(pod.pending_reason.as_deref().unwrap().contains("insufficient capacity"));

    let reports = driver
        .events()
        .snapshot()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::PodUnschedulable { .. }))
        .count();
    assert_eq!(reports, 3);
}

#[tokio::test]
async fn cluster_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
[simulation]
data_dir = "{}"

[[nodes]]
id = "node-1"
cpu_millis = 4000
memory_bytes = 8589934592

[[workloads]]
id = "web"
replicas = 2
template = {{ cpu_millis = 250, memory_bytes = 268435456 }}
"#,
        dir.path().display()
    );

    {
        let config = ScenarioConfig::from_toml_str(&toml).unwrap();
        let mut driver = SimDriver::new(&config).unwrap();
        driver.run(2).await.unwrap();
        assert_eq!(driver.report().unwrap().pods_running, 2);
    }

    // Reopen the store the way a restarted daemon would.
    let state = StateStore::open(&dir.path().join("podgrid.redb")).unwrap();
    let pods = state.list_pods().unwrap();
    assert_eq!(pods.len(), 2);
    assert!(pods.iter().all(|p| p.phase == PodPhase::Running));
    state.verify_allocations().unwrap();
}
