//! Simulation driver — runs the control loops over simulated time.
//!
//! Each tick advances the clock and steps every subsystem once, in a
//! fixed order:
//!
//! 1. live nodes heartbeat (failed nodes go silent)
//! 2. the heartbeat monitor sweeps for stale nodes and evicts their pods
//! 3. the autoscaler reconciles replica counts and converges pod sets
//! 4. the scheduler places pending pods
//! 5. newly bound pods are promoted to Running, standing in for node
//!    agents starting them
//!
//! The order matters: evictions land back in the pending queue before
//! the scheduling pass, so a node failure and the reschedule of its
//! pods resolve within a single tick.

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use podgrid_autoscale::{Autoscaler, AutoscalerConfig, HpaBinding, ReconcileOutcome, ScriptedMetrics};
use podgrid_scheduler::{Scheduler, ScoringWeights};
use podgrid_state::{
    EventLog, HeartbeatMonitor, NodeHealth, NodeId, NodeRecord, PodPhase, Resources, SimClock,
    StateStore, WorkloadId, WorkloadRecord,
};

use crate::config::ScenarioConfig;

struct SimNode {
    id: NodeId,
    fail_at_tick: Option<u64>,
}

/// What one tick did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub now: u64,
    pub nodes_marked_unhealthy: u32,
    pub workloads_scaled: u32,
    pub pods_scheduled: u32,
    pub pods_unschedulable: u32,
    pub pods_started: u32,
}

/// Cluster totals at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinalReport {
    pub ticks: u64,
    pub nodes_ready: u32,
    pub nodes_not_ready: u32,
    pub pods_running: u32,
    pub pods_pending: u32,
    pub pods_failed: u32,
    pub events: usize,
}

/// Owns every subsystem of a simulated cluster.
pub struct SimDriver {
    state: StateStore,
    events: EventLog,
    clock: SimClock,
    scheduler: Scheduler,
    autoscaler: Autoscaler,
    monitor: HeartbeatMonitor,
    tick_secs: u64,
    ticks_run: u64,
    nodes: Vec<SimNode>,
    /// Workloads without an autoscaler binding; the driver converges
    /// their pod sets itself.
    unbound_workloads: Vec<WorkloadId>,
}

impl SimDriver {
    /// Build a cluster from a scenario: open the store, register the
    /// nodes, create the workloads with their initial replicas, and
    /// wire up the scripted metrics.
    pub fn new(config: &ScenarioConfig) -> anyhow::Result<Self> {
        let state = match &config.simulation.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating data dir {}", dir.display()))?;
                StateStore::open(&dir.join("podgrid.redb"))?
            }
            None => StateStore::open_in_memory()?,
        };
        let events = EventLog::new();
        let clock = SimClock::starting_at(config.simulation.start_epoch);
        let now = clock.now();

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node_cfg in &config.nodes {
            let mut taints = Vec::with_capacity(node_cfg.taints.len());
            for taint in &node_cfg.taints {
                taints.push(taint.to_taint()?);
            }
            let capacity = Resources::new(node_cfg.cpu_millis, node_cfg.memory_bytes);
            state.register_node(&NodeRecord {
                id: node_cfg.id.clone(),
                capacity,
                allocatable: capacity,
                allocated: Resources::zero(),
                labels: node_cfg.labels.clone(),
                taints,
                health: NodeHealth::Ready,
                last_heartbeat: now,
            })?;
            nodes.push(SimNode {
                id: node_cfg.id.clone(),
                fail_at_tick: node_cfg.fail_at_tick,
            });
        }

        let metrics = ScriptedMetrics::new();
        let mut tuning = AutoscalerConfig::default();
        if let Some(v) = config.autoscaler.dead_band_low {
            tuning.dead_band_low = v;
        }
        if let Some(v) = config.autoscaler.dead_band_high {
            tuning.dead_band_high = v;
        }
        if let Some(v) = config.autoscaler.scale_up_window_secs {
            tuning.scale_up_window_secs = v;
        }
        if let Some(v) = config.autoscaler.scale_down_window_secs {
            tuning.scale_down_window_secs = v;
        }
        let mut autoscaler =
            Autoscaler::new(state.clone(), events.clone(), Box::new(metrics.clone()))
                .with_config(tuning);

        let mut unbound_workloads = Vec::new();
        for workload_cfg in &config.workloads {
            let template = workload_cfg.template.to_pod_spec()?;
            state.put_workload(&WorkloadRecord {
                id: workload_cfg.id.clone(),
                desired_replicas: workload_cfg.replicas,
                template,
                pod_seq: 0,
                created_at: now,
                updated_at: now,
            })?;

            if !workload_cfg.metrics.is_empty() {
                metrics.script(
                    &workload_cfg.id,
                    workload_cfg.metrics.iter().map(|s| s.value),
                );
            }

            match &workload_cfg.hpa {
                Some(hpa) => autoscaler.add_binding(HpaBinding {
                    workload: workload_cfg.id.clone(),
                    target: hpa.target,
                    min_replicas: hpa.min_replicas,
                    max_replicas: hpa.max_replicas,
                })?,
                None => unbound_workloads.push(workload_cfg.id.clone()),
            }

            // Seed the initial replicas as Pending pods.
            autoscaler.converge_workload_pods(&workload_cfg.id, now)?;
        }

        let mut scheduler = Scheduler::new(state.clone(), events.clone());
        if let Some(key) = &config.scheduler.topology_key {
            scheduler = scheduler.with_topology_key(key.clone());
        }
        if config.scheduler.balance_weight.is_some() || config.scheduler.spread_weight.is_some() {
            let defaults = ScoringWeights::default();
            scheduler = scheduler.with_weights(ScoringWeights {
                balance: config.scheduler.balance_weight.unwrap_or(defaults.balance),
                spread: config.scheduler.spread_weight.unwrap_or(defaults.spread),
            });
        }

        let monitor = HeartbeatMonitor::new(
            state.clone(),
            events.clone(),
            config.simulation.heartbeat_timeout_secs,
        );

        info!(
            nodes = nodes.len(),
            workloads = config.workloads.len(),
            tick_secs = config.simulation.tick_secs,
            "cluster initialized"
        );

        Ok(Self {
            state,
            events,
            clock,
            scheduler,
            autoscaler,
            monitor,
            tick_secs: config.simulation.tick_secs,
            ticks_run: 0,
            nodes,
            unbound_workloads,
        })
    }

    /// Advance simulated time by one tick and step every subsystem once.
    pub async fn tick(&mut self) -> anyhow::Result<TickReport> {
        let tick = self.ticks_run;
        self.ticks_run += 1;
        let now = self.clock.advance(self.tick_secs);

        for node in &self.nodes {
            let alive = node.fail_at_tick.is_none_or(|t| tick < t);
            if alive {
                self.state.heartbeat(&node.id, now)?;
            }
        }
        let marked = self.monitor.sweep(now)?;

        let outcomes = self.autoscaler.run_reconciliation_pass(now).await;
        let scaled = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ReconcileOutcome::Scaled { .. }))
            .count() as u32;
        for workload in &self.unbound_workloads {
            self.autoscaler.converge_workload_pods(workload, now)?;
        }

        let summary = self.scheduler.run_scheduling_pass(now)?;

        let mut started = 0;
        for pod in self.state.list_pods()? {
            if pod.phase == PodPhase::Scheduled && self.state.mark_pod_running(&pod.id, now)? {
                started += 1;
            }
        }

        let report = TickReport {
            tick,
            now,
            nodes_marked_unhealthy: marked.len() as u32,
            workloads_scaled: scaled,
            pods_scheduled: summary.scheduled,
            pods_unschedulable: summary.unschedulable,
            pods_started: started,
        };
        debug!(
            tick = report.tick,
            now = report.now,
            scheduled = report.pods_scheduled,
            started = report.pods_started,
            "tick complete"
        );
        Ok(report)
    }

    /// Run the given number of ticks to completion.
    pub async fn run(&mut self, ticks: u64) -> anyhow::Result<()> {
        for _ in 0..ticks {
            self.tick().await?;
        }
        Ok(())
    }

    /// Snapshot the cluster totals.
    pub fn report(&self) -> anyhow::Result<FinalReport> {
        let mut report = FinalReport {
            ticks: self.ticks_run,
            events: self.events.len(),
            ..FinalReport::default()
        };
        for node in self.state.list_nodes()? {
            if node.health == NodeHealth::Ready {
                report.nodes_ready += 1;
            } else {
                report.nodes_not_ready += 1;
            }
        }
        for pod in self.state.list_pods()? {
            match pod.phase {
                PodPhase::Running => report.pods_running += 1,
                PodPhase::Pending => report.pods_pending += 1,
                PodPhase::Failed => report.pods_failed += 1,
                PodPhase::Scheduled => {}
            }
        }
        Ok(report)
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}
