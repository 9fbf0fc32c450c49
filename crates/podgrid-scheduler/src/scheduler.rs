//! Scheduler — assigns Pending pods to nodes, one pod at a time.
//!
//! Each scheduling pass walks the pending queue in a fixed order
//! (creation time, then pod id) and runs filter → score → bind per pod.
//! A pod with no feasible node stays Pending with a recorded reason and
//! is retried every pass; it never blocks the pods behind it.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use podgrid_state::{
    EventKind, EventLog, NodeHealth, NodeRecord, PodRecord, SimClock, StateError, StateStore,
};

use crate::error::SchedulerResult;
use crate::filter::filter_nodes;
use crate::scorer::{ScoringWeights, rank_nodes};

/// Default node label used for topology spread.
const DEFAULT_TOPOLOGY_KEY: &str = "zone";

/// Counts from one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Pods bound this pass.
    pub scheduled: u32,
    /// Pods with no feasible node this pass.
    pub unschedulable: u32,
    /// Pods that lost a bind race twice and wait for the next pass.
    pub requeued: u32,
}

/// What happened to a single pod during a pass.
enum Placement {
    Bound(String),
    NoFeasible(String),
    Raced,
}

/// The scheduling control loop.
///
/// Holds no pod state of its own: every pass reads the cluster fresh from
/// the state store, so the scheduler can be restarted at any time.
pub struct Scheduler {
    state: StateStore,
    events: EventLog,
    weights: ScoringWeights,
    topology_key: String,
}

impl Scheduler {
    pub fn new(state: StateStore, events: EventLog) -> Self {
        Self {
            state,
            events,
            weights: ScoringWeights::default(),
            topology_key: DEFAULT_TOPOLOGY_KEY.to_string(),
        }
    }

    /// Override the scoring weights.
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Override the node label used for topology spread.
    pub fn with_topology_key(mut self, key: impl Into<String>) -> Self {
        self.topology_key = key.into();
        self
    }

    /// Run one scheduling pass over the pending queue.
    pub fn run_scheduling_pass(&self, now: u64) -> SchedulerResult<PassSummary> {
        self.pass_inner(now, None)
    }

    /// Run one pass, stopping cleanly between pods when shutdown fires.
    ///
    /// Binds completed before the stop point remain valid.
    pub fn run_scheduling_pass_cancellable(
        &self,
        now: u64,
        shutdown: &watch::Receiver<bool>,
    ) -> SchedulerResult<PassSummary> {
        self.pass_inner(now, Some(shutdown))
    }

    fn pass_inner(
        &self,
        now: u64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> SchedulerResult<PassSummary> {
        let queue = self.state.list_unscheduled_pods()?;
        let mut summary = PassSummary::default();

        for pod in &queue {
            if shutdown.is_some_and(|s| *s.borrow()) {
                debug!(
                    remaining = queue.len() as u32 - summary.scheduled - summary.unschedulable - summary.requeued,
                    "scheduling pass interrupted"
                );
                break;
            }

            match self.schedule_one(pod, now)? {
                Placement::Bound(node) => {
                    summary.scheduled += 1;
                    info!(pod = %pod.id, node = %node, "pod scheduled");
                    self.events.record(
                        EventKind::PodScheduled {
                            pod: pod.id.clone(),
                            node,
                        },
                        now,
                    );
                }
                Placement::NoFeasible(reason) => {
                    summary.unschedulable += 1;
                    warn!(pod = %pod.id, %reason, "pod unschedulable");
                    self.state.mark_pod_unschedulable(&pod.id, &reason, now)?;
                    self.events.record(
                        EventKind::PodUnschedulable {
                            pod: pod.id.clone(),
                            reason,
                        },
                        now,
                    );
                }
                Placement::Raced => {
                    summary.requeued += 1;
                    debug!(pod = %pod.id, "bind raced twice, requeued for next pass");
                }
            }
        }

        debug!(
            scheduled = summary.scheduled,
            unschedulable = summary.unschedulable,
            requeued = summary.requeued,
            "scheduling pass complete"
        );
        Ok(summary)
    }

    /// Filter → score → bind for one pod, with a single in-cycle retry if
    /// the chosen node's capacity was consumed between scoring and bind.
    fn schedule_one(&self, pod: &PodRecord, now: u64) -> SchedulerResult<Placement> {
        for attempt in 0..2 {
            match self.try_place(pod, now)? {
                Placement::Raced if attempt == 0 => {
                    debug!(pod = %pod.id, "bind raced, re-running filter and score");
                    continue;
                }
                outcome => return Ok(outcome),
            }
        }
        Ok(Placement::Raced)
    }

    fn try_place(&self, pod: &PodRecord, now: u64) -> SchedulerResult<Placement> {
        let all_nodes = self.state.list_nodes()?;
        let ready: Vec<NodeRecord> = all_nodes
            .iter()
            .filter(|n| n.health == NodeHealth::Ready)
            .cloned()
            .collect();
        let bound: Vec<PodRecord> = self
            .state
            .list_pods()?
            .into_iter()
            .filter(|p| p.assigned_node.is_some())
            .collect();

        let (feasible, rejected) = filter_nodes(pod, &ready, &all_nodes, &bound);
        if feasible.is_empty() {
            return Ok(Placement::NoFeasible(unschedulable_reason(
                ready.len(),
                &rejected,
            )));
        }

        let ranked = rank_nodes(
            pod,
            &feasible,
            &all_nodes,
            &bound,
            &self.topology_key,
            &self.weights,
        );
        let best = &ranked[0];

        match self.state.bind_pod(&pod.id, &best.node_id, now) {
            Ok(()) => Ok(Placement::Bound(best.node_id.clone())),
            // Capacity consumed since we scored; caller may retry once.
            Err(StateError::InsufficientResources { .. }) => Ok(Placement::Raced),
            Err(e) => Err(e.into()),
        }
    }

    /// Periodic loop driving passes until shutdown.
    pub async fn run(
        &self,
        clock: SimClock,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.run_scheduling_pass_cancellable(clock.now(), &shutdown) {
                        error!(error = %e, "scheduling pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// Summarize why no node was feasible, e.g.
/// `"no feasible node (3 filtered: 2 insufficient capacity, 1 untolerated taint)"`.
fn unschedulable_reason(
    candidates: usize,
    rejected: &[(String, crate::filter::FilterReason)],
) -> String {
    if candidates == 0 {
        return "no ready nodes in cluster".to_string();
    }
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for (_, reason) in rejected {
        *counts.entry(reason.as_str()).or_insert(0) += 1;
    }
    let detail: Vec<String> = counts
        .iter()
        .map(|(reason, count)| format!("{count} {reason}"))
        .collect();
    format!(
        "no feasible node ({} filtered: {})",
        rejected.len(),
        detail.join(", ")
    )
}
