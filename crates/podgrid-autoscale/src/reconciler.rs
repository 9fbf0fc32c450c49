//! Autoscaler — metric-driven replica reconciliation.
//!
//! Each cycle, every registered binding is evaluated: sample the
//! workload's utilization, compute `ratio = current / target`, and when
//! the ratio leaves the dead band, move the desired replica count to
//! `ceil(replicas * ratio)` clamped to the binding's bounds.
//! Stabilization windows suppress repeat scaling: a scale-up blocks
//! further scale-ups for the up window and blocks scale-downs too, so a
//! spike is never immediately unwound.
//!
//! After the decision, the workload's pod set is converged to the
//! desired count: missing replicas are created Pending, excess replicas
//! are deleted newest-first so the longest-running pods survive.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use podgrid_state::{EventKind, EventLog, PodRecord, SimClock, StateStore, WorkloadId};

use crate::error::{AutoscaleError, AutoscaleResult};
use crate::metrics::MetricsProvider;

/// Links one workload to a utilization target and replica bounds.
#[derive(Debug, Clone)]
pub struct HpaBinding {
    pub workload: WorkloadId,
    /// Target utilization per replica, in the provider's unit.
    pub target: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

/// Tuning knobs shared by all bindings.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    /// Ratios inside `[dead_band_low, dead_band_high]` hold the current
    /// count; the replica bounds still clamp it.
    pub dead_band_low: f64,
    pub dead_band_high: f64,
    /// Seconds after a scale-up during which no further scaling happens.
    pub scale_up_window_secs: u64,
    /// Seconds after a scale-down during which no further scale-down happens.
    pub scale_down_window_secs: u64,
    /// How long to wait for a metrics sample before treating it as unavailable.
    pub metrics_timeout: Duration,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            dead_band_low: 0.9,
            dead_band_high: 1.1,
            scale_up_window_secs: 60,
            scale_down_window_secs: 300,
            metrics_timeout: Duration::from_secs(1),
        }
    }
}

/// What one reconcile cycle decided for a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Desired replicas changed.
    Scaled { from: u32, to: u32 },
    /// Ratio inside the dead band; left alone.
    InDeadBand,
    /// A scale was wanted but a stabilization window suppressed it.
    Stabilized { wanted: u32 },
    /// No sample this cycle; the workload was skipped entirely.
    MetricsUnavailable,
    /// Candidate equals current (often from clamping).
    NoChange,
}

/// Pods created and deleted while converging a workload's pod set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergeSummary {
    pub created: u32,
    pub deleted: u32,
}

#[derive(Default)]
struct ScaleWindows {
    last_scale_up: Option<u64>,
    last_scale_down: Option<u64>,
}

/// The autoscaling control loop.
pub struct Autoscaler {
    state: StateStore,
    events: EventLog,
    provider: Box<dyn MetricsProvider>,
    config: AutoscalerConfig,
    bindings: Vec<HpaBinding>,
    /// Per-workload stabilization tracking.
    windows: HashMap<WorkloadId, ScaleWindows>,
}

impl Autoscaler {
    pub fn new(state: StateStore, events: EventLog, provider: Box<dyn MetricsProvider>) -> Self {
        Self {
            state,
            events,
            provider,
            config: AutoscalerConfig::default(),
            bindings: Vec::new(),
            windows: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: AutoscalerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a binding; replaces any existing binding for the workload.
    ///
    /// Inverted bounds are rejected up front so `clamp` can never panic
    /// during a reconcile cycle.
    pub fn add_binding(&mut self, binding: HpaBinding) -> AutoscaleResult<()> {
        if binding.min_replicas > binding.max_replicas {
            return Err(AutoscaleError::InvalidReplicaBounds {
                workload: binding.workload.clone(),
                min: binding.min_replicas,
                max: binding.max_replicas,
            });
        }
        self.bindings.retain(|b| b.workload != binding.workload);
        self.bindings.push(binding);
        Ok(())
    }

    pub fn bindings(&self) -> &[HpaBinding] {
        &self.bindings
    }

    /// Evaluate one binding and apply the resulting replica change.
    pub async fn reconcile_binding(
        &mut self,
        binding: &HpaBinding,
        now: u64,
    ) -> AutoscaleResult<ReconcileOutcome> {
        if binding.min_replicas > binding.max_replicas {
            return Err(AutoscaleError::InvalidReplicaBounds {
                workload: binding.workload.clone(),
                min: binding.min_replicas,
                max: binding.max_replicas,
            });
        }
        let workload = self
            .state
            .get_workload(&binding.workload)?
            .ok_or_else(|| AutoscaleError::WorkloadNotFound(binding.workload.clone()))?;
        let current = workload.desired_replicas;

        let sample = match tokio::time::timeout(
            self.config.metrics_timeout,
            self.provider.sample(&binding.workload),
        )
        .await
        {
            Ok(sample) => sample,
            Err(_) => {
                warn!(workload = %binding.workload, "metrics sample timed out");
                None
            }
        };
        let Some(value) = sample else {
            debug!(workload = %binding.workload, "metrics unavailable, skipping");
            return Ok(ReconcileOutcome::MetricsUnavailable);
        };

        if binding.target <= 0.0 {
            warn!(workload = %binding.workload, target = binding.target, "non-positive target");
            return Ok(ReconcileOutcome::NoChange);
        }
        let ratio = value / binding.target;

        let in_dead_band =
            ratio >= self.config.dead_band_low && ratio <= self.config.dead_band_high;

        let candidate = if current == 0 {
            // ceil(0 * ratio) is 0 forever; restart at the floor when
            // load reappears.
            if ratio > 0.0 {
                binding.min_replicas.max(1)
            } else {
                0
            }
        } else if in_dead_band {
            // Holding still is still subject to the [min, max] bounds:
            // a workload sitting outside them gets pulled in even when
            // the ratio says nothing.
            current
        } else {
            (current as f64 * ratio).ceil() as u32
        };
        let candidate = candidate.clamp(binding.min_replicas, binding.max_replicas);

        if candidate == current {
            return Ok(if current != 0 && in_dead_band {
                ReconcileOutcome::InDeadBand
            } else {
                ReconcileOutcome::NoChange
            });
        }

        let up_window = self.config.scale_up_window_secs;
        let down_window = self.config.scale_down_window_secs;
        {
            let windows = self.windows.entry(binding.workload.clone()).or_default();
            let up_blocked = windows
                .last_scale_up
                .is_some_and(|t| now.saturating_sub(t) < up_window);
            if candidate > current {
                if up_blocked {
                    debug!(workload = %binding.workload, wanted = candidate, "scale-up stabilized");
                    return Ok(ReconcileOutcome::Stabilized { wanted: candidate });
                }
            } else {
                // A recent scale-up blocks scale-down too.
                let blocked = up_blocked
                    || windows
                        .last_scale_down
                        .is_some_and(|t| now.saturating_sub(t) < down_window);
                if blocked {
                    debug!(workload = %binding.workload, wanted = candidate, "scale-down stabilized");
                    return Ok(ReconcileOutcome::Stabilized { wanted: candidate });
                }
            }
        }

        self.state
            .set_desired_replicas(&binding.workload, candidate, now)?;
        // Only a scale that actually landed starts a window; a failed
        // write leaves the next cycle free to retry.
        let windows = self.windows.entry(binding.workload.clone()).or_default();
        if candidate > current {
            windows.last_scale_up = Some(now);
        } else {
            windows.last_scale_down = Some(now);
        }
        info!(
            workload = %binding.workload,
            from = current,
            to = candidate,
            ratio,
            "replicas scaled"
        );
        self.events.record(
            EventKind::ScalingDecision {
                workload: binding.workload.clone(),
                from: current,
                to: candidate,
                ratio,
            },
            now,
        );
        Ok(ReconcileOutcome::Scaled {
            from: current,
            to: candidate,
        })
    }

    /// Bring the workload's live pod count in line with its desired
    /// replicas. Missing replicas are created Pending; excess replicas
    /// are deleted newest-first.
    pub fn converge_workload_pods(
        &self,
        workload_id: &str,
        now: u64,
    ) -> AutoscaleResult<ConvergeSummary> {
        let workload = self
            .state
            .get_workload(workload_id)?
            .ok_or_else(|| AutoscaleError::WorkloadNotFound(workload_id.to_string()))?;

        let mut live: Vec<PodRecord> = self
            .state
            .list_pods_for_workload(workload_id)?
            .into_iter()
            .filter(|p| p.is_live())
            .collect();
        let desired = workload.desired_replicas as usize;
        let mut summary = ConvergeSummary::default();

        if live.len() < desired {
            for _ in live.len()..desired {
                let pod = self.state.create_workload_pod(workload_id, now)?;
                debug!(workload = %workload_id, pod = %pod, "replica created");
                summary.created += 1;
            }
        } else if live.len() > desired {
            live.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| pod_seq(&b.id).cmp(&pod_seq(&a.id)))
            });
            for pod in live.iter().take(live.len() - desired) {
                self.state.delete_pod(&pod.id)?;
                debug!(workload = %workload_id, pod = %pod.id, "excess replica deleted");
                summary.deleted += 1;
            }
        }

        Ok(summary)
    }

    /// Reconcile every binding and converge its pods.
    ///
    /// Bindings run in workload-id order so two passes over the same
    /// state decide in the same sequence. One misbehaving workload never
    /// stops the pass: its error is logged and the remaining bindings
    /// still run.
    pub async fn run_reconciliation_pass(
        &mut self,
        now: u64,
    ) -> Vec<(WorkloadId, ReconcileOutcome)> {
        self.pass_inner(now, None).await
    }

    /// Run one pass, stopping cleanly between bindings when shutdown
    /// fires. Decisions applied before the stop point stand.
    pub async fn run_reconciliation_pass_cancellable(
        &mut self,
        now: u64,
        shutdown: &watch::Receiver<bool>,
    ) -> Vec<(WorkloadId, ReconcileOutcome)> {
        self.pass_inner(now, Some(shutdown)).await
    }

    async fn pass_inner(
        &mut self,
        now: u64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Vec<(WorkloadId, ReconcileOutcome)> {
        let mut bindings = self.bindings.clone();
        bindings.sort_by(|a, b| a.workload.cmp(&b.workload));
        let mut outcomes = Vec::with_capacity(bindings.len());

        for binding in &bindings {
            if shutdown.is_some_and(|s| *s.borrow()) {
                debug!("reconciliation pass interrupted");
                break;
            }
            let outcome = match self.reconcile_binding(binding, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(workload = %binding.workload, error = %e, "reconcile failed");
                    continue;
                }
            };
            if outcome != ReconcileOutcome::MetricsUnavailable
                && let Err(e) = self.converge_workload_pods(&binding.workload, now)
            {
                error!(workload = %binding.workload, error = %e, "pod convergence failed");
            }
            outcomes.push((binding.workload.clone(), outcome));
        }

        outcomes
    }

    /// Periodic loop driving reconciliation until shutdown.
    pub async fn run(
        &mut self,
        clock: SimClock,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "autoscaler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let rx = shutdown.clone();
                    self.run_reconciliation_pass_cancellable(clock.now(), &rx).await;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

/// Numeric suffix of a pod id, used to order same-timestamp replicas.
fn pod_seq(pod_id: &str) -> u64 {
    pod_id
        .rsplit('-')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
