//! podgrid-autoscale — metric-driven replica reconciliation.
//!
//! Samples each bound workload's utilization, compares it against the
//! binding's target, and adjusts the desired replica count:
//!
//! ```text
//! ratio     = current_utilization / target
//! candidate = ceil(replicas * ratio), clamped to [min, max]
//!
//! 0.9 <= ratio <= 1.1        → dead band, hold (bounds still clamp)
//! candidate > current        → scale up (unless inside the up window)
//! candidate < current        → scale down (unless inside either window;
//!                              a recent scale-up blocks scale-down too)
//! sample unavailable         → skip the workload this cycle
//! ```
//!
//! After each decision the workload's pod set is converged: missing
//! replicas created Pending, excess replicas deleted newest-first.

pub mod error;
pub mod metrics;
pub mod reconciler;

pub use error::{AutoscaleError, AutoscaleResult};
pub use metrics::{MetricsFuture, MetricsProvider, ScriptedMetrics};
pub use reconciler::{
    Autoscaler, AutoscalerConfig, ConvergeSummary, HpaBinding, ReconcileOutcome,
};
