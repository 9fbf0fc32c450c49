//! Metric sources for the autoscaler.
//!
//! A provider answers "what is this workload's current utilization" with
//! an async sample. `None` means the sample is unavailable this cycle;
//! the reconciler skips the workload rather than scaling on stale or
//! missing data.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub type MetricsFuture = Pin<Box<dyn Future<Output = Option<f64>> + Send>>;

/// Source of per-workload utilization samples.
pub trait MetricsProvider: Send + Sync {
    /// Latest utilization sample for the workload, in the same unit as
    /// the binding's target (e.g. average CPU millis per replica).
    fn sample(&self, workload: &str) -> MetricsFuture;
}

/// Deterministic provider backed by pre-scripted sample sequences.
///
/// Each call to `sample` consumes the next entry of the workload's
/// series; the final entry repeats once the series is exhausted, so a
/// long simulation settles on the last scripted value. An explicit
/// `None` entry models a metrics outage for that cycle. Workloads with
/// no series at all always read as unavailable.
#[derive(Clone, Default)]
pub struct ScriptedMetrics {
    series: Arc<Mutex<HashMap<String, VecDeque<Option<f64>>>>>,
}

impl ScriptedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sample series for a workload.
    pub fn script<I>(&self, workload: &str, samples: I)
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut series = self.series.lock().expect("metrics lock poisoned");
        series.insert(workload.to_string(), samples.into_iter().collect());
    }

    /// Append one sample to the end of a workload's series.
    pub fn push(&self, workload: &str, sample: Option<f64>) {
        let mut series = self.series.lock().expect("metrics lock poisoned");
        series.entry(workload.to_string()).or_default().push_back(sample);
    }

    fn next_sample(&self, workload: &str) -> Option<f64> {
        let mut series = self.series.lock().expect("metrics lock poisoned");
        let queue = series.get_mut(workload)?;
        if queue.len() > 1 {
            queue.pop_front()?
        } else {
            // Hold the last value instead of draining the series.
            *queue.front()?
        }
    }
}

impl MetricsProvider for ScriptedMetrics {
    fn sample(&self, workload: &str) -> MetricsFuture {
        let value = self.next_sample(workload);
        Box::pin(async move { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consumes_series_then_holds_last_value() {
        let metrics = ScriptedMetrics::new();
        metrics.script("web", [Some(100.0), Some(200.0)]);

        assert_eq!(metrics.sample("web").await, Some(100.0));
        assert_eq!(metrics.sample("web").await, Some(200.0));
        assert_eq!(metrics.sample("web").await, Some(200.0));
    }

    #[tokio::test]
    async fn explicit_none_models_an_outage() {
        let metrics = ScriptedMetrics::new();
        metrics.script("web", [None, Some(50.0)]);

        assert_eq!(metrics.sample("web").await, None);
        assert_eq!(metrics.sample("web").await, Some(50.0));
    }

    #[tokio::test]
    async fn unscripted_workload_is_unavailable() {
        let metrics = ScriptedMetrics::new();
        assert_eq!(metrics.sample("ghost").await, None);
    }
}
