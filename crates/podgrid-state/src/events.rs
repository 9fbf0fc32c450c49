//! Cluster event log — the observability output of the control loops.
//!
//! Every decision the scheduler, autoscaler, or heartbeat monitor makes is
//! appended here as a structured event. The log is append-only and ordered:
//! a single lock serializes recording, so events always appear in mutation
//! order. External collaborators consume it via `snapshot()` or `drain()`.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, PodId, WorkloadId};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A pod was bound to a node.
    PodScheduled { pod: PodId, node: NodeId },
    /// No feasible node exists for a pod; it stays Pending.
    PodUnschedulable { pod: PodId, reason: String },
    /// The autoscaler changed a workload's desired replica count.
    ScalingDecision {
        workload: WorkloadId,
        from: u32,
        to: u32,
        ratio: f64,
    },
    /// A node missed its heartbeat window and was marked NotReady.
    NodeMarkedUnhealthy { node: NodeId },
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub kind: EventKind,
    /// Simulated epoch seconds at which the decision was made.
    pub timestamp: u64,
}

/// Shared, ordered, in-memory event log.
///
/// `Clone` hands out another handle to the same log (like `StateStore`).
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ClusterEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, kind: EventKind, timestamp: u64) {
        let mut events = self.events.lock().expect("event log lock poisoned");
        events.push(ClusterEvent { kind, timestamp });
    }

    /// Copy of all events recorded so far, in order.
    pub fn snapshot(&self) -> Vec<ClusterEvent> {
        self.events.lock().expect("event log lock poisoned").clone()
    }

    /// Remove and return all events recorded so far.
    pub fn drain(&self) -> Vec<ClusterEvent> {
        let mut events = self.events.lock().expect("event log lock poisoned");
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
