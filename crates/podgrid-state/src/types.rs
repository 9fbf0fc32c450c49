//! Domain types for the PodGrid cluster state.
//!
//! These types represent nodes, pods, and workloads as persisted in the
//! state store, plus the resource-model value types shared by the
//! scheduler and autoscaler. All types are serializable to/from JSON for
//! storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for a pod.
pub type PodId = String;

/// Unique identifier for a workload (replica-set-like owner of pods).
pub type WorkloadId = String;

// ── Resource model ─────────────────────────────────────────────────

/// A quantity of compute resources, used for capacities, requests, and
/// limits alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// CPU in millicores (1000 = one core).
    pub cpu_millis: u64,
    /// Memory in bytes.
    pub memory_bytes: u64,
}

impl Resources {
    pub const fn new(cpu_millis: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.cpu_millis == 0 && self.memory_bytes == 0
    }

    /// Component-wise sum.
    pub fn plus(&self, other: &Resources) -> Resources {
        Resources {
            cpu_millis: self.cpu_millis.saturating_add(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
        }
    }

    /// Component-wise saturating difference.
    pub fn minus(&self, other: &Resources) -> Resources {
        Resources {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_sub(other.memory_bytes),
        }
    }

    /// True if `self` fits within `avail` in every dimension.
    ///
    /// A request fits only when no single dimension exceeds what is
    /// available.
    pub fn fits_within(&self, avail: &Resources) -> bool {
        self.cpu_millis <= avail.cpu_millis && self.memory_bytes <= avail.memory_bytes
    }
}

/// Quality-of-service tier, derived from the request/limit relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosClass {
    /// Request equals limit in every dimension (and is non-zero).
    Guaranteed,
    /// Non-zero request below the limit in at least one dimension.
    Burstable,
    /// No resource request at all.
    BestEffort,
}

// ── Node ──────────────────────────────────────────────────────────

/// Node health as driven by heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeHealth {
    Ready,
    NotReady,
    Unknown,
}

/// Effect a taint has on pods that do not tolerate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintEffect {
    /// New pods are not scheduled onto the node.
    NoSchedule,
    /// New pods are not scheduled onto the node. Taints are fixed at
    /// registration, so there is never a bound pod to evict; eviction
    /// happens through node health transitions instead.
    NoExecute,
}

/// A taint on a node: pods must carry a matching toleration to land there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: TaintEffect,
}

/// A pod-side toleration. Matches a taint when key and value are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    pub key: String,
    pub value: String,
}

impl Toleration {
    pub fn tolerates(&self, taint: &Taint) -> bool {
        self.key == taint.key && self.value == taint.value
    }
}

/// A registered node and its resource accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    /// Total hardware capacity.
    pub capacity: Resources,
    /// Capacity minus system-reserved resources; the scheduling budget.
    pub allocatable: Resources,
    /// Sum of requests of pods currently bound to this node.
    pub allocated: Resources,
    /// Arbitrary labels for selectors and topology (e.g. "zone").
    pub labels: HashMap<String, String>,
    pub taints: Vec<Taint>,
    pub health: NodeHealth,
    /// Simulated epoch seconds of the last heartbeat.
    pub last_heartbeat: u64,
}

impl NodeRecord {
    /// Remaining scheduling budget: allocatable minus allocated.
    pub fn free(&self) -> Resources {
        self.allocatable.minus(&self.allocated)
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// Lifecycle phase of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodPhase {
    Pending,
    Scheduled,
    Running,
    Failed,
}

/// Whether an affinity rule is a hard constraint or a scoring preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityMode {
    Required,
    Preferred,
}

/// An anti-affinity rule: avoid topology domains that already hold pods
/// matching `match_labels`.
///
/// Required rules filter nodes out entirely; preferred rules only reduce
/// the spread score, scaled by `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityRule {
    /// Node label key that defines the topology domain (e.g. "zone").
    pub topology_key: String,
    /// Labels a conflicting pod must carry.
    pub match_labels: HashMap<String, String>,
    pub mode: AffinityMode,
    /// Scoring weight for preferred rules (1–100). Ignored for required.
    pub weight: u32,
}

/// Scheduling-relevant specification of a pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Resources reserved for the pod; the quantity used for fit checks.
    pub request: Resources,
    /// Upper bound the pod may burst to.
    pub limit: Resources,
    /// Labels carried by the pod itself (matched by anti-affinity rules).
    pub labels: HashMap<String, String>,
    /// Node labels the pod requires (all must match).
    pub node_selector: HashMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub affinity: Vec<AffinityRule>,
}

impl PodSpec {
    /// Derive the QoS class from the request/limit relationship.
    pub fn qos_class(&self) -> QosClass {
        if self.request.is_zero() {
            QosClass::BestEffort
        } else if self.request == self.limit {
            QosClass::Guaranteed
        } else {
            QosClass::Burstable
        }
    }

    /// True if the pod tolerates every taint in the list.
    pub fn tolerates_all(&self, taints: &[Taint]) -> bool {
        taints
            .iter()
            .all(|t| self.tolerations.iter().any(|tol| tol.tolerates(t)))
    }

    /// True if the node labels satisfy the pod's node selector.
    pub fn selector_matches(&self, node_labels: &HashMap<String, String>) -> bool {
        self.node_selector
            .iter()
            .all(|(k, v)| node_labels.get(k) == Some(v))
    }
}

/// A pod and its placement state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub id: PodId,
    /// Owning workload, if any.
    pub workload_id: Option<WorkloadId>,
    pub spec: PodSpec,
    pub phase: PodPhase,
    /// The node the pod is bound to. `None` means the pod is Pending.
    pub assigned_node: Option<NodeId>,
    /// Why the pod is still Pending (e.g. "Unschedulable: ...").
    pub pending_reason: Option<String>,
    /// Simulated epoch seconds; also the scheduler's queue order key.
    pub created_at: u64,
    pub updated_at: u64,
}

impl PodRecord {
    /// Pods counting toward a workload's replica total.
    pub fn is_live(&self) -> bool {
        matches!(
            self.phase,
            PodPhase::Pending | PodPhase::Scheduled | PodPhase::Running
        )
    }
}

// ── Workload ──────────────────────────────────────────────────────

/// A replica-set-like workload: a template plus a desired replica count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub id: WorkloadId,
    pub desired_replicas: u32,
    /// Template stamped out for each owned pod.
    pub template: PodSpec,
    /// Monotonic counter used to mint owned pod ids.
    pub pod_seq: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(request: Resources, limit: Resources) -> PodSpec {
        PodSpec {
            request,
            limit,
            ..PodSpec::default()
        }
    }

    #[test]
    fn resources_fit_requires_every_dimension() {
        let avail = Resources::new(1000, 1024);

        assert!(Resources::new(1000, 1024).fits_within(&avail));
        assert!(Resources::new(500, 512).fits_within(&avail));
        // CPU fits, memory does not.
        assert!(!Resources::new(500, 2048).fits_within(&avail));
        // Memory fits, CPU does not.
        assert!(!Resources::new(2000, 512).fits_within(&avail));
    }

    #[test]
    fn resources_minus_saturates() {
        let a = Resources::new(100, 100);
        let b = Resources::new(200, 50);
        assert_eq!(a.minus(&b), Resources::new(0, 50));
    }

    #[test]
    fn qos_guaranteed_when_request_equals_limit() {
        let r = Resources::new(500, 1024);
        assert_eq!(spec(r, r).qos_class(), QosClass::Guaranteed);
    }

    #[test]
    fn qos_burstable_when_request_below_limit() {
        let s = spec(Resources::new(500, 1024), Resources::new(1000, 2048));
        assert_eq!(s.qos_class(), QosClass::Burstable);
    }

    #[test]
    fn qos_best_effort_when_no_request() {
        let s = spec(Resources::zero(), Resources::new(1000, 2048));
        assert_eq!(s.qos_class(), QosClass::BestEffort);

        // Zero request and zero limit is still best-effort, not guaranteed.
        let s = spec(Resources::zero(), Resources::zero());
        assert_eq!(s.qos_class(), QosClass::BestEffort);
    }

    #[test]
    fn toleration_matches_taint_by_key_and_value() {
        let taint = Taint {
            key: "dedicated".to_string(),
            value: "batch".to_string(),
            effect: TaintEffect::NoSchedule,
        };
        let tol = Toleration {
            key: "dedicated".to_string(),
            value: "batch".to_string(),
        };
        assert!(tol.tolerates(&taint));

        let wrong_value = Toleration {
            key: "dedicated".to_string(),
            value: "web".to_string(),
        };
        assert!(!wrong_value.tolerates(&taint));
    }

    #[test]
    fn tolerates_all_requires_every_taint_covered() {
        let taints = vec![
            Taint {
                key: "a".to_string(),
                value: "1".to_string(),
                effect: TaintEffect::NoSchedule,
            },
            Taint {
                key: "b".to_string(),
                value: "2".to_string(),
                effect: TaintEffect::NoSchedule,
            },
        ];

        let mut s = PodSpec::default();
        s.tolerations.push(Toleration {
            key: "a".to_string(),
            value: "1".to_string(),
        });
        assert!(!s.tolerates_all(&taints));

        s.tolerations.push(Toleration {
            key: "b".to_string(),
            value: "2".to_string(),
        });
        assert!(s.tolerates_all(&taints));
    }

    #[test]
    fn selector_matches_all_entries() {
        let mut s = PodSpec::default();
        s.node_selector
            .insert("zone".to_string(), "us-east-1a".to_string());

        let mut labels = HashMap::new();
        assert!(!s.selector_matches(&labels));

        labels.insert("zone".to_string(), "us-east-1a".to_string());
        assert!(s.selector_matches(&labels));
    }

    #[test]
    fn node_free_is_allocatable_minus_allocated() {
        let node = NodeRecord {
            id: "n1".to_string(),
            capacity: Resources::new(4000, 8192),
            allocatable: Resources::new(3800, 8000),
            allocated: Resources::new(800, 1000),
            labels: HashMap::new(),
            taints: Vec::new(),
            health: NodeHealth::Ready,
            last_heartbeat: 0,
        };
        assert_eq!(node.free(), Resources::new(3000, 7000));
    }
}
