//! Score phase — rank the feasible nodes for a pod.
//!
//! Two sub-scores, each normalized to [0, 100], combined as a weighted
//! sum:
//! - **balance**: prefer nodes whose remaining CPU and memory stay in
//!   proportion after placement (penalize skewing one dimension dry)
//! - **spread**: prefer topology domains holding fewer replicas of the
//!   same workload; preferred anti-affinity rules subtract weight-scaled
//!   penalties here
//!
//! Scores are pure functions of the cluster state, so identical state
//! always ranks identically.

use podgrid_state::{AffinityMode, NodeRecord, PodRecord};

use crate::filter::{labels_match, topology_domain};

/// Weights for the scoring components. Default is an even split.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub balance: f64,
    pub spread: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            balance: 0.5,
            spread: 0.5,
        }
    }
}

/// Individual score components for debugging.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub balance: f64,
    pub spread: f64,
}

/// Scored result for a single node. Higher total is better.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_id: String,
    pub total: f64,
    pub breakdown: ScoreBreakdown,
}

/// Score a single feasible node for the given pod.
pub fn score_node(
    pod: &PodRecord,
    node: &NodeRecord,
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
    topology_key: &str,
    weights: &ScoringWeights,
) -> NodeScore {
    let balance = balance_score(pod, node);
    let spread = spread_score(pod, node, all_nodes, bound_pods, topology_key);

    NodeScore {
        node_id: node.id.clone(),
        total: weights.balance * balance + weights.spread * spread,
        breakdown: ScoreBreakdown { balance, spread },
    }
}

/// Score all feasible nodes and return them best-first.
///
/// Ties are broken by the lowest node id — a total order, so two runs
/// over the same state pick the same node.
pub fn rank_nodes(
    pod: &PodRecord,
    feasible: &[&NodeRecord],
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
    topology_key: &str,
    weights: &ScoringWeights,
) -> Vec<NodeScore> {
    let mut scores: Vec<NodeScore> = feasible
        .iter()
        .map(|n| score_node(pod, n, all_nodes, bound_pods, topology_key, weights))
        .collect();

    scores.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    scores
}

/// How balanced the node's remaining CPU/memory would be after placement.
fn balance_score(pod: &PodRecord, node: &NodeRecord) -> f64 {
    let free_after = node.free().minus(&pod.spec.request);

    let cpu_frac = if node.allocatable.cpu_millis > 0 {
        free_after.cpu_millis as f64 / node.allocatable.cpu_millis as f64
    } else {
        0.0
    };
    let mem_frac = if node.allocatable.memory_bytes > 0 {
        free_after.memory_bytes as f64 / node.allocatable.memory_bytes as f64
    } else {
        0.0
    };

    (1.0 - (cpu_frac - mem_frac).abs()) * 100.0
}

/// How empty the node's topology domain is of this workload's replicas,
/// minus preferred anti-affinity penalties.
fn spread_score(
    pod: &PodRecord,
    node: &NodeRecord,
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
    topology_key: &str,
) -> f64 {
    let domain = topology_domain(node, topology_key);

    let replicas_in_domain = match &pod.workload_id {
        Some(workload) => bound_pods
            .iter()
            .filter(|p| {
                p.workload_id.as_deref() == Some(workload.as_str())
                    && bound_pod_domain(p, all_nodes, topology_key).as_deref()
                        == Some(domain.as_str())
            })
            .count(),
        None => 0,
    };
    let base = 100.0 / (1.0 + replicas_in_domain as f64);

    let penalty: f64 = pod
        .spec
        .affinity
        .iter()
        .filter(|rule| rule.mode == AffinityMode::Preferred)
        .filter(|rule| {
            let rule_domain = topology_domain(node, &rule.topology_key);
            bound_pods.iter().any(|other| {
                other.id != pod.id
                    && labels_match(&other.spec.labels, &rule.match_labels)
                    && bound_pod_domain(other, all_nodes, &rule.topology_key).as_deref()
                        == Some(rule_domain.as_str())
            })
        })
        .map(|rule| f64::from(rule.weight))
        .sum();

    (base - penalty).clamp(0.0, 100.0)
}

fn bound_pod_domain(pod: &PodRecord, all_nodes: &[NodeRecord], key: &str) -> Option<String> {
    let node_id = pod.assigned_node.as_deref()?;
    let node = all_nodes.iter().find(|n| n.id == node_id)?;
    Some(topology_domain(node, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_state::*;
    use std::collections::HashMap;

    fn node(id: &str, cpu: u64, mem: u64) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            capacity: Resources::new(cpu, mem),
            allocatable: Resources::new(cpu, mem),
            allocated: Resources::zero(),
            labels: HashMap::new(),
            taints: Vec::new(),
            health: NodeHealth::Ready,
            last_heartbeat: 0,
        }
    }

    fn workload_pod(id: &str, workload: &str, cpu: u64, mem: u64) -> PodRecord {
        PodRecord {
            id: id.to_string(),
            workload_id: Some(workload.to_string()),
            spec: PodSpec {
                request: Resources::new(cpu, mem),
                limit: Resources::new(cpu, mem),
                ..PodSpec::default()
            },
            phase: PodPhase::Pending,
            assigned_node: None,
            pending_reason: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn balance_prefers_proportional_remainder() {
        // Node A would be left with 50% CPU / 50% memory; node B with
        // 50% CPU / 10% memory. A should win on balance.
        let mut a = node("a", 1000, 1000);
        a.allocated = Resources::new(400, 400);
        let mut b = node("b", 1000, 1000);
        b.allocated = Resources::new(400, 800);

        let p = workload_pod("p1", "web", 100, 100);
        let weights = ScoringWeights {
            balance: 1.0,
            spread: 0.0,
        };

        let sa = score_node(&p, &a, &[], &[], "zone", &weights);
        let sb = score_node(&p, &b, &[], &[], "zone", &weights);
        assert!(sa.total > sb.total);
    }

    #[test]
    fn perfectly_balanced_node_scores_100() {
        let n = node("a", 1000, 1000);
        let p = workload_pod("p1", "web", 100, 100);
        let weights = ScoringWeights {
            balance: 1.0,
            spread: 0.0,
        };

        let s = score_node(&p, &n, &[], &[], "zone", &weights);
        assert!((s.total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn spread_prefers_emptier_domain() {
        let mut a = node("a", 1000, 1000);
        a.labels.insert("zone".to_string(), "east".to_string());
        let mut b = node("b", 1000, 1000);
        b.labels.insert("zone".to_string(), "west".to_string());
        let all = vec![a.clone(), b.clone()];

        // Two web replicas already in east, none in west.
        let mut p0 = workload_pod("p0", "web", 10, 10);
        p0.assigned_node = Some("a".to_string());
        let mut p1 = workload_pod("p1", "web", 10, 10);
        p1.assigned_node = Some("a".to_string());
        let bound = vec![p0, p1];

        let incoming = workload_pod("p2", "web", 10, 10);
        let weights = ScoringWeights {
            balance: 0.0,
            spread: 1.0,
        };

        let east = score_node(&incoming, &a, &all, &bound, "zone", &weights);
        let west = score_node(&incoming, &b, &all, &bound, "zone", &weights);
        assert!(west.total > east.total);
        // 100/(1+2) vs 100/(1+0).
        assert!((east.total - 100.0 / 3.0).abs() < 1e-9);
        assert!((west.total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn preferred_anti_affinity_penalizes_occupied_domain() {
        let mut a = node("a", 1000, 1000);
        a.labels.insert("zone".to_string(), "east".to_string());
        let mut b = node("b", 1000, 1000);
        b.labels.insert("zone".to_string(), "west".to_string());
        let all = vec![a.clone(), b.clone()];

        let mut occupant = workload_pod("p0", "cache", 10, 10);
        occupant.spec.labels.insert("app".to_string(), "cache".to_string());
        occupant.assigned_node = Some("a".to_string());
        let bound = vec![occupant];

        // Different workload, so workload spread is neutral; only the
        // preferred rule differentiates.
        let mut incoming = workload_pod("p1", "web", 10, 10);
        incoming.spec.affinity.push(AffinityRule {
            topology_key: "zone".to_string(),
            match_labels: HashMap::from([("app".to_string(), "cache".to_string())]),
            mode: AffinityMode::Preferred,
            weight: 50,
        });

        let weights = ScoringWeights {
            balance: 0.0,
            spread: 1.0,
        };
        let east = score_node(&incoming, &a, &all, &bound, "zone", &weights);
        let west = score_node(&incoming, &b, &all, &bound, "zone", &weights);

        assert!((east.total - 50.0).abs() < 1e-9);
        assert!((west.total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rank_breaks_ties_by_lowest_node_id() {
        // Identical empty nodes score identically; "a" must come first.
        let a = node("a", 1000, 1000);
        let b = node("b", 1000, 1000);
        let feasible = vec![&b, &a];
        let all = vec![a.clone(), b.clone()];

        let p = workload_pod("p1", "web", 100, 100);
        let ranked = rank_nodes(&p, &feasible, &all, &[], "zone", &ScoringWeights::default());

        assert_eq!(ranked[0].node_id, "a");
        assert_eq!(ranked[1].node_id, "b");
        assert!((ranked[0].total - ranked[1].total).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_range() {
        let mut n = node("a", 1000, 1000);
        n.allocated = Resources::new(900, 100);
        let p = workload_pod("p1", "web", 50, 50);

        let s = score_node(&p, &n, &[], &[], "zone", &ScoringWeights::default());
        assert!(s.breakdown.balance >= 0.0 && s.breakdown.balance <= 100.0);
        assert!(s.breakdown.spread >= 0.0 && s.breakdown.spread <= 100.0);
        assert!(s.total >= 0.0 && s.total <= 100.0);
    }
}
