//! Filter phase — which nodes can a pod land on at all.
//!
//! A node survives filtering only if every hard constraint passes:
//! remaining capacity fits the request in every dimension, node labels
//! satisfy the pod's selector, every taint is tolerated, and no required
//! anti-affinity rule is violated in the node's topology domain.

use std::collections::HashMap;

use podgrid_state::{AffinityMode, NodeRecord, PodRecord};

/// Why a node was rejected for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    InsufficientCapacity,
    SelectorMismatch,
    UntoleratedTaint,
    AntiAffinityConflict,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::InsufficientCapacity => "insufficient capacity",
            FilterReason::SelectorMismatch => "node selector mismatch",
            FilterReason::UntoleratedTaint => "untolerated taint",
            FilterReason::AntiAffinityConflict => "required anti-affinity conflict",
        }
    }
}

/// The topology domain a node belongs to for a given key.
///
/// Nodes without the label form their own single-node domain, so an
/// unlabeled cluster degrades to per-node anti-affinity rather than
/// one global domain.
pub fn topology_domain(node: &NodeRecord, key: &str) -> String {
    node.labels
        .get(key)
        .cloned()
        .unwrap_or_else(|| format!("node:{}", node.id))
}

/// True if `labels` carries every entry of `selector`.
pub fn labels_match(labels: &HashMap<String, String>, selector: &HashMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Run the filter phase for one pod over the candidate nodes.
///
/// `all_nodes` and `bound_pods` provide the cluster context needed to
/// evaluate anti-affinity (a conflict may come from a pod on a different
/// node in the same topology domain). Returns the feasible nodes and the
/// rejection reason per eliminated node.
pub fn filter_nodes<'a>(
    pod: &PodRecord,
    candidates: &'a [NodeRecord],
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
) -> (Vec<&'a NodeRecord>, Vec<(String, FilterReason)>) {
    let mut feasible = Vec::new();
    let mut rejected = Vec::new();

    for node in candidates {
        if let Some(reason) = check_node(pod, node, all_nodes, bound_pods) {
            rejected.push((node.id.clone(), reason));
        } else {
            feasible.push(node);
        }
    }

    (feasible, rejected)
}

/// Evaluate all hard constraints for one node. `None` means feasible.
fn check_node(
    pod: &PodRecord,
    node: &NodeRecord,
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
) -> Option<FilterReason> {
    if !pod.spec.request.fits_within(&node.free()) {
        return Some(FilterReason::InsufficientCapacity);
    }
    if !pod.spec.selector_matches(&node.labels) {
        return Some(FilterReason::SelectorMismatch);
    }
    if !pod.spec.tolerates_all(&node.taints) {
        return Some(FilterReason::UntoleratedTaint);
    }
    if violates_required_anti_affinity(pod, node, all_nodes, bound_pods) {
        return Some(FilterReason::AntiAffinityConflict);
    }
    None
}

/// A required anti-affinity rule is violated when any already-bound pod
/// matching the rule's selector sits in the same topology domain as the
/// candidate node.
fn violates_required_anti_affinity(
    pod: &PodRecord,
    node: &NodeRecord,
    all_nodes: &[NodeRecord],
    bound_pods: &[PodRecord],
) -> bool {
    pod.spec
        .affinity
        .iter()
        .filter(|rule| rule.mode == AffinityMode::Required)
        .any(|rule| {
            let domain = topology_domain(node, &rule.topology_key);
            bound_pods.iter().any(|other| {
                other.id != pod.id
                    && labels_match(&other.spec.labels, &rule.match_labels)
                    && pod_domain(other, all_nodes, &rule.topology_key).as_deref()
                        == Some(domain.as_str())
            })
        })
}

/// The topology domain a bound pod currently occupies, if any.
fn pod_domain(pod: &PodRecord, all_nodes: &[NodeRecord], key: &str) -> Option<String> {
    let node_id = pod.assigned_node.as_deref()?;
    let node = all_nodes.iter().find(|n| n.id == node_id)?;
    Some(topology_domain(node, key))
}
