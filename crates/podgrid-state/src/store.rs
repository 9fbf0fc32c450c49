//! StateStore — redb-backed cluster state for PodGrid.
//!
//! The authoritative view of nodes, pods, and workloads. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Every mutation runs in a single redb write transaction. Write
//! transactions are serialized by redb, which is what makes `bind_pod`
//! atomic: two binds racing for the last slice of a node's capacity are
//! applied one after the other, and the second sees the first's
//! allocation and fails with `InsufficientResources` instead of
//! overcommitting.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Meta-table key for the standalone pod id sequence.
const POD_SEQ_KEY: &str = "pod_seq";

fn to_bytes<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe cluster state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing and simulation).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(PODS).map_err(map_err!(Table))?;
        txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Register a new node. Fails if the id is already taken.
    pub fn register_node(&self, node: &NodeRecord) -> StateResult<()> {
        let value = to_bytes(node)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            let exists = table
                .get(node.id.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if exists {
                return Err(StateError::DuplicateNode(node.id.clone()));
            }
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node = %node.id, "node registered");
        Ok(())
    }

    /// Remove a node from the cluster, evicting every pod bound to it.
    ///
    /// Returns the ids of the evicted pods (all flipped back to Pending).
    pub fn remove_node(&self, node_id: &str, now: u64) -> StateResult<Vec<PodId>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let evicted;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let existed = nodes
                .remove(node_id)
                .map_err(map_err!(Write))?
                .is_some();
            if !existed {
                return Err(StateError::NodeNotFound(node_id.to_string()));
            }

            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            evicted = evict_pods_on_node(&mut pods, node_id, "node removed", now)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node = %node_id, evicted = evicted.len(), "node removed");
        Ok(evicted)
    }

    /// Update a node's health status.
    ///
    /// A transition to `NotReady` evicts all bound pods (they return to
    /// Pending and the node's allocation is zeroed). Returns the evicted
    /// pod ids, empty for any other transition.
    pub fn set_node_health(
        &self,
        node_id: &str,
        health: NodeHealth,
        now: u64,
    ) -> StateResult<Vec<PodId>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let evicted;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut node: NodeRecord = match nodes.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::NodeNotFound(node_id.to_string())),
            };

            let was_not_ready = node.health == NodeHealth::NotReady;
            node.health = health;

            evicted = if health == NodeHealth::NotReady && !was_not_ready {
                node.allocated = Resources::zero();
                let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
                evict_pods_on_node(&mut pods, node_id, "node not ready", now)?
            } else {
                Vec::new()
            };

            let value = to_bytes(&node)?;
            nodes
                .insert(node_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(evicted)
    }

    /// Refresh a node's heartbeat timestamp.
    pub fn heartbeat(&self, node_id: &str, now: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut node: NodeRecord = match nodes.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::NodeNotFound(node_id.to_string())),
            };
            node.last_heartbeat = now;
            let value = to_bytes(&node)?;
            nodes
                .insert(node_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<NodeRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all nodes, ordered by id.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(from_bytes(value.value())?);
        }
        Ok(results)
    }

    /// List nodes currently accepting pods (health == Ready), ordered by id.
    pub fn list_ready_nodes(&self) -> StateResult<Vec<NodeRecord>> {
        let mut nodes = self.list_nodes()?;
        nodes.retain(|n| n.health == NodeHealth::Ready);
        Ok(nodes)
    }

    // ── Pods ───────────────────────────────────────────────────────

    /// Create a standalone Pending pod, returning its minted id.
    pub fn create_pod(&self, spec: &PodSpec, now: u64) -> StateResult<PodId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let pod_id;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let seq = match meta.get(POD_SEQ_KEY).map_err(map_err!(Read))? {
                Some(guard) => guard.value(),
                None => 0,
            };
            meta.insert(POD_SEQ_KEY, seq + 1).map_err(map_err!(Write))?;
            pod_id = format!("pod-{seq}");

            let pod = PodRecord {
                id: pod_id.clone(),
                workload_id: None,
                spec: spec.clone(),
                phase: PodPhase::Pending,
                assigned_node: None,
                pending_reason: None,
                created_at: now,
                updated_at: now,
            };
            let value = to_bytes(&pod)?;
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            pods.insert(pod_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pod = %pod_id, "pod created");
        Ok(pod_id)
    }

    /// Create a Pending pod owned by a workload, stamped from its template.
    ///
    /// The pod id is `{workload_id}-{seq}` with a per-workload monotonic
    /// sequence, so replica ids are deterministic across runs.
    pub fn create_workload_pod(&self, workload_id: &str, now: u64) -> StateResult<PodId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let pod_id;
        {
            let mut workloads = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let mut workload: WorkloadRecord =
                match workloads.get(workload_id).map_err(map_err!(Read))? {
                    Some(guard) => from_bytes(guard.value())?,
                    None => return Err(StateError::WorkloadNotFound(workload_id.to_string())),
                };

            workload.pod_seq += 1;
            pod_id = format!("{}-{}", workload_id, workload.pod_seq);
            workload.updated_at = now;

            let pod = PodRecord {
                id: pod_id.clone(),
                workload_id: Some(workload_id.to_string()),
                spec: workload.template.clone(),
                phase: PodPhase::Pending,
                assigned_node: None,
                pending_reason: None,
                created_at: now,
                updated_at: now,
            };

            let value = to_bytes(&workload)?;
            workloads
                .insert(workload_id, value.as_slice())
                .map_err(map_err!(Write))?;
            let value = to_bytes(&pod)?;
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            pods.insert(pod_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pod = %pod_id, workload = %workload_id, "workload pod created");
        Ok(pod_id)
    }

    /// Bind a Pending pod to a node, atomically checking capacity.
    ///
    /// The capacity check and the allocation bump happen in one write
    /// transaction, so concurrent binds against the same node can never
    /// overcommit it. Fails fast with `InsufficientResources` when the
    /// pod's request no longer fits.
    pub fn bind_pod(&self, pod_id: &str, node_id: &str, now: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;

            let mut pod: PodRecord = match pods.get(pod_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::PodNotFound(pod_id.to_string())),
            };
            let mut node: NodeRecord = match nodes.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::NodeNotFound(node_id.to_string())),
            };

            if let Some(bound) = &pod.assigned_node {
                return Err(StateError::InvariantViolation(format!(
                    "pod {pod_id} is already bound to node {bound}"
                )));
            }
            if !node.allocated.fits_within(&node.allocatable) {
                return Err(StateError::InvariantViolation(format!(
                    "node {node_id} allocation already exceeds allocatable"
                )));
            }
            if !pod.spec.request.fits_within(&node.free()) {
                return Err(StateError::InsufficientResources {
                    pod: pod_id.to_string(),
                    node: node_id.to_string(),
                });
            }

            node.allocated = node.allocated.plus(&pod.spec.request);
            pod.assigned_node = Some(node_id.to_string());
            pod.phase = PodPhase::Scheduled;
            pod.pending_reason = None;
            pod.updated_at = now;

            let value = to_bytes(&node)?;
            nodes
                .insert(node_id, value.as_slice())
                .map_err(map_err!(Write))?;
            let value = to_bytes(&pod)?;
            pods.insert(pod_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pod = %pod_id, node = %node_id, "pod bound");
        Ok(())
    }

    /// Unbind a pod from its node, returning it to Pending.
    ///
    /// A no-op for pods that are not bound.
    pub fn unbind_pod(&self, pod_id: &str, now: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            let mut pod: PodRecord = match pods.get(pod_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::PodNotFound(pod_id.to_string())),
            };

            if let Some(node_id) = pod.assigned_node.take() {
                let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
                // The node may already be gone (removed with eviction).
                // Decoded into a local so the read guard is released
                // before the insert below re-borrows the table.
                let loaded = nodes
                    .get(node_id.as_str())
                    .map_err(map_err!(Read))?
                    .map(|g| from_bytes::<NodeRecord>(g.value()))
                    .transpose()?;
                if let Some(mut node) = loaded {
                    node.allocated = node.allocated.minus(&pod.spec.request);
                    let value = to_bytes(&node)?;
                    nodes
                        .insert(node_id.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                }
            }

            pod.phase = PodPhase::Pending;
            pod.updated_at = now;
            let value = to_bytes(&pod)?;
            pods.insert(pod_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Delete a pod, releasing its allocation first if bound.
    ///
    /// Returns true if the pod existed.
    pub fn delete_pod(&self, pod_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            let pod: Option<PodRecord> = pods
                .remove(pod_id)
                .map_err(map_err!(Write))?
                .map(|g| from_bytes(g.value()))
                .transpose()?;
            existed = pod.is_some();

            if let Some(pod) = pod
                && let Some(node_id) = &pod.assigned_node
            {
                let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
                let loaded = nodes
                    .get(node_id.as_str())
                    .map_err(map_err!(Read))?
                    .map(|g| from_bytes::<NodeRecord>(g.value()))
                    .transpose()?;
                if let Some(mut node) = loaded {
                    node.allocated = node.allocated.minus(&pod.spec.request);
                    let value = to_bytes(&node)?;
                    nodes
                        .insert(node_id.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pod = %pod_id, existed, "pod deleted");
        Ok(existed)
    }

    /// Promote a Scheduled pod to Running (the kubelet's job, simulated).
    ///
    /// Returns true if the pod transitioned.
    pub fn mark_pod_running(&self, pod_id: &str, now: u64) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let changed;
        {
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            let mut pod: PodRecord = match pods.get(pod_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::PodNotFound(pod_id.to_string())),
            };
            changed = pod.phase == PodPhase::Scheduled;
            if changed {
                pod.phase = PodPhase::Running;
                pod.updated_at = now;
                let value = to_bytes(&pod)?;
                pods.insert(pod_id, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(changed)
    }

    /// Record why a Pending pod could not be placed this pass.
    pub fn mark_pod_unschedulable(
        &self,
        pod_id: &str,
        reason: &str,
        now: u64,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut pods = txn.open_table(PODS).map_err(map_err!(Table))?;
            let mut pod: PodRecord = match pods.get(pod_id).map_err(map_err!(Read))? {
                Some(guard) => from_bytes(guard.value())?,
                None => return Err(StateError::PodNotFound(pod_id.to_string())),
            };
            pod.pending_reason = Some(reason.to_string());
            pod.updated_at = now;
            let value = to_bytes(&pod)?;
            pods.insert(pod_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a pod by id.
    pub fn get_pod(&self, pod_id: &str) -> StateResult<Option<PodRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PODS).map_err(map_err!(Table))?;
        match table.get(pod_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all pods.
    pub fn list_pods(&self) -> StateResult<Vec<PodRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PODS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(from_bytes(value.value())?);
        }
        Ok(results)
    }

    /// List Pending pods in the scheduler's deterministic queue order:
    /// creation time first, id as the tiebreak.
    pub fn list_unscheduled_pods(&self) -> StateResult<Vec<PodRecord>> {
        let mut pods = self.list_pods()?;
        pods.retain(|p| p.phase == PodPhase::Pending);
        pods.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pods)
    }

    /// List pods bound to a given node.
    pub fn list_pods_on_node(&self, node_id: &str) -> StateResult<Vec<PodRecord>> {
        let mut pods = self.list_pods()?;
        pods.retain(|p| p.assigned_node.as_deref() == Some(node_id));
        Ok(pods)
    }

    /// List pods owned by a workload.
    pub fn list_pods_for_workload(&self, workload_id: &str) -> StateResult<Vec<PodRecord>> {
        let mut pods = self.list_pods()?;
        pods.retain(|p| p.workload_id.as_deref() == Some(workload_id));
        Ok(pods)
    }

    // ── Workloads ──────────────────────────────────────────────────

    /// Insert or update a workload.
    pub fn put_workload(&self, workload: &WorkloadRecord) -> StateResult<()> {
        let value = to_bytes(workload)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            table
                .insert(workload.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(workload = %workload.id, "workload stored");
        Ok(())
    }

    /// Get a workload by id.
    pub fn get_workload(&self, workload_id: &str) -> StateResult<Option<WorkloadRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        match table.get(workload_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all workloads, ordered by id.
    pub fn list_workloads(&self) -> StateResult<Vec<WorkloadRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(from_bytes(value.value())?);
        }
        Ok(results)
    }

    /// Set a workload's desired replica count.
    ///
    /// This is the single serialization point for replica-count updates:
    /// write transactions cannot interleave, so no scaling decision can be
    /// lost to a concurrent writer.
    pub fn set_desired_replicas(
        &self,
        workload_id: &str,
        replicas: u32,
        now: u64,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let mut workload: WorkloadRecord =
                match table.get(workload_id).map_err(map_err!(Read))? {
                    Some(guard) => from_bytes(guard.value())?,
                    None => return Err(StateError::WorkloadNotFound(workload_id.to_string())),
                };
            workload.desired_replicas = replicas;
            workload.updated_at = now;
            let value = to_bytes(&workload)?;
            table
                .insert(workload_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Invariant checking ─────────────────────────────────────────

    /// Recompute per-node allocations from bound pods and compare against
    /// the stored bookkeeping.
    ///
    /// Any mismatch or overcommit is an `InvariantViolation`: it means the
    /// serialized-mutation discipline was bypassed somewhere.
    pub fn verify_allocations(&self) -> StateResult<()> {
        let nodes = self.list_nodes()?;
        let pods = self.list_pods()?;

        for node in &nodes {
            let mut sum = Resources::zero();
            for pod in &pods {
                if pod.assigned_node.as_deref() == Some(node.id.as_str()) {
                    sum = sum.plus(&pod.spec.request);
                }
            }
            if sum != node.allocated {
                return Err(StateError::InvariantViolation(format!(
                    "node {}: allocated {:?} does not match bound pod sum {:?}",
                    node.id, node.allocated, sum
                )));
            }
            if !sum.fits_within(&node.allocatable) {
                return Err(StateError::InvariantViolation(format!(
                    "node {}: bound pod sum {:?} exceeds allocatable {:?}",
                    node.id, sum, node.allocatable
                )));
            }
        }

        for pod in &pods {
            if let Some(node_id) = &pod.assigned_node
                && !nodes.iter().any(|n| &n.id == node_id)
            {
                return Err(StateError::InvariantViolation(format!(
                    "pod {} is bound to unknown node {}",
                    pod.id, node_id
                )));
            }
        }

        Ok(())
    }
}

/// Flip every pod bound to `node_id` back to Pending.
///
/// Runs inside the caller's write transaction so eviction is atomic with
/// the node mutation that triggered it.
fn evict_pods_on_node(
    pods: &mut Table<'_, &'static str, &'static [u8]>,
    node_id: &str,
    reason: &str,
    now: u64,
) -> StateResult<Vec<PodId>> {
    let mut bound: Vec<PodRecord> = Vec::new();
    {
        for entry in pods.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let pod: PodRecord = from_bytes(value.value())?;
            if pod.assigned_node.as_deref() == Some(node_id) {
                bound.push(pod);
            }
        }
    }

    let mut evicted = Vec::with_capacity(bound.len());
    for mut pod in bound {
        pod.assigned_node = None;
        pod.phase = PodPhase::Pending;
        pod.pending_reason = Some(reason.to_string());
        pod.updated_at = now;
        let value = to_bytes(&pod)?;
        pods.insert(pod.id.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
        evicted.push(pod.id);
    }
    Ok(evicted)
}
