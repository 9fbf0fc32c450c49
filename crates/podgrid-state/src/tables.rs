//! redb table definitions for the PodGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types), except the metadata table which holds bare counters.

use redb::TableDefinition;

/// Node records keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Pod records keyed by `{pod_id}`.
pub const PODS: TableDefinition<&str, &[u8]> = TableDefinition::new("pods");

/// Workload records keyed by `{workload_id}`.
pub const WORKLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("workloads");

/// Counters (e.g. the standalone pod id sequence) keyed by name.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
