//! Heartbeat monitor — marks silent nodes NotReady.
//!
//! Nodes are expected to heartbeat into the state store. The monitor's
//! `sweep` compares each Ready node's `last_heartbeat` against the timeout
//! and marks stale nodes NotReady, which evicts their pods back to Pending
//! and records a `NodeMarkedUnhealthy` event.

use tracing::{debug, warn};

use crate::error::StateResult;
use crate::events::{EventKind, EventLog};
use crate::store::StateStore;
use crate::types::{NodeHealth, NodeId};

/// Watches node heartbeats and drives Ready → NotReady transitions.
pub struct HeartbeatMonitor {
    state: StateStore,
    events: EventLog,
    /// Maximum silence (simulated seconds) before a node is unhealthy.
    timeout_secs: u64,
}

impl HeartbeatMonitor {
    pub fn new(state: StateStore, events: EventLog, timeout_secs: u64) -> Self {
        Self {
            state,
            events,
            timeout_secs,
        }
    }

    /// Check every Ready node's heartbeat age; mark stale nodes NotReady.
    ///
    /// Returns the ids of nodes marked unhealthy this sweep. Nodes already
    /// NotReady are left alone (their pods were evicted on transition).
    pub fn sweep(&self, now: u64) -> StateResult<Vec<NodeId>> {
        let mut unhealthy = Vec::new();

        for node in self.state.list_nodes()? {
            if node.health != NodeHealth::Ready {
                continue;
            }
            let age = now.saturating_sub(node.last_heartbeat);
            if age <= self.timeout_secs {
                continue;
            }

            let evicted = self
                .state
                .set_node_health(&node.id, NodeHealth::NotReady, now)?;
            warn!(
                node = %node.id,
                heartbeat_age = age,
                evicted = evicted.len(),
                "node missed heartbeat window, marked not ready"
            );
            self.events
                .record(EventKind::NodeMarkedUnhealthy { node: node.id.clone() }, now);
            unhealthy.push(node.id);
        }

        if !unhealthy.is_empty() {
            debug!(count = unhealthy.len(), "heartbeat sweep marked nodes unhealthy");
        }
        Ok(unhealthy)
    }
}
