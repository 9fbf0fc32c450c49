//! podgrid-state — the PodGrid cluster state store.
//!
//! Backed by [redb](https://docs.rs/redb), provides the authoritative
//! in-memory or on-disk view of nodes, pods, and workloads, plus the
//! ordered cluster event log and the heartbeat monitor.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Every mutation (register, bind, unbind, replica-count change) is one
//! write transaction; redb serializes writers, which is what gives
//! `bind_pod` its no-overcommit atomicity and replica updates their
//! lost-update freedom.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and is the sole shared mutable resource between the
//! scheduler and autoscaler loops.

pub mod clock;
pub mod error;
pub mod events;
pub mod health;
pub mod store;
pub mod tables;
pub mod types;

pub use clock::SimClock;
pub use error::{StateError, StateResult};
pub use events::{ClusterEvent, EventKind, EventLog};
pub use health::HeartbeatMonitor;
pub use store::StateStore;
pub use types::*;
