//! PodGrid scheduler — two-phase placement of pending pods.
//!
//! Each pass drains the pending queue in creation order. Per pod, the
//! filter phase eliminates nodes that fail a hard constraint, the score
//! phase ranks the survivors, and the pod is bound to the best node
//! through the state store's atomic bind operation.

pub mod error;
pub mod filter;
pub mod scheduler;
pub mod scorer;

pub use error::{SchedulerError, SchedulerResult};
pub use filter::{FilterReason, filter_nodes, topology_domain};
pub use scheduler::{PassSummary, Scheduler};
pub use scorer::{NodeScore, ScoringWeights, rank_nodes, score_node};
