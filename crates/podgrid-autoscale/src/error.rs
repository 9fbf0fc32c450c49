//! Autoscaler error types.

use thiserror::Error;

/// Errors that can occur during replica reconciliation.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("no workload registered for binding: {0}")]
    WorkloadNotFound(String),

    #[error("binding for {workload}: min_replicas {min} exceeds max_replicas {max}")]
    InvalidReplicaBounds { workload: String, min: u32, max: u32 },

    #[error("state store error: {0}")]
    State(#[from] podgrid_state::StateError),
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
