//! Error types for the PodGrid state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("node already registered: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("pod not found: {0}")]
    PodNotFound(String),

    #[error("workload not found: {0}")]
    WorkloadNotFound(String),

    #[error("insufficient resources on node {node} for pod {pod}")]
    InsufficientResources { pod: String, node: String },

    /// The mutual-exclusion discipline failed somewhere: allocation
    /// bookkeeping no longer matches the bound pods. Never recovered from
    /// silently.
    #[error("allocation invariant violated: {0}")]
    InvariantViolation(String),
}
