//! Error types for the clustering library

use thiserror::Error;

/// Errors returned by the clustering algorithms and their collaborators
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// A configuration value is outside its valid range
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// The clustering does not cover the same nodes as the network
    #[error("clustering has {clustering} nodes but the network has {network}")]
    SizeMismatch {
        /// Nodes in the clustering
        clustering: usize,
        /// Nodes in the network
        network: usize,
    },

    /// The network adjacency is inconsistent
    #[error("malformed network: {0}")]
    MalformedNetwork(String),

    /// A local moving worker panicked before the queue drained
    #[error("local moving worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker in the pool
        worker: usize,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl ClusteringError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        ClusteringError::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
