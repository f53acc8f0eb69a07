//! Configuration management for the CPM cluster analyzer

use crate::error::ClusteringError;
use crate::graph::NodeWeighting;

/// Default number of local moving workers
pub const DEFAULT_NUM_WORKERS: usize = 7;

/// Default number of nodes a worker takes from the queue at once
pub const DEFAULT_BATCH_SIZE: usize = 7;

/// Default configuration for the CPM cluster analyzer
#[derive(Debug, Clone)]
pub struct Config {
    /// CPM resolution parameter
    pub resolution: f64,

    /// Number of local moving passes (0 = repeat until a pass changes nothing)
    pub n_iterations: usize,

    /// Number of worker threads in a parallel pass
    pub num_workers: usize,

    /// Nodes popped from the work queue per batch
    pub batch_size: usize,

    /// Seed for the node visiting order (None = seeded from entropy)
    pub seed: Option<u64>,

    /// How node weights are derived when loading a network
    pub node_weighting: NodeWeighting,

    /// Minimum cluster size included in the cluster report
    pub min_cluster_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            n_iterations: 0,
            num_workers: DEFAULT_NUM_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
            node_weighting: NodeWeighting::Unit,
            min_cluster_size: 1,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values
    pub fn new(
        resolution: f64,
        n_iterations: usize,
        num_workers: usize,
        batch_size: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            resolution,
            n_iterations,
            num_workers,
            batch_size,
            seed,
            ..Self::default()
        }
    }

    /// Reject values the local moving algorithm cannot run with
    pub fn validate(&self) -> Result<(), ClusteringError> {
        validate_resolution(self.resolution)?;
        if self.num_workers == 0 {
            return Err(ClusteringError::invalid("num_workers", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ClusteringError::invalid("batch_size", "must be at least 1"));
        }
        Ok(())
    }
}

pub(crate) fn validate_resolution(resolution: f64) -> Result<(), ClusteringError> {
    if !resolution.is_finite() || resolution < 0.0 {
        return Err(ClusteringError::invalid(
            "resolution",
            format!("must be a finite non-negative number, got {}", resolution),
        ));
    }
    Ok(())
}
