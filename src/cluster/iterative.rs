//! Iterative improvement of a CPM clustering

use crate::cluster::Clustering;
use crate::error::ClusteringError;
use crate::graph::Network;

/// A clustering algorithm that improves a CPM clustering one pass at a time
pub trait IterativeCpmClustering {
    /// CPM resolution parameter
    fn resolution(&self) -> f64;

    /// Number of passes run by `improve_clustering` (0 = until stable)
    fn n_iterations(&self) -> usize;

    /// Run one pass; returns whether the clustering changed
    fn improve_clustering_one_iteration(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
    ) -> Result<bool, ClusteringError>;

    /// Run `n_iterations` passes, or passes until one changes nothing when
    /// `n_iterations` is 0. Returns whether any pass changed the clustering.
    fn improve_clustering(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
    ) -> Result<bool, ClusteringError> {
        if clustering.n_nodes() != network.node_count() {
            return Err(ClusteringError::SizeMismatch {
                clustering: clustering.n_nodes(),
                network: network.node_count(),
            });
        }

        let mut update = false;
        if self.n_iterations() > 0 {
            for iteration in 0..self.n_iterations() {
                let changed = self.improve_clustering_one_iteration(network, clustering)?;
                log::debug!("Iteration {}: changed = {}", iteration + 1, changed);
                update |= changed;
            }
        } else {
            let mut iteration = 0;
            loop {
                iteration += 1;
                let changed = self.improve_clustering_one_iteration(network, clustering)?;
                log::debug!("Iteration {}: changed = {}", iteration, changed);
                update |= changed;
                if !changed {
                    break;
                }
            }
            log::info!("Local moving converged after {} iterations", iteration);
        }
        Ok(update)
    }
}
