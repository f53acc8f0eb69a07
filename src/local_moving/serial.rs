//! Single-threaded fast local moving

use std::collections::VecDeque;
use rand::Rng;
use crate::cluster::Clustering;
use crate::cluster::iterative::IterativeCpmClustering;
use crate::config::validate_resolution;
use crate::error::ClusteringError;
use crate::graph::Network;
use crate::permutation::generate_random_permutation;

/// Fast local moving on one thread
///
/// Nodes are visited from a FIFO queue seeded with a random permutation.
/// After a move, neighbors outside the new cluster that are not queued are
/// appended. Given the same random generator it makes the same decisions as
/// the parallel algorithm run with one worker and a batch size of one.
pub struct SerialFastLocalMoving<R> {
    resolution: f64,
    n_iterations: usize,
    random: R,
}

impl<R: Rng> SerialFastLocalMoving<R> {
    /// Create the algorithm for a resolution and number of passes
    pub fn new(resolution: f64, n_iterations: usize, random: R) -> Self {
        Self { resolution, n_iterations, random }
    }
}

impl<R: Rng> IterativeCpmClustering for SerialFastLocalMoving<R> {
    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    fn improve_clustering_one_iteration(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
    ) -> Result<bool, ClusteringError> {
        validate_resolution(self.resolution)?;
        if clustering.n_nodes() != network.node_count() {
            return Err(ClusteringError::SizeMismatch {
                clustering: clustering.n_nodes(),
                network: network.node_count(),
            });
        }

        let n = network.node_count();
        if n <= 1 {
            return Ok(false);
        }

        let mut cluster_weights = clustering.cluster_weights(network);
        let mut n_nodes_per_cluster = clustering.n_nodes_per_cluster();
        let mut next_unused = clustering.n_clusters();

        let mut edge_weight_per_cluster = vec![f64::NAN; cluster_weights.len().max(n)];
        let mut neighboring_clusters: Vec<usize> = Vec::with_capacity(n);

        let mut queue: VecDeque<usize> = generate_random_permutation(n, &mut self.random).into();
        let mut in_queue = vec![true; n];
        let mut update = false;

        while let Some(node) = queue.pop_front() {
            in_queue[node] = false;

            let current = clustering.cluster_of(node);
            let fresh = next_unused;
            next_unused += 1;

            for (neighbor, weight) in network.neighbors(node) {
                let cluster = clustering.cluster_of(neighbor);
                if cluster >= edge_weight_per_cluster.len() {
                    edge_weight_per_cluster.resize(cluster + 1, f64::NAN);
                }
                if edge_weight_per_cluster[cluster].is_nan() {
                    edge_weight_per_cluster[cluster] = 0.0;
                    neighboring_clusters.push(cluster);
                }
                edge_weight_per_cluster[cluster] += weight;
            }

            let weight_of = |cluster: usize| cluster_weights.get(cluster).copied().unwrap_or(0.0);
            let edge_to = |cluster: usize| match edge_weight_per_cluster.get(cluster) {
                Some(weight) if !weight.is_nan() => *weight,
                _ => 0.0,
            };

            let node_weight = network.node_weight(node);
            let mut best_cluster = current;
            let mut max_increment = edge_to(current)
                - node_weight * (weight_of(current) - node_weight) * self.resolution;

            for cluster in std::iter::once(fresh).chain(neighboring_clusters.iter().copied()) {
                if cluster == current {
                    continue;
                }
                let increment = edge_to(cluster) - node_weight * weight_of(cluster) * self.resolution;
                if increment > max_increment {
                    best_cluster = cluster;
                    max_increment = increment;
                }
            }

            for &cluster in &neighboring_clusters {
                edge_weight_per_cluster[cluster] = f64::NAN;
            }
            neighboring_clusters.clear();

            if best_cluster == current {
                continue;
            }

            if best_cluster >= cluster_weights.len() {
                cluster_weights.resize(best_cluster + 1, 0.0);
                n_nodes_per_cluster.resize(best_cluster + 1, 0);
            }
            cluster_weights[current] -= node_weight;
            n_nodes_per_cluster[current] -= 1;
            if n_nodes_per_cluster[current] == 0 {
                cluster_weights[current] = 0.0;
            }
            cluster_weights[best_cluster] += node_weight;
            n_nodes_per_cluster[best_cluster] += 1;
            clustering.set_cluster_of(node, best_cluster);
            update = true;

            for (neighbor, _) in network.neighbors(node) {
                if !in_queue[neighbor] && clustering.cluster_of(neighbor) != best_cluster {
                    queue.push_back(neighbor);
                    in_queue[neighbor] = true;
                }
            }
        }

        if update {
            clustering.remove_empty_clusters();
        }

        Ok(update)
    }
}
