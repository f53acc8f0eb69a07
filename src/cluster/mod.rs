//! Cluster assignment, quality and the iterative clustering driver

pub mod metrics;
pub mod iterative;

use serde::{Serialize, Deserialize};
use crate::graph::Network;

/// Summary of one cluster of a finished clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster identifier in the final clustering
    pub id: u32,

    /// Members of this cluster (node indices)
    pub members: Vec<u32>,

    /// Size of the cluster
    pub size: usize,

    /// Sum of member node weights
    pub total_weight: f64,

    /// Sum of weights of edges with both endpoints inside the cluster
    pub internal_edge_weight: f64,

    /// Density: internal edges / potential edges
    pub density: f64,
}

/// Assignment of every node to a cluster id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clustering {
    /// One more than the largest cluster id in use
    n_clusters: usize,

    /// Cluster of each node
    clusters: Vec<usize>,
}

impl Clustering {
    /// Put every node in its own cluster
    pub fn singletons(n_nodes: usize) -> Self {
        Self {
            n_clusters: n_nodes,
            clusters: (0..n_nodes).collect(),
        }
    }

    /// Wrap an existing node → cluster assignment
    pub fn from_assignments(clusters: Vec<usize>) -> Self {
        let n_clusters = clusters.iter().max().map_or(0, |&max| max + 1);
        Self { n_clusters, clusters }
    }

    /// Number of nodes covered
    pub fn n_nodes(&self) -> usize {
        self.clusters.len()
    }

    /// One more than the largest cluster id in use
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Cluster of a node
    pub fn cluster_of(&self, node: usize) -> usize {
        self.clusters[node]
    }

    /// Move a node to a cluster
    pub fn set_cluster_of(&mut self, node: usize, cluster: usize) {
        self.clusters[node] = cluster;
        self.n_clusters = self.n_clusters.max(cluster + 1);
    }

    /// The raw assignment
    pub fn assignments(&self) -> &[usize] {
        &self.clusters
    }

    /// Number of nodes in each cluster
    pub fn n_nodes_per_cluster(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters];
        for &cluster in &self.clusters {
            counts[cluster] += 1;
        }
        counts
    }

    /// Members of each cluster
    pub fn nodes_per_cluster(&self) -> Vec<Vec<u32>> {
        let mut members = vec![Vec::new(); self.n_clusters];
        for (node, &cluster) in self.clusters.iter().enumerate() {
            members[cluster].push(node as u32);
        }
        members
    }

    /// Total node weight of each cluster
    pub fn cluster_weights(&self, network: &Network) -> Vec<f64> {
        let mut weights = vec![0.0; self.n_clusters];
        for (node, &cluster) in self.clusters.iter().enumerate() {
            weights[cluster] += network.node_weight(node);
        }
        weights
    }

    /// Drop clusters without members and renumber the rest contiguously,
    /// keeping the relative order of the surviving ids
    pub fn remove_empty_clusters(&mut self) {
        let counts = self.n_nodes_per_cluster();
        let mut new_ids = vec![0; self.n_clusters];
        let mut next = 0;
        for (cluster, &count) in counts.iter().enumerate() {
            if count > 0 {
                new_ids[cluster] = next;
                next += 1;
            }
        }

        for cluster in self.clusters.iter_mut() {
            *cluster = new_ids[*cluster];
        }
        self.n_clusters = next;
    }

    /// Renumber clusters so that id 0 has the largest total node weight.
    /// Ties keep the original id order. Empty clusters are removed.
    pub fn order_clusters_by_weight(&mut self, network: &Network) {
        let weights = self.cluster_weights(network);
        let counts = self.n_nodes_per_cluster();

        let mut order: Vec<usize> = (0..self.n_clusters)
            .filter(|&cluster| counts[cluster] > 0)
            .collect();
        order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]).then(a.cmp(&b)));

        let mut new_ids = vec![0; self.n_clusters];
        for (new_id, &cluster) in order.iter().enumerate() {
            new_ids[cluster] = new_id;
        }

        for cluster in self.clusters.iter_mut() {
            *cluster = new_ids[*cluster];
        }
        self.n_clusters = order.len();
    }
}
