//! Memory-efficient weighted network representation

use std::mem;
use serde::{Serialize, Deserialize};
use crate::error::ClusteringError;

/// Compressed sparse representation of an undirected, weighted network
///
/// Every edge is stored in both directions, so the adjacency of node `i`
/// lists all of its neighbors with the weight of the connecting edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Number of nodes in the network
    pub node_count: usize,

    /// Offset array: index where each node's neighbors begin
    /// offsets[i] to offsets[i+1] defines the neighbor range for node i
    pub offsets: Vec<usize>,

    /// Neighbor array: concatenated, sorted neighbor lists
    pub neighbors: Vec<u32>,

    /// Edge weights, parallel to `neighbors`
    pub edge_weights: Vec<f64>,

    /// Weight of each node
    pub node_weights: Vec<f64>,

    /// Optional mapping from internal node indices to original string IDs
    pub node_ids: Option<Vec<String>>,
}

impl Network {
    /// Create a new network with pre-allocated capacity
    pub fn with_capacity(node_count: usize, edge_count: usize) -> Self {
        Self {
            node_count,
            offsets: Vec::with_capacity(node_count + 1),
            neighbors: Vec::with_capacity(edge_count),
            edge_weights: Vec::with_capacity(edge_count),
            node_weights: Vec::with_capacity(node_count),
            node_ids: None,
        }
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Weight of a node
    pub fn node_weight(&self, node: usize) -> f64 {
        self.node_weights[node]
    }

    /// Neighbors of a node together with the connecting edge weight
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.offsets[node]..self.offsets[node + 1];
        self.neighbors[range.clone()]
            .iter()
            .zip(&self.edge_weights[range])
            .map(|(&n, &w)| (n as usize, w))
    }

    /// Number of neighbors of a node
    pub fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    /// Weight of the edge between `src` and `dst`, if there is one
    pub fn edge_weight(&self, src: usize, dst: usize) -> Option<f64> {
        let start = self.offsets[src];
        let end = self.offsets[src + 1];
        self.neighbors[start..end]
            .binary_search(&(dst as u32))
            .ok()
            .map(|pos| self.edge_weights[start + pos])
    }

    /// Sum of all node weights
    pub fn total_node_weight(&self) -> f64 {
        self.node_weights.iter().sum()
    }

    /// Sum of all edge weights, counting every undirected edge once
    pub fn total_edge_weight(&self) -> f64 {
        self.edge_weights.iter().sum::<f64>() / 2.0
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.neighbors.len() / 2
    }

    /// Original string ID of a node, or its index when the network is unnamed
    pub fn node_label(&self, node: usize) -> String {
        match &self.node_ids {
            Some(ids) => ids[node].clone(),
            None => node.to_string(),
        }
    }

    /// Check the structural invariants the local moving algorithm relies on
    pub fn validate(&self) -> Result<(), ClusteringError> {
        if self.offsets.len() != self.node_count + 1 {
            return Err(ClusteringError::MalformedNetwork(format!(
                "expected {} offsets, found {}",
                self.node_count + 1,
                self.offsets.len()
            )));
        }
        if self.node_weights.len() != self.node_count {
            return Err(ClusteringError::MalformedNetwork(format!(
                "expected {} node weights, found {}",
                self.node_count,
                self.node_weights.len()
            )));
        }
        if self.neighbors.len() != self.edge_weights.len()
            || self.offsets.last().copied() != Some(self.neighbors.len())
        {
            return Err(ClusteringError::MalformedNetwork(
                "neighbor and edge weight arrays disagree with offsets".to_string(),
            ));
        }
        if let Some(ids) = &self.node_ids {
            if ids.len() != self.node_count {
                return Err(ClusteringError::MalformedNetwork(format!(
                    "expected {} node ids, found {}",
                    self.node_count,
                    ids.len()
                )));
            }
        }
        if let Some(node) = self.node_weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(ClusteringError::MalformedNetwork(format!(
                "node {} has invalid weight {}",
                node, self.node_weights[node]
            )));
        }

        for node in 0..self.node_count {
            if self.offsets[node] > self.offsets[node + 1] {
                return Err(ClusteringError::MalformedNetwork(format!(
                    "offsets decrease at node {}",
                    node
                )));
            }
            let adjacency = &self.neighbors[self.offsets[node]..self.offsets[node + 1]];
            if adjacency.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(ClusteringError::MalformedNetwork(format!(
                    "neighbors of node {} are not sorted and unique",
                    node
                )));
            }
            for (neighbor, weight) in self.neighbors(node) {
                if neighbor >= self.node_count {
                    return Err(ClusteringError::MalformedNetwork(format!(
                        "node {} links to unknown node {}",
                        node, neighbor
                    )));
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ClusteringError::MalformedNetwork(format!(
                        "edge {}-{} has invalid weight {}",
                        node, neighbor, weight
                    )));
                }
                if self.edge_weight(neighbor, node) != Some(weight) {
                    return Err(ClusteringError::MalformedNetwork(format!(
                        "edge {}-{} is not symmetric",
                        node, neighbor
                    )));
                }
            }
        }
        Ok(())
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<usize>();
        let neighbors = self.neighbors.capacity() * mem::size_of::<u32>();
        let weights = (self.edge_weights.capacity() + self.node_weights.capacity())
            * mem::size_of::<f64>();

        let ids = self.node_ids.as_ref()
            .map(|ids| ids.iter().map(|s| s.capacity()).sum::<usize>())
            .unwrap_or(0);

        base + offsets + neighbors + weights + ids
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{NetworkBuilder, NodeWeighting};

    #[test]
    fn neighbors_are_symmetric_and_sorted() {
        let mut builder = NetworkBuilder::with_nodes(4);
        builder.add_indexed_edge(2, 0, 1.5).unwrap();
        builder.add_indexed_edge(0, 1, 2.0).unwrap();
        builder.add_indexed_edge(3, 2, 0.5).unwrap();
        let network = builder.build(NodeWeighting::Unit).unwrap();

        let adjacency: Vec<(usize, f64)> = network.neighbors(0).collect();
        assert_eq!(adjacency, vec![(1, 2.0), (2, 1.5)]);
        assert_eq!(network.edge_weight(2, 3), Some(0.5));
        assert_eq!(network.edge_weight(1, 3), None);
        assert_eq!(network.degree(2), 2);
        assert_eq!(network.edge_count(), 3);
        assert!((network.total_edge_weight() - 4.0).abs() < 1e-12);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn validate_detects_asymmetric_edges() {
        let mut builder = NetworkBuilder::with_nodes(2);
        builder.add_indexed_edge(0, 1, 1.0).unwrap();
        let mut network = builder.build(NodeWeighting::Unit).unwrap();
        network.edge_weights[0] = 3.0;
        assert!(network.validate().is_err());
    }

    #[test]
    fn validate_detects_missing_node_ids() {
        let mut builder = NetworkBuilder::with_capacity(3);
        builder.add_edge("a", "b", 1.0).unwrap();
        builder.add_edge("b", "c", 1.0).unwrap();
        let mut network = builder.build(NodeWeighting::Unit).unwrap();
        assert!(network.validate().is_ok());

        if let Some(ids) = network.node_ids.as_mut() {
            ids.pop();
        }
        let message = network.validate().unwrap_err().to_string();
        assert!(message.contains("node ids"), "{}", message);
    }

    #[test]
    fn validate_detects_unsorted_neighbors() {
        let mut builder = NetworkBuilder::with_nodes(3);
        builder.add_indexed_edge(0, 1, 1.0).unwrap();
        builder.add_indexed_edge(0, 2, 2.0).unwrap();
        let mut network = builder.build(NodeWeighting::Unit).unwrap();

        // swap node 0's adjacency entries, keeping every edge present
        network.neighbors.swap(0, 1);
        network.edge_weights.swap(0, 1);
        let message = network.validate().unwrap_err().to_string();
        assert!(message.contains("not sorted"), "{}", message);
    }
}
