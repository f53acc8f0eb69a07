//! Network construction module

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use crate::error::ClusteringError;
use crate::graph::Network;

/// How node weights are assigned when a network is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeWeighting {
    /// Every node weighs 1 (the usual choice for CPM)
    Unit,
    /// A node weighs the sum of its incident edge weights
    Degree,
}

/// Builder for incrementally constructing an undirected `Network`
pub struct NetworkBuilder {
    /// Number of nodes
    node_count: usize,

    /// Mapping from string IDs to node indices
    id_to_index: HashMap<String, u32>,

    /// Node string IDs
    node_ids: Vec<String>,

    /// Whether nodes were created from string IDs
    named: bool,

    /// Adjacency lists for each node, both directions stored
    adjacency_lists: Vec<Vec<(u32, f64)>>,

    /// Explicit node weights overriding the weighting scheme
    explicit_weights: Vec<Option<f64>>,

    /// Self-loops seen and dropped
    self_loops: usize,
}

impl NetworkBuilder {
    /// Create a new builder for string-identified nodes with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            node_count: 0,
            id_to_index: HashMap::with_capacity(capacity),
            node_ids: Vec::with_capacity(capacity),
            named: true,
            adjacency_lists: Vec::with_capacity(capacity),
            explicit_weights: Vec::with_capacity(capacity),
            self_loops: 0,
        }
    }

    /// Create a builder with `node_count` anonymous nodes addressed by index
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            node_count,
            id_to_index: HashMap::new(),
            node_ids: Vec::new(),
            named: false,
            adjacency_lists: vec![Vec::new(); node_count],
            explicit_weights: vec![None; node_count],
            self_loops: 0,
        }
    }

    /// Number of nodes created so far
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Get or create a node ID for the given string ID
    pub fn get_or_create_node(&mut self, id: &str) -> u32 {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }

        let idx = self.node_count as u32;
        self.id_to_index.insert(id.to_string(), idx);
        self.node_ids.push(id.to_string());
        self.adjacency_lists.push(Vec::new());
        self.explicit_weights.push(None);
        self.node_count += 1;

        idx
    }

    /// Add an undirected edge between two string-identified nodes
    pub fn add_edge(&mut self, src_id: &str, dst_id: &str, weight: f64) -> Result<(), ClusteringError> {
        let src_idx = self.get_or_create_node(src_id);
        let dst_idx = self.get_or_create_node(dst_id);
        self.add_indexed_edge(src_idx as usize, dst_idx as usize, weight)
    }

    /// Add an undirected edge between two nodes addressed by index
    pub fn add_indexed_edge(&mut self, src: usize, dst: usize, weight: f64) -> Result<(), ClusteringError> {
        if src >= self.node_count || dst >= self.node_count {
            return Err(ClusteringError::MalformedNetwork(format!(
                "edge {}-{} references a node outside 0..{}",
                src, dst, self.node_count
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(ClusteringError::MalformedNetwork(format!(
                "edge {}-{} has invalid weight {}",
                src, dst, weight
            )));
        }

        if src == dst {
            self.self_loops += 1;
            return Ok(());
        }

        self.adjacency_lists[src].push((dst as u32, weight));
        self.adjacency_lists[dst].push((src as u32, weight));
        Ok(())
    }

    /// Override the weight of a single node
    pub fn set_node_weight(&mut self, node: usize, weight: f64) -> Result<(), ClusteringError> {
        if node >= self.node_count {
            return Err(ClusteringError::MalformedNetwork(format!(
                "node {} outside 0..{}",
                node, self.node_count
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(ClusteringError::MalformedNetwork(format!(
                "node {} has invalid weight {}",
                node, weight
            )));
        }
        self.explicit_weights[node] = Some(weight);
        Ok(())
    }

    /// Build the network, merging parallel edges by summing their weights
    pub fn build(mut self, weighting: NodeWeighting) -> Result<Network, ClusteringError> {
        if self.self_loops > 0 {
            log::warn!("Dropped {} self-loops while building the network", self.self_loops);
        }

        let edge_count: usize = self.adjacency_lists.iter()
            .map(|list| list.len())
            .sum();

        let mut network = Network::with_capacity(self.node_count, edge_count);
        network.offsets.push(0);

        for (node, list) in self.adjacency_lists.iter_mut().enumerate() {
            list.sort_unstable_by_key(|&(neighbor, _)| neighbor);

            let mut incident_weight = 0.0;
            let mut last: Option<u32> = None;
            for &(neighbor, weight) in list.iter() {
                if last == Some(neighbor) {
                    if let Some(merged) = network.edge_weights.last_mut() {
                        *merged += weight;
                    }
                } else {
                    network.neighbors.push(neighbor);
                    network.edge_weights.push(weight);
                    last = Some(neighbor);
                }
                incident_weight += weight;
            }
            network.offsets.push(network.neighbors.len());

            let weight = match (self.explicit_weights[node], weighting) {
                (Some(weight), _) => weight,
                (None, NodeWeighting::Unit) => 1.0,
                (None, NodeWeighting::Degree) => incident_weight,
            };
            network.node_weights.push(weight);
        }

        if self.named {
            network.node_ids = Some(self.node_ids);
        }

        Ok(network)
    }
}
