//! Best-cluster evaluation of a single node

use crate::graph::Network;
use crate::local_moving::queue::WorkQueue;
use crate::local_moving::state::{ClusterStateManager, MoveOutcome};

/// Counters kept by one evaluator over a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorStatistics {
    /// Nodes evaluated
    pub evaluations: usize,
    /// Moves applied
    pub moves: usize,
    /// Moves rejected because another worker moved the node first
    pub stale_moves: usize,
}

/// Per-worker node evaluator with reusable scratch buffers
pub struct NodeEvaluator<'a> {
    network: &'a Network,
    state: &'a ClusterStateManager<'a>,
    queue: &'a WorkQueue,
    resolution: f64,

    /// Edge weight from the node to each cluster; NaN marks "not a neighbor"
    edge_weight_per_cluster: Vec<f64>,

    /// Distinct clusters of the node's neighbors, in discovery order
    neighboring_clusters: Vec<usize>,

    /// Candidate clusters: the fresh cluster first, then the neighbors'
    candidates: Vec<usize>,

    /// Total weight of each candidate
    candidate_weights: Vec<f64>,

    statistics: EvaluatorStatistics,
}

impl<'a> NodeEvaluator<'a> {
    /// Create an evaluator with buffers sized to the network
    pub fn new(
        network: &'a Network,
        state: &'a ClusterStateManager<'a>,
        queue: &'a WorkQueue,
        resolution: f64,
    ) -> Self {
        let n = network.node_count();
        Self {
            network,
            state,
            queue,
            resolution,
            edge_weight_per_cluster: vec![f64::NAN; n],
            neighboring_clusters: Vec::with_capacity(n),
            candidates: Vec::with_capacity(n + 1),
            candidate_weights: Vec::with_capacity(n + 1),
            statistics: EvaluatorStatistics::default(),
        }
    }

    /// Move `node` to its best cluster and return the neighbors to re-evaluate
    pub fn evaluate(&mut self, node: usize) -> Vec<usize> {
        self.statistics.evaluations += 1;

        let current = self.state.cluster_of(node);
        self.identify_neighboring_clusters(node);
        let best = self.find_best_cluster(node, current);
        self.reset_scratch();

        if best == current {
            return Vec::new();
        }

        let outcome = self.state.apply_move(node, current, best, self.queue);
        match outcome {
            MoveOutcome::Moved(_) => self.statistics.moves += 1,
            MoveOutcome::Stale => self.statistics.stale_moves += 1,
            MoveOutcome::Unchanged => {}
        }
        outcome.into_requeue(node)
    }

    /// Counters accumulated so far
    pub fn statistics(&self) -> EvaluatorStatistics {
        self.statistics
    }

    fn identify_neighboring_clusters(&mut self, node: usize) {
        self.candidates.clear();
        self.candidates.push(self.state.next_unused_cluster_id());

        for (neighbor, weight) in self.network.neighbors(node) {
            let cluster = self.state.cluster_of(neighbor);
            if cluster >= self.edge_weight_per_cluster.len() {
                self.edge_weight_per_cluster.resize(cluster + 1, f64::NAN);
            }

            let slot = &mut self.edge_weight_per_cluster[cluster];
            if slot.is_nan() {
                *slot = 0.0;
                self.neighboring_clusters.push(cluster);
            }
            *slot += weight;
        }

        self.candidates.extend_from_slice(&self.neighboring_clusters);
    }

    fn edge_weight_to(&self, cluster: usize) -> f64 {
        match self.edge_weight_per_cluster.get(cluster) {
            Some(weight) if !weight.is_nan() => *weight,
            _ => 0.0,
        }
    }

    fn find_best_cluster(&mut self, node: usize, current: usize) -> usize {
        let current_weight = self.state.load_cluster_weights(
            current,
            &self.candidates,
            &mut self.candidate_weights,
        );
        let node_weight = self.network.node_weight(node);

        // The node still counts towards its own cluster, so remove it first.
        let mut best_cluster = current;
        let mut max_increment = self.edge_weight_to(current)
            - node_weight * (current_weight - node_weight) * self.resolution;

        for (&cluster, &cluster_weight) in self.candidates.iter().zip(&self.candidate_weights) {
            if cluster == current {
                continue;
            }
            let increment = self.edge_weight_to(cluster) - node_weight * cluster_weight * self.resolution;
            if increment > max_increment {
                best_cluster = cluster;
                max_increment = increment;
            }
        }

        best_cluster
    }

    fn reset_scratch(&mut self) {
        for &cluster in &self.neighboring_clusters {
            self.edge_weight_per_cluster[cluster] = f64::NAN;
        }
        self.neighboring_clusters.clear();
    }
}
