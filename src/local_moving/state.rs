//! Shared per-cluster aggregates for a local moving pass

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use crossbeam::utils::CachePadded;
use crate::cluster::Clustering;
use crate::graph::Network;
use crate::local_moving::queue::WorkQueue;

/// Total node weight and member count of every cluster id seen in a pass
struct ClusterAggregates {
    weights: Vec<f64>,
    n_nodes: Vec<usize>,
}

impl ClusterAggregates {
    fn ensure(&mut self, cluster: usize) {
        if cluster >= self.weights.len() {
            self.weights.resize(cluster + 1, 0.0);
            self.n_nodes.resize(cluster + 1, 0);
        }
    }

    fn weight(&self, cluster: usize) -> f64 {
        self.weights.get(cluster).copied().unwrap_or(0.0)
    }
}

/// Result of a requested move
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Source and target were the same cluster
    Unchanged,
    /// The node was moved; these neighbors need re-evaluation
    Moved(Vec<usize>),
    /// The node had already left the source cluster; nothing was applied
    Stale,
}

impl MoveOutcome {
    /// Nodes to push back onto the queue after moving `node`
    ///
    /// A stale move re-enqueues the node itself.
    pub fn into_requeue(self, node: usize) -> Vec<usize> {
        match self {
            MoveOutcome::Unchanged => Vec::new(),
            MoveOutcome::Moved(requeue) => requeue,
            MoveOutcome::Stale => vec![node],
        }
    }
}

/// Concurrency-safe cluster bookkeeping shared by all workers of a pass
///
/// All writes to the assignment and the aggregates happen under one lock,
/// so a half-applied move is never observable. Reads of the assignment are
/// lock-free and may be stale.
pub struct ClusterStateManager<'a> {
    network: &'a Network,
    assignment: Vec<AtomicUsize>,
    aggregates: Mutex<ClusterAggregates>,
    next_unused: CachePadded<AtomicUsize>,
    changed: AtomicBool,
}

impl<'a> ClusterStateManager<'a> {
    /// Scan a clustering once to build the aggregates
    pub fn new(network: &'a Network, clustering: &Clustering) -> Self {
        let n_clusters = clustering.n_clusters();
        let mut aggregates = ClusterAggregates {
            weights: vec![0.0; n_clusters],
            n_nodes: vec![0; n_clusters],
        };
        for (node, &cluster) in clustering.assignments().iter().enumerate() {
            aggregates.weights[cluster] += network.node_weight(node);
            aggregates.n_nodes[cluster] += 1;
        }

        Self {
            network,
            assignment: clustering.assignments().iter().map(|&c| AtomicUsize::new(c)).collect(),
            aggregates: Mutex::new(aggregates),
            next_unused: CachePadded::new(AtomicUsize::new(n_clusters)),
            changed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClusterAggregates> {
        self.aggregates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current cluster of a node
    pub fn cluster_of(&self, node: usize) -> usize {
        self.assignment[node].load(Ordering::Acquire)
    }

    /// A cluster id no node has and no earlier call returned
    ///
    /// Every evaluation takes one id, so the aggregate vectors and each
    /// evaluator's scratch buffer grow with the number of evaluations in a
    /// pass rather than with the node count.
    pub fn next_unused_cluster_id(&self) -> usize {
        self.next_unused.fetch_add(1, Ordering::Relaxed)
    }

    /// Total node weight of a cluster
    pub fn cluster_weight(&self, cluster: usize) -> f64 {
        self.lock().weight(cluster)
    }

    /// Number of nodes in a cluster
    pub fn cluster_size(&self, cluster: usize) -> usize {
        self.lock().n_nodes.get(cluster).copied().unwrap_or(0)
    }

    /// Load the weights of `clusters` into `out` under one lock and return
    /// the weight of `current`
    pub fn load_cluster_weights(&self, current: usize, clusters: &[usize], out: &mut Vec<f64>) -> f64 {
        let aggregates = self.lock();
        out.clear();
        out.extend(clusters.iter().map(|&c| aggregates.weight(c)));
        aggregates.weight(current)
    }

    /// Sum of all cluster weights
    pub fn total_cluster_weight(&self) -> f64 {
        self.lock().weights.iter().sum()
    }

    /// Number of clusters with at least one member
    pub fn n_nonempty_clusters(&self) -> usize {
        self.lock().n_nodes.iter().filter(|&&count| count > 0).count()
    }

    /// Move `node` from `from` to `to`
    ///
    /// A successful move reports the neighbors whose best cluster may now be
    /// stale: those outside `to` that are not already waiting in `queue`.
    /// If the node already left `from`, nothing changes.
    pub fn apply_move(&self, node: usize, from: usize, to: usize, queue: &WorkQueue) -> MoveOutcome {
        if from == to {
            return MoveOutcome::Unchanged;
        }

        let mut aggregates = self.lock();
        if self.assignment[node].load(Ordering::Acquire) != from {
            return MoveOutcome::Stale;
        }

        let weight = self.network.node_weight(node);
        aggregates.ensure(to);

        aggregates.weights[from] -= weight;
        aggregates.n_nodes[from] -= 1;
        if aggregates.n_nodes[from] == 0 {
            aggregates.weights[from] = 0.0;
        }
        aggregates.weights[to] += weight;
        aggregates.n_nodes[to] += 1;

        self.assignment[node].store(to, Ordering::Release);
        self.changed.store(true, Ordering::Release);

        let requeue = self.network.neighbors(node)
            .map(|(neighbor, _)| neighbor)
            .filter(|&neighbor| self.cluster_of(neighbor) != to && !queue.is_pending(neighbor))
            .collect();
        MoveOutcome::Moved(requeue)
    }

    /// Whether any move was applied during the pass
    pub fn has_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    /// Final node → cluster assignment
    pub fn into_clusters(self) -> Vec<usize> {
        self.assignment.into_iter().map(AtomicUsize::into_inner).collect()
    }
}
