//! Parallel fast local moving for the Constant Potts Model
//!
//! A pass seeds a shared [`WorkQueue`] with a random permutation of all
//! nodes and starts a fixed pool of workers. Each worker pops a batch,
//! moves every node in it to its best cluster through the shared
//! [`ClusterStateManager`], and pushes the neighbors that may now prefer a
//! different cluster back onto the queue. The pass ends when the queue is
//! empty and no worker holds an unfinished batch.

pub mod queue;
pub mod state;
pub mod evaluator;
pub mod serial;

use std::any::Any;
use rand::Rng;
use crate::cluster::Clustering;
use crate::cluster::iterative::IterativeCpmClustering;
use crate::config::{validate_resolution, Config, DEFAULT_BATCH_SIZE, DEFAULT_NUM_WORKERS};
use crate::error::ClusteringError;
use crate::graph::Network;
use crate::permutation::generate_random_permutation;

pub use evaluator::{EvaluatorStatistics, NodeEvaluator};
pub use queue::{Batch, WorkQueue};
pub use serial::SerialFastLocalMoving;
pub use state::{ClusterStateManager, MoveOutcome};

/// Outcome of one local moving pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStatistics {
    /// Whether any node changed cluster
    pub changed: bool,
    /// Node evaluations over all workers
    pub evaluations: usize,
    /// Moves applied over all workers
    pub moves: usize,
    /// Moves rejected because the node had already moved
    pub stale_moves: usize,
}

impl PassStatistics {
    fn absorb(&mut self, worker: EvaluatorStatistics) {
        self.evaluations += worker.evaluations;
        self.moves += worker.moves;
        self.stale_moves += worker.stale_moves;
    }
}

/// Fast local moving with a pool of worker threads sharing one work queue
pub struct ParallelFastLocalMoving<R> {
    resolution: f64,
    n_iterations: usize,
    num_workers: usize,
    batch_size: usize,
    random: R,
}

impl<R: Rng> ParallelFastLocalMoving<R> {
    /// Create the algorithm with the default pool and batch sizes
    pub fn new(resolution: f64, n_iterations: usize, random: R) -> Self {
        Self {
            resolution,
            n_iterations,
            num_workers: DEFAULT_NUM_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            random,
        }
    }

    /// Create the algorithm from a validated configuration
    pub fn from_config(config: &Config, random: R) -> Result<Self, ClusteringError> {
        config.validate()?;
        Ok(Self {
            resolution: config.resolution,
            n_iterations: config.n_iterations,
            num_workers: config.num_workers,
            batch_size: config.batch_size,
            random,
        })
    }

    /// Set the number of worker threads
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the number of nodes a worker pops at once
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Run one pass and report what it did
    pub fn run_pass(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
    ) -> Result<PassStatistics, ClusteringError> {
        validate_resolution(self.resolution)?;
        if self.num_workers == 0 {
            return Err(ClusteringError::invalid("num_workers", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ClusteringError::invalid("batch_size", "must be at least 1"));
        }
        if clustering.n_nodes() != network.node_count() {
            return Err(ClusteringError::SizeMismatch {
                clustering: clustering.n_nodes(),
                network: network.node_count(),
            });
        }

        let n = network.node_count();
        if n <= 1 {
            return Ok(PassStatistics::default());
        }

        // Seeding
        let order = generate_random_permutation(n, &mut self.random);
        let queue = WorkQueue::new(n);
        queue.seed(&order);
        let state = ClusterStateManager::new(network, clustering);

        // Running and draining
        let resolution = self.resolution;
        let batch_size = self.batch_size;
        let num_workers = self.num_workers;
        let joined = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..num_workers)
                .map(|_| {
                    let (queue, state) = (&queue, &state);
                    scope.spawn(move |_| run_worker(network, state, queue, resolution, batch_size))
                })
                .collect();

            queue.wait_until_drained();
            handles.into_iter().map(|handle| handle.join()).collect::<Vec<_>>()
        })
        .map_err(|payload| ClusteringError::WorkerPanicked {
            worker: num_workers,
            message: panic_message(payload.as_ref()),
        })?;

        let mut statistics = PassStatistics::default();
        for (worker, result) in joined.into_iter().enumerate() {
            match result {
                Ok(worker_statistics) => statistics.absorb(worker_statistics),
                Err(payload) => {
                    return Err(ClusteringError::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }
        debug_assert!(queue.is_drained());

        // Finalizing
        statistics.changed = state.has_changed();
        let clusters = state.into_clusters();
        if statistics.changed {
            *clustering = Clustering::from_assignments(clusters);
            clustering.remove_empty_clusters();
        }

        log::debug!(
            "Local moving pass: {} evaluations, {} moves, {} stale moves, {} clusters",
            statistics.evaluations,
            statistics.moves,
            statistics.stale_moves,
            clustering.n_clusters()
        );

        Ok(statistics)
    }
}

impl<R: Rng> IterativeCpmClustering for ParallelFastLocalMoving<R> {
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
        Ok(self.run_pass(network, clustering)?.changed)
    }
}

/// Aborts the queue if the worker unwinds, so nobody waits for it
struct AbortOnPanic<'a>(&'a WorkQueue);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

fn run_worker(
    network: &Network,
    state: &ClusterStateManager<'_>,
    queue: &WorkQueue,
    resolution: f64,
    batch_size: usize,
) -> EvaluatorStatistics {
    let _abort = AbortOnPanic(queue);
    let mut evaluator = NodeEvaluator::new(network, state, queue, resolution);
    let mut requeue = Vec::new();

    while let Some(batch) = queue.wait_for_batch(batch_size) {
        requeue.clear();
        for &node in batch.nodes() {
            requeue.extend(evaluator.evaluate(node));
        }
        batch.complete(&requeue);
    }

    evaluator.statistics()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NetworkBuilder, NodeWeighting};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ring_of_cliques(cliques: usize, size: usize) -> Network {
        let mut builder = NetworkBuilder::with_nodes(cliques * size);
        for c in 0..cliques {
            let base = c * size;
            for i in 0..size {
                for j in (i + 1)..size {
                    builder.add_indexed_edge(base + i, base + j, 1.0).unwrap();
                }
            }
            let next = ((c + 1) % cliques) * size;
            builder.add_indexed_edge(base, next + 1, 1.0).unwrap();
        }
        builder.build(NodeWeighting::Unit).unwrap()
    }

    #[test]
    fn single_node_pass_is_a_no_op() {
        let network = NetworkBuilder::with_nodes(1).build(NodeWeighting::Unit).unwrap();
        let mut clustering = Clustering::singletons(1);
        let mut algorithm = ParallelFastLocalMoving::new(1.0, 1, StdRng::seed_from_u64(1));

        let statistics = algorithm.run_pass(&network, &mut clustering).unwrap();
        assert_eq!(statistics, PassStatistics::default());
        assert_eq!(clustering.assignments(), &[0]);
    }

    #[test]
    fn finds_cliques_with_many_workers() {
        let network = ring_of_cliques(6, 5);
        let mut clustering = Clustering::singletons(network.node_count());
        let mut algorithm = ParallelFastLocalMoving::new(0.5, 0, StdRng::seed_from_u64(11));

        assert!(algorithm.improve_clustering(&network, &mut clustering).unwrap());
        assert_eq!(clustering.n_clusters(), 6);
        for c in 0..6 {
            let base = c * 5;
            for i in 1..5 {
                assert_eq!(clustering.cluster_of(base + i), clustering.cluster_of(base));
            }
        }
    }

    #[test]
    fn rejects_mismatched_clustering() {
        let network = ring_of_cliques(2, 3);
        let mut clustering = Clustering::singletons(5);
        let mut algorithm = ParallelFastLocalMoving::new(0.2, 1, StdRng::seed_from_u64(1));
        assert!(matches!(
            algorithm.run_pass(&network, &mut clustering),
            Err(ClusteringError::SizeMismatch { clustering: 5, network: 6 })
        ));
    }

    #[test]
    fn rejects_empty_worker_pool() {
        let network = ring_of_cliques(2, 3);
        let mut clustering = Clustering::singletons(6);
        let mut algorithm = ParallelFastLocalMoving::new(0.2, 1, StdRng::seed_from_u64(1)).with_workers(0);
        assert!(algorithm.run_pass(&network, &mut clustering).is_err());
    }

    #[test]
    fn aggregates_match_assignment_after_concurrent_workers() {
        let network = ring_of_cliques(8, 6);
        let network = &network;
        let n = network.node_count();

        for workers in [2, 4, 8] {
            let state = ClusterStateManager::new(network, &Clustering::singletons(n));
            let queue = WorkQueue::new(n);
            queue.seed(&generate_random_permutation(n, &mut StdRng::seed_from_u64(workers as u64)));

            let moves: usize = crossbeam::thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| {
                        let (state, queue) = (&state, &queue);
                        scope.spawn(move |_| run_worker(network, state, queue, 0.3, 2))
                    })
                    .collect();
                handles.into_iter().map(|handle| handle.join().unwrap().moves).sum()
            })
            .unwrap();

            assert!(moves > 0);
            assert!(queue.is_drained());
            assert!((state.total_cluster_weight() - network.total_node_weight()).abs() < 1e-9);

            let issued = state.next_unused_cluster_id();
            let mut expected_weights = vec![0.0; issued];
            let mut expected_sizes = vec![0usize; issued];
            for node in 0..n {
                let cluster = state.cluster_of(node);
                expected_weights[cluster] += network.node_weight(node);
                expected_sizes[cluster] += 1;
            }
            for cluster in 0..issued {
                assert_eq!(state.cluster_size(cluster), expected_sizes[cluster], "size of cluster {}", cluster);
                if expected_sizes[cluster] == 0 {
                    assert_eq!(state.cluster_weight(cluster), 0.0, "empty cluster {}", cluster);
                } else {
                    assert!(
                        (state.cluster_weight(cluster) - expected_weights[cluster]).abs() < 1e-9,
                        "weight of cluster {} with {} workers",
                        cluster,
                        workers
                    );
                }
            }
        }
    }

    #[test]
    fn every_neighbor_of_a_moved_node_is_reevaluated() {
        let network = ring_of_cliques(4, 4);
        let n = network.node_count();
        let state = ClusterStateManager::new(&network, &Clustering::singletons(n));
        let queue = WorkQueue::new(n);
        let order = generate_random_permutation(n, &mut StdRng::seed_from_u64(5));
        queue.seed(&order);

        let mut evaluator = NodeEvaluator::new(&network, &state, &queue, 0.3);
        let mut last_evaluated = vec![0usize; n];
        // (time of move, neighbor that must be evaluated afterwards)
        let mut obligations = Vec::new();
        let mut clock = 0;

        while let Some(batch) = queue.pop_batch(3) {
            let mut requeue = Vec::new();
            for &node in batch.nodes() {
                clock += 1;
                last_evaluated[node] = clock;
                let before = state.cluster_of(node);
                requeue.extend(evaluator.evaluate(node));
                let after = state.cluster_of(node);
                if before != after {
                    for (neighbor, _) in network.neighbors(node) {
                        if state.cluster_of(neighbor) != after {
                            obligations.push((clock, neighbor));
                        }
                    }
                }
            }
            batch.complete(&requeue);
        }

        assert!(queue.is_drained());
        assert!(!obligations.is_empty());
        for (moved_at, neighbor) in obligations {
            assert!(
                last_evaluated[neighbor] > moved_at,
                "node {} not re-evaluated after a neighbor moved at {}",
                neighbor,
                moved_at
            );
        }
    }
}
