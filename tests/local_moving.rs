use cpm_cluster_analyzer::cluster::metrics::{calc_quality, move_gain};
use cpm_cluster_analyzer::{
    Clustering, IterativeCpmClustering, Network, NetworkBuilder, NodeWeighting,
    ParallelFastLocalMoving, SerialFastLocalMoving,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn planted_partition(groups: usize, size: usize, seed: u64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = groups * size;
    let mut builder = NetworkBuilder::with_nodes(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let p = if i / size == j / size { 0.6 } else { 0.05 };
            if rng.gen_bool(p) {
                builder.add_indexed_edge(i, j, rng.gen_range(0.5..2.0)).unwrap();
            }
        }
    }
    for node in 0..n {
        builder.set_node_weight(node, rng.gen_range(0.5..1.5)).unwrap();
    }
    builder.build(NodeWeighting::Unit).unwrap()
}

fn path(n: usize) -> Network {
    let mut builder = NetworkBuilder::with_nodes(n);
    for i in 1..n {
        builder.add_indexed_edge(i - 1, i, 1.0).unwrap();
    }
    builder.build(NodeWeighting::Unit).unwrap()
}

fn assert_compact(network: &Network, clustering: &Clustering) {
    let sizes = clustering.n_nodes_per_cluster();
    assert_eq!(sizes.len(), clustering.n_clusters());
    assert!(sizes.iter().all(|&size| size > 0), "empty cluster after pass: {:?}", sizes);

    let total: f64 = clustering.cluster_weights(network).iter().sum();
    assert!((total - network.total_node_weight()).abs() < 1e-9);
}

#[test]
fn passes_leave_compact_clusterings_for_any_pool_size() {
    let network = planted_partition(4, 10, 3);

    for workers in [1, 2, 4, 7] {
        let mut clustering = Clustering::singletons(network.node_count());
        let mut algorithm = ParallelFastLocalMoving::new(0.1, 0, StdRng::seed_from_u64(workers as u64))
            .with_workers(workers)
            .with_batch_size(3);

        algorithm.improve_clustering(&network, &mut clustering).unwrap();
        assert_compact(&network, &clustering);
        assert!(clustering.n_clusters() < network.node_count());
    }
}

#[test]
fn converged_clustering_is_locally_optimal() {
    let network = planted_partition(3, 12, 8);
    let resolution = 0.05;

    for workers in [1, 4] {
        let mut clustering = Clustering::singletons(network.node_count());
        let mut algorithm =
            ParallelFastLocalMoving::new(resolution, 0, StdRng::seed_from_u64(21)).with_workers(workers);
        algorithm.improve_clustering(&network, &mut clustering).unwrap();

        let fresh = clustering.n_clusters();
        for node in 0..network.node_count() {
            let gain = move_gain(&network, &clustering, resolution, node, fresh);
            assert!(gain <= 1e-9, "node {} gains {} by leaving", node, gain);
            for (neighbor, _) in network.neighbors(node) {
                let target = clustering.cluster_of(neighbor);
                let gain = move_gain(&network, &clustering, resolution, node, target);
                assert!(gain <= 1e-9, "node {} gains {} by joining cluster {}", node, gain, target);
            }
        }
    }
}

#[test]
fn second_pass_after_convergence_changes_nothing() {
    let network = planted_partition(3, 8, 5);
    let mut clustering = Clustering::singletons(network.node_count());
    let mut algorithm = ParallelFastLocalMoving::new(0.1, 0, StdRng::seed_from_u64(2)).with_workers(7);
    algorithm.improve_clustering(&network, &mut clustering).unwrap();

    let converged = clustering.clone();
    let statistics = algorithm.run_pass(&network, &mut clustering).unwrap();
    assert!(!statistics.changed);
    assert_eq!(statistics.moves, 0);
    assert_eq!(statistics.evaluations, network.node_count());
    assert_eq!(clustering, converged);
}

#[test]
fn weakly_attached_node_escapes_to_its_own_cluster() {
    let mut builder = NetworkBuilder::with_nodes(4);
    builder.add_indexed_edge(0, 1, 1.0).unwrap();
    builder.add_indexed_edge(1, 2, 1.0).unwrap();
    builder.add_indexed_edge(0, 2, 1.0).unwrap();
    builder.add_indexed_edge(0, 3, 0.01).unwrap();
    let network = builder.build(NodeWeighting::Unit).unwrap();

    let mut clustering = Clustering::from_assignments(vec![0; 4]);
    let mut algorithm = ParallelFastLocalMoving::new(0.5, 0, StdRng::seed_from_u64(4)).with_workers(4);
    assert!(algorithm.improve_clustering(&network, &mut clustering).unwrap());

    assert_eq!(clustering.n_clusters(), 2);
    assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
    assert_eq!(clustering.cluster_of(1), clustering.cluster_of(2));
    assert_ne!(clustering.cluster_of(3), clustering.cluster_of(0));
}

#[test]
fn path_merges_into_at_most_two_clusters() {
    let network = path(4);
    for seed in 0..20 {
        let mut clustering = Clustering::singletons(4);
        let mut algorithm = ParallelFastLocalMoving::new(0.1, 1, StdRng::seed_from_u64(seed)).with_workers(7);

        assert!(algorithm.improve_clustering(&network, &mut clustering).unwrap());
        assert!(clustering.n_clusters() <= 2, "seed {}: {:?}", seed, clustering.assignments());
        assert!(calc_quality(&network, &clustering, 0.1) > calc_quality(&network, &Clustering::singletons(4), 0.1));
    }
}

#[test]
fn one_worker_with_unit_batches_matches_serial() {
    let network = planted_partition(3, 10, 13);
    for seed in 0..5 {
        let mut serial_clustering = Clustering::singletons(network.node_count());
        SerialFastLocalMoving::new(0.1, 0, StdRng::seed_from_u64(seed))
            .improve_clustering(&network, &mut serial_clustering)
            .unwrap();

        let mut parallel_clustering = Clustering::singletons(network.node_count());
        ParallelFastLocalMoving::new(0.1, 0, StdRng::seed_from_u64(seed))
            .with_workers(1)
            .with_batch_size(1)
            .improve_clustering(&network, &mut parallel_clustering)
            .unwrap();

        assert_eq!(parallel_clustering, serial_clustering, "seed {}", seed);
    }
}

#[test]
fn single_node_network_stays_put() {
    let network = NetworkBuilder::with_nodes(1).build(NodeWeighting::Unit).unwrap();
    let mut clustering = Clustering::singletons(1);
    let mut algorithm = ParallelFastLocalMoving::new(1.0, 0, StdRng::seed_from_u64(0));

    assert!(!algorithm.improve_clustering(&network, &mut clustering).unwrap());
    assert_eq!(clustering.assignments(), &[0]);
}
