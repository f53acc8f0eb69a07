//! Clustering quality and per-cluster statistics

use rayon::prelude::*;
use crate::cluster::{Cluster, Clustering};
use crate::graph::Network;

/// CPM quality of a clustering
///
/// Internal edge weight (both directions) minus `resolution` times the sum of
/// squared cluster weights, normalized by twice the total edge weight.
/// Returns 0 for a network without edges.
pub fn calc_quality(network: &Network, clustering: &Clustering, resolution: f64) -> f64 {
    let total_edge_weight = network.total_edge_weight();
    if total_edge_weight == 0.0 {
        return 0.0;
    }

    let internal: f64 = (0..network.node_count())
        .into_par_iter()
        .map(|node| {
            let cluster = clustering.cluster_of(node);
            network.neighbors(node)
                .filter(|&(neighbor, _)| clustering.cluster_of(neighbor) == cluster)
                .map(|(_, weight)| weight)
                .sum::<f64>()
        })
        .sum();

    let penalty: f64 = clustering.cluster_weights(network)
        .iter()
        .map(|w| w * w)
        .sum::<f64>() * resolution;

    (internal - penalty) / (2.0 * total_edge_weight)
}

/// Quality increment of moving `node` from its current cluster to `target`,
/// relative to staying. Positive means the move improves quality.
pub fn move_gain(network: &Network, clustering: &Clustering, resolution: f64, node: usize, target: usize) -> f64 {
    let current = clustering.cluster_of(node);
    if current == target {
        return 0.0;
    }

    let node_weight = network.node_weight(node);
    let mut to_current = 0.0;
    let mut to_target = 0.0;
    for (neighbor, weight) in network.neighbors(node) {
        let cluster = clustering.cluster_of(neighbor);
        if cluster == current {
            to_current += weight;
        } else if cluster == target {
            to_target += weight;
        }
    }

    let weights = clustering.cluster_weights(network);
    let target_weight = weights.get(target).copied().unwrap_or(0.0);
    let stay = to_current - node_weight * (weights[current] - node_weight) * resolution;
    let go = to_target - node_weight * target_weight * resolution;
    go - stay
}

/// Calculate density (internal edges / potential edges) of a set of nodes
pub fn calculate_density(network: &Network, members: &[u32]) -> f64 {
    let n = members.len();
    if n <= 1 {
        return 1.0; // By convention, singleton clusters have density 1
    }

    // Potential edges = n * (n - 1) / 2 for an undirected network
    let potential_edges = n * (n - 1) / 2;

    let member_set: std::collections::HashSet<u32> = members.iter().copied().collect();
    let mut endpoints = 0;
    for &node in members {
        endpoints += network.neighbors(node as usize)
            .filter(|(neighbor, _)| member_set.contains(&(*neighbor as u32)))
            .count();
    }

    (endpoints / 2) as f64 / potential_edges as f64
}

/// Summarize every cluster with at least `min_cluster_size` members,
/// largest first
pub fn summarize_clusters(network: &Network, clustering: &Clustering, min_cluster_size: usize) -> Vec<Cluster> {
    let members_per_cluster = clustering.nodes_per_cluster();

    let mut clusters: Vec<Cluster> = members_per_cluster
        .into_par_iter()
        .enumerate()
        .filter(|(_, members)| !members.is_empty() && members.len() >= min_cluster_size)
        .map(|(id, members)| {
            let total_weight = members.iter()
                .map(|&node| network.node_weight(node as usize))
                .sum();
            let internal_edge_weight = members.iter()
                .map(|&node| {
                    network.neighbors(node as usize)
                        .filter(|&(neighbor, _)| clustering.cluster_of(neighbor) == id)
                        .map(|(_, weight)| weight)
                        .sum::<f64>()
                })
                .sum::<f64>() / 2.0;
            let density = calculate_density(network, &members);
            Cluster {
                id: id as u32,
                size: members.len(),
                members,
                total_weight,
                internal_edge_weight,
                density,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NetworkBuilder, NodeWeighting};

    fn path(n: usize) -> Network {
        let mut builder = NetworkBuilder::with_nodes(n);
        for i in 1..n {
            builder.add_indexed_edge(i - 1, i, 1.0).unwrap();
        }
        builder.build(NodeWeighting::Unit).unwrap()
    }

    #[test]
    fn quality_of_path_partitions() {
        let network = path(4);
        let singletons = Clustering::singletons(4);
        let pairs = Clustering::from_assignments(vec![0, 0, 1, 1]);
        let whole = Clustering::from_assignments(vec![0; 4]);

        // denominator is 2 * 3 = 6
        assert!((calc_quality(&network, &singletons, 0.1) - (-0.4 / 6.0)).abs() < 1e-12);
        assert!((calc_quality(&network, &pairs, 0.1) - (3.2 / 6.0)).abs() < 1e-12);
        assert!((calc_quality(&network, &whole, 0.1) - (4.4 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn move_gain_matches_quality_difference() {
        let network = path(4);
        let before = Clustering::from_assignments(vec![0, 0, 1, 1]);
        let mut after = before.clone();
        after.set_cluster_of(2, 0);

        let gain = move_gain(&network, &before, 0.1, 2, 0);
        let delta = calc_quality(&network, &after, 0.1) - calc_quality(&network, &before, 0.1);
        // quality counts both edge directions, so it moves twice as fast
        assert!((2.0 * gain / 6.0 - delta).abs() < 1e-12);
    }

    #[test]
    fn summaries_report_internal_structure() {
        let network = path(4);
        let clustering = Clustering::from_assignments(vec![0, 0, 0, 2]);
        let clusters = summarize_clusters(&network, &clustering, 1);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
        assert_eq!(clusters[0].internal_edge_weight, 2.0);
        assert!((clusters[0].density - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(clusters[1].id, 2);
        assert_eq!(summarize_clusters(&network, &clustering, 2).len(), 1);
    }
}
