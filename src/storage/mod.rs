//! Results persistence module

use anyhow::{anyhow, Context, Result};
use crate::cluster::{Cluster, Clustering};
use crate::graph::Network;
use itertools::Itertools;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use serde_json::{json, to_string_pretty};

/// Run metadata written next to the clustering
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// CPM resolution used
    pub resolution: f64,
    /// CPM quality of the final clustering
    pub quality: f64,
    /// Passes run
    pub iterations: usize,
    /// Worker threads per pass
    pub num_workers: usize,
}

/// Save analysis results to the specified directory
pub fn save_results(
    clusters: &[Cluster],
    clustering: &Clustering,
    network: &Network,
    summary: &RunSummary,
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving {} clusters to {}", clusters.len(), output_dir);

    fs::create_dir_all(output_dir)?;

    save_summary(clusters, clustering, network, summary, output_dir)?;
    save_clusters(clusters, network, output_dir)?;
    save_clustering(clustering, network, &Path::new(output_dir).join("clustering.tsv"))?;

    log::info!("Results saved successfully");

    Ok(())
}

/// Save summary information
fn save_summary(
    clusters: &[Cluster],
    clustering: &Clustering,
    network: &Network,
    summary: &RunSummary,
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving summary information");

    let path = Path::new(output_dir).join("summary.json");
    let mut file = File::create(path)?;

    let sizes = clustering.n_nodes_per_cluster();
    let cluster_count = sizes.iter().filter(|&&size| size > 0).count();
    let summary = json!({
        "network_stats": {
            "node_count": network.node_count(),
            "edge_count": network.edge_count(),
            "total_node_weight": network.total_node_weight(),
            "total_edge_weight": network.total_edge_weight(),
            "avg_degree": 2.0 * network.edge_count() as f64 / network.node_count().max(1) as f64,
        },
        "run": {
            "resolution": summary.resolution,
            "quality": summary.quality,
            "iterations": summary.iterations,
            "num_workers": summary.num_workers,
        },
        "cluster_stats": {
            "cluster_count": cluster_count,
            "reported_cluster_count": clusters.len(),
            "singleton_count": sizes.iter().filter(|&&size| size == 1).count(),
            "largest_cluster_size": sizes.iter().copied().max().unwrap_or(0),
            "avg_cluster_size": network.node_count() as f64 / cluster_count.max(1) as f64,
            "avg_density": clusters.iter().map(|c| c.density).sum::<f64>() /
                           if clusters.is_empty() { 1.0 } else { clusters.len() as f64 },
        }
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}

/// Save per-cluster information
fn save_clusters(clusters: &[Cluster], network: &Network, output_dir: &str) -> Result<()> {
    log::info!("Saving individual cluster information");

    let path = Path::new(output_dir).join("clusters.json");
    let mut file = File::create(path)?;

    let clusters_json = json!({
        "clusters": clusters.iter().map(|c| {
            json!({
                "id": c.id,
                "size": c.size,
                "total_weight": c.total_weight,
                "internal_edge_weight": c.internal_edge_weight,
                "density": c.density,
                "members": c.members.iter()
                    .map(|&node| network.node_label(node as usize))
                    .collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>()
    });

    file.write_all(to_string_pretty(&clusters_json)?.as_bytes())?;

    Ok(())
}

/// Write one `node_id<TAB>cluster` line per node
pub fn save_clustering(clustering: &Clustering, network: &Network, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for node in 0..clustering.n_nodes() {
        writeln!(
            writer,
            "{}",
            [network.node_label(node), clustering.cluster_of(node).to_string()].iter().join("\t")
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a `node_id<TAB>cluster` file written by `save_clustering`
///
/// Nodes missing from the file get their own cluster; unknown node ids are
/// skipped with a warning.
pub fn load_clustering(path: &Path, network: &Network) -> Result<Clustering> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;

    let index: HashMap<String, usize> = (0..network.node_count())
        .map(|node| (network.node_label(node), node))
        .collect();

    let mut assigned: Vec<Option<usize>> = vec![None; network.node_count()];
    let mut unknown = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (label, cluster) = line
            .split_whitespace()
            .collect_tuple()
            .ok_or_else(|| anyhow!("line {}: expected 'node cluster'", line_no + 1))?;
        let cluster: usize = cluster
            .parse()
            .with_context(|| format!("line {}: invalid cluster '{}'", line_no + 1, cluster))?;

        match index.get(label) {
            Some(&node) => assigned[node] = Some(cluster),
            None => unknown += 1,
        }
    }

    if unknown > 0 {
        log::warn!("Ignored {} nodes not present in the network", unknown);
    }

    let mut next = assigned.iter().flatten().max().map_or(0, |&max| max + 1);
    let clusters = assigned
        .into_iter()
        .map(|cluster| {
            cluster.unwrap_or_else(|| {
                next += 1;
                next - 1
            })
        })
        .collect();

    let mut clustering = Clustering::from_assignments(clusters);
    clustering.remove_empty_clusters();
    Ok(clustering)
}

/// Cache a loaded network in bincode format
pub fn save_network_cache(network: &Network, path: &Path) -> Result<()> {
    log::info!("Caching network to {}", path.display());
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, network)?;
    Ok(())
}

/// Load a network cached by `save_network_cache`
pub fn load_network_cache(path: &Path) -> Result<Network> {
    log::info!("Loading cached network from {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let network: Network = bincode::deserialize_from(reader)?;
    network.validate()?;
    Ok(network)
}
