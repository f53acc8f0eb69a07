//! Network loading from edge-list files

pub mod edgelist;
pub mod parquet;

use anyhow::Result;
use crate::graph::{Network, NodeWeighting};

/// Load a network, choosing the reader by file extension
pub fn load_network(path: &str, weighting: NodeWeighting) -> Result<Network> {
    let network = if path.ends_with(".parquet") {
        parquet::load_edge_list(path, weighting)?
    } else {
        edgelist::load_edge_list(path, weighting)?
    };

    network.validate()?;
    log::info!(
        "Loaded network with {} nodes and {} edges ({} bytes)",
        network.node_count(),
        network.edge_count(),
        network.memory_usage()
    );

    Ok(network)
}
