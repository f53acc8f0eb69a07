//! Parquet file handling for weighted edge lists

use anyhow::{anyhow, Result};
use polars::prelude::*;
use crate::graph::{Network, NetworkBuilder, NodeWeighting};

/// Load an undirected edge list from a Parquet file
///
/// The file needs `source` and `target` columns (any type castable to
/// string) and may carry a numeric `weight` column; missing weights count
/// as 1. Rows with a null endpoint are skipped.
pub fn load_edge_list(path: &str, weighting: NodeWeighting) -> Result<Network> {
    log::info!("Reading parquet file: {}", path);

    if !std::path::Path::new(path).exists() {
        return Err(anyhow!("File not found: {}", path));
    }

    let raw = LazyFrame::scan_parquet(path, Default::default())?.collect()?;
    log::debug!("File schema: {:?}", raw.schema());

    let has_weight = raw.get_column_index("weight").is_some();
    let mut columns = vec![
        col("source").cast(DataType::String),
        col("target").cast(DataType::String),
    ];
    if has_weight {
        columns.push(col("weight").cast(DataType::Float64));
    }
    let df = raw.lazy().select(columns).collect()?;

    let row_count = df.height();
    log::info!("Processing {} edges", row_count);

    let source_col = df.column("source")?.str()?;
    let target_col = df.column("target")?.str()?;
    let weight_col = if has_weight {
        Some(df.column("weight")?.f64()?)
    } else {
        None
    };

    let mut builder = NetworkBuilder::with_capacity(row_count);
    let mut skipped = 0usize;
    for i in 0..row_count {
        let (Some(src), Some(dst)) = (source_col.get(i), target_col.get(i)) else {
            skipped += 1;
            continue;
        };
        let weight = weight_col
            .and_then(|weights| weights.get(i))
            .unwrap_or(1.0);
        builder.add_edge(src, dst, weight)?;
    }

    if skipped > 0 {
        log::warn!("Skipped {} rows with a missing endpoint", skipped);
    }

    Ok(builder.build(weighting)?)
}
