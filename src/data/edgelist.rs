//! Plain-text edge list handling

use std::fs::File;
use std::io::{BufRead, BufReader};
use anyhow::{anyhow, Context, Result};
use crate::graph::{Network, NetworkBuilder, NodeWeighting};

/// Load a whitespace-separated `source target [weight]` edge list
pub fn load_edge_list(path: &str, weighting: NodeWeighting) -> Result<Network> {
    log::info!("Reading edge list: {}", path);

    let file = File::open(path).with_context(|| format!("cannot open {}", path))?;
    parse_edge_list(BufReader::new(file), weighting)
}

/// Parse an edge list; blank lines and lines starting with `#` are ignored
pub fn parse_edge_list<R: BufRead>(reader: R, weighting: NodeWeighting) -> Result<Network> {
    let mut builder = NetworkBuilder::with_capacity(1024);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(src), Some(dst)) = (fields.next(), fields.next()) else {
            return Err(anyhow!("line {}: expected 'source target [weight]'", line_no + 1));
        };
        let weight = match fields.next() {
            Some(field) => field
                .parse::<f64>()
                .with_context(|| format!("line {}: invalid weight '{}'", line_no + 1, field))?,
            None => 1.0,
        };

        builder
            .add_edge(src, dst, weight)
            .with_context(|| format!("line {}", line_no + 1))?;
    }

    Ok(builder.build(weighting)?)
}
