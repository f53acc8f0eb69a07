use std::path::Path;
use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use cpm_cluster_analyzer::cluster::metrics;
use cpm_cluster_analyzer::config::{Config, DEFAULT_BATCH_SIZE, DEFAULT_NUM_WORKERS};
use cpm_cluster_analyzer::storage::{self, RunSummary};
use cpm_cluster_analyzer::{
    data, Clustering, IterativeCpmClustering, NodeWeighting, ParallelFastLocalMoving,
    SerialFastLocalMoving,
};

#[derive(Parser, Debug)]
#[clap(
    name = "cpm-cluster-analyzer",
    about = "Parallel CPM clustering of weighted networks by fast local moving"
)]
struct Cli {
    /// Path to input edge list (.parquet, or whitespace-separated text)
    #[clap(long)]
    input: String,

    /// Output directory for results
    #[clap(long, default_value = "cluster_results")]
    output_dir: String,

    /// CPM resolution parameter
    #[clap(long, default_value = "1.0")]
    resolution: f64,

    /// Number of local moving passes (0 = until a pass changes nothing)
    #[clap(long, default_value = "0")]
    iterations: usize,

    /// Local moving worker threads
    #[clap(long, default_value_t = DEFAULT_NUM_WORKERS)]
    workers: usize,

    /// Nodes a worker takes from the queue at once
    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Seed for the node visiting order
    #[clap(long)]
    seed: Option<u64>,

    /// Run the single-threaded algorithm instead of the worker pool
    #[clap(long)]
    serial: bool,

    /// Weigh nodes by their total edge weight instead of 1
    #[clap(long)]
    degree_weights: bool,

    /// Start from the clustering in this `node<TAB>cluster` file
    #[clap(long)]
    initial_clustering: Option<String>,

    /// Minimum cluster size included in clusters.json
    #[clap(long, default_value = "1")]
    min_cluster_size: usize,

    /// Binary network cache; read if present, written otherwise
    #[clap(long)]
    cache: Option<String>,

    /// Number of threads for quality and summary computation (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} rayon threads and {} local moving workers", num_threads, args.workers);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = Config {
        resolution: args.resolution,
        n_iterations: args.iterations,
        num_workers: args.workers,
        batch_size: args.batch_size,
        seed: args.seed,
        node_weighting: if args.degree_weights { NodeWeighting::Degree } else { NodeWeighting::Unit },
        min_cluster_size: args.min_cluster_size,
    };
    config.validate()?;

    log::info!("Starting CPM clustering");
    log::info!("Input: {}", args.input);
    log::info!("Output: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    // 1. Load network
    let network = match &args.cache {
        Some(cache) if Path::new(cache).exists() => storage::load_network_cache(Path::new(cache))?,
        Some(cache) => {
            let network = data::load_network(&args.input, config.node_weighting)?;
            storage::save_network_cache(&network, Path::new(cache))?;
            network
        }
        None => data::load_network(&args.input, config.node_weighting)?,
    };

    // 2. Initial clustering
    let mut clustering = match &args.initial_clustering {
        Some(path) => storage::load_clustering(Path::new(path), &network)?,
        None => Clustering::singletons(network.node_count()),
    };
    log::info!(
        "Initial clustering: {} clusters, quality {:.6}",
        clustering.n_clusters(),
        metrics::calc_quality(&network, &clustering, config.resolution)
    );

    // 3. Local moving
    let random = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut algorithm: Box<dyn IterativeCpmClustering> = if args.serial {
        Box::new(SerialFastLocalMoving::new(config.resolution, config.n_iterations, random))
    } else {
        Box::new(ParallelFastLocalMoving::from_config(&config, random)?)
    };

    let mut iterations = 0;
    loop {
        iterations += 1;
        let changed = algorithm.improve_clustering_one_iteration(&network, &mut clustering)?;
        log::info!(
            "Iteration {}: {} clusters, quality {:.6}",
            iterations,
            clustering.n_clusters(),
            metrics::calc_quality(&network, &clustering, config.resolution)
        );

        let done = if config.n_iterations > 0 {
            iterations >= config.n_iterations
        } else {
            !changed
        };
        if done {
            break;
        }
    }

    // 4. Save results
    clustering.order_clusters_by_weight(&network);
    let quality = metrics::calc_quality(&network, &clustering, config.resolution);
    let clusters = metrics::summarize_clusters(&network, &clustering, config.min_cluster_size);
    log::info!("Found {} clusters with quality {:.6}", clustering.n_clusters(), quality);

    let summary = RunSummary {
        resolution: config.resolution,
        quality,
        iterations,
        num_workers: if args.serial { 1 } else { config.num_workers },
    };
    storage::save_results(&clusters, &clustering, &network, &summary, &args.output_dir)?;

    log::info!("Analysis complete. Results saved to {}", args.output_dir);

    Ok(())
}
