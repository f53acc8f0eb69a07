//! Core library functions for the CPM cluster analyzer

pub mod config;
pub mod error;
pub mod graph;
pub mod permutation;
pub mod cluster;
pub mod local_moving;
pub mod data;
pub mod storage;

pub use anyhow::{Result, anyhow};
pub use cluster::Clustering;
pub use cluster::iterative::IterativeCpmClustering;
pub use error::ClusteringError;
pub use graph::{Network, NetworkBuilder, NodeWeighting};
pub use local_moving::{ParallelFastLocalMoving, PassStatistics, SerialFastLocalMoving};
