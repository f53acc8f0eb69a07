//! Weighted network representation and construction

pub mod network;
pub mod builder;

pub use network::Network;
pub use builder::{NetworkBuilder, NodeWeighting};
