//! Vaccine distribution network
//!
//! Builds a directed hub-and-spoke graph from supply hubs to countries, then
//! computes degree/betweenness centrality and identifies capacity bottlenecks.

pub mod bottleneck;
pub mod builder;
pub mod centrality;
mod flow;
pub mod graph;
pub mod report;

pub use bottleneck::{
    find_bottlenecks, BottleneckSet, CountryBottleneck, EdgeBottleneck, FlowSummary,
};
pub use builder::{edge_capacity, NetworkBuilder};
pub use centrality::Centrality;
pub use graph::{DistributionNetwork, NetworkEdge, NetworkNode, NodeKind};
pub use report::{EdgeReport, NetworkAnalysis, NetworkReport, NodeReport};
