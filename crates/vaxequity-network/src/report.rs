//! Serializable network analysis output

use serde::{Deserialize, Serialize};
use vaxequity_core::{ConfigurationError, CountryTable, NetworkConfig};

use crate::bottleneck::{find_bottlenecks, BottleneckSet};
use crate::builder::NetworkBuilder;
use crate::centrality::Centrality;
use crate::graph::{DistributionNetwork, NetworkNode, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccination_rate: Option<f64>,
    pub inbound_capacity: f64,
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeReport {
    pub source: String,
    pub target: String,
    pub capacity: f64,
}

/// Network structure, centrality and bottlenecks in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_supply: f64,
    pub nodes: Vec<NodeReport>,
    pub edges: Vec<EdgeReport>,
    pub bottlenecks: BottleneckSet,
}

/// A built network together with its analyses
#[derive(Debug, Clone)]
pub struct NetworkAnalysis {
    pub network: DistributionNetwork,
    pub centrality: Centrality,
    pub bottlenecks: BottleneckSet,
}

impl NetworkAnalysis {
    /// Build the network for `table` and run centrality and bottleneck analysis.
    pub fn run(config: &NetworkConfig, table: &CountryTable) -> Result<Self, ConfigurationError> {
        let network = NetworkBuilder::new(config).build(table)?;
        Ok(Self::analyze(network, config))
    }

    pub fn analyze(network: DistributionNetwork, config: &NetworkConfig) -> Self {
        let centrality = Centrality::compute(&network, config.path_weighting);
        let bottlenecks = find_bottlenecks(
            &network,
            config.bottleneck,
            config.country_coverage_threshold,
        );
        Self {
            network,
            centrality,
            bottlenecks,
        }
    }

    pub fn report(&self) -> NetworkReport {
        let network = &self.network;
        let nodes = network
            .nodes()
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let (output_capacity, population, vaccination_rate) = match node {
                    NetworkNode::Supply {
                        output_capacity, ..
                    } => (Some(*output_capacity), None, None),
                    NetworkNode::Demand {
                        population,
                        vaccination_rate,
                        ..
                    } => (None, Some(*population), Some(*vaccination_rate)),
                };
                NodeReport {
                    id: node.id().to_string(),
                    kind: node.kind(),
                    output_capacity,
                    population,
                    vaccination_rate,
                    inbound_capacity: network.inbound_capacity_of(idx),
                    degree_centrality: self.centrality.degree[idx],
                    betweenness_centrality: self.centrality.betweenness[idx],
                }
            })
            .collect();

        let edges = network
            .edges()
            .iter()
            .map(|e| EdgeReport {
                source: network.node(e.source).id().to_string(),
                target: network.node(e.target).id().to_string(),
                capacity: e.capacity,
            })
            .collect();

        NetworkReport {
            node_count: network.node_count(),
            edge_count: network.edge_count(),
            total_supply: network.total_supply(),
            nodes,
            edges,
            bottlenecks: self.bottlenecks.clone(),
        }
    }
}
