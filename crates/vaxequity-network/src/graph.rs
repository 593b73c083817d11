//! Adjacency-list representation of the distribution network

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which namespace a node id lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Supply,
    Demand,
}

/// A manufacturer/hub or a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkNode {
    Supply {
        id: String,
        output_capacity: f64,
    },
    Demand {
        country_code: String,
        population: f64,
        vaccination_rate: f64,
    },
}

impl NetworkNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            NetworkNode::Supply { .. } => NodeKind::Supply,
            NetworkNode::Demand { .. } => NodeKind::Demand,
        }
    }

    /// Supply id or country code
    pub fn id(&self) -> &str {
        match self {
            NetworkNode::Supply { id, .. } => id,
            NetworkNode::Demand { country_code, .. } => country_code,
        }
    }

    /// Remaining need of a demand node; 0 for supply nodes
    pub fn unvaccinated_population(&self) -> f64 {
        match self {
            NetworkNode::Supply { .. } => 0.0,
            NetworkNode::Demand {
                population,
                vaccination_rate,
                ..
            } => population * (1.0 - vaccination_rate).clamp(0.0, 1.0),
        }
    }
}

/// Directed supply -> demand edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: usize,
    pub target: usize,
    pub capacity: f64,
}

/// Hub-and-spoke network: supply nodes first (configuration order), then
/// demand nodes (ascending country code). Edge indices follow insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionNetwork {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    supply_index: BTreeMap<String, usize>,
    demand_index: BTreeMap<String, usize>,
}

impl DistributionNetwork {
    pub(crate) fn from_parts(nodes: Vec<NetworkNode>, edges: Vec<NetworkEdge>) -> Self {
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (idx, edge) in edges.iter().enumerate() {
            outgoing[edge.source].push(idx);
            incoming[edge.target].push(idx);
        }

        let mut supply_index = BTreeMap::new();
        let mut demand_index = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            match node.kind() {
                NodeKind::Supply => supply_index.insert(node.id().to_string(), idx),
                NodeKind::Demand => demand_index.insert(node.id().to_string(), idx),
            };
        }

        Self {
            nodes,
            edges,
            outgoing,
            incoming,
            supply_index,
            demand_index,
        }
    }

    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn node(&self, idx: usize) -> &NetworkNode {
        &self.nodes[idx]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Indices of edges leaving `node`
    pub fn out_edges(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    /// Indices of edges entering `node`
    pub fn in_edges(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    pub fn supply_node(&self, id: &str) -> Option<usize> {
        self.supply_index.get(id).copied()
    }

    pub fn demand_node(&self, country_code: &str) -> Option<usize> {
        self.demand_index.get(country_code).copied()
    }

    pub fn supply_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.supply_index.values().copied()
    }

    pub fn demand_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.demand_index.values().copied()
    }

    pub fn total_supply(&self) -> f64 {
        self.nodes
            .iter()
            .map(|node| match node {
                NetworkNode::Supply {
                    output_capacity, ..
                } => *output_capacity,
                NetworkNode::Demand { .. } => 0.0,
            })
            .sum()
    }

    /// Sum of capacities of edges terminating at `node`
    pub fn inbound_capacity_of(&self, node: usize) -> f64 {
        self.incoming[node]
            .iter()
            .map(|&e| self.edges[e].capacity)
            .sum()
    }

    /// Sum of capacities of edges terminating at the country's node
    pub fn inbound_capacity(&self, country_code: &str) -> Option<f64> {
        self.demand_node(country_code)
            .map(|node| self.inbound_capacity_of(node))
    }

    /// Inbound capacity for every country, keyed by country code
    pub fn inbound_capacities(&self) -> BTreeMap<String, f64> {
        self.demand_index
            .iter()
            .map(|(code, &node)| (code.clone(), self.inbound_capacity_of(node)))
            .collect()
    }

    /// Per-node adjacency with edge capacities, used by path algorithms
    pub(crate) fn capacity_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        self.outgoing
            .iter()
            .map(|edges| {
                edges
                    .iter()
                    .map(|&e| (self.edges[e].target, self.edges[e].capacity))
                    .collect()
            })
            .collect()
    }
}
