//! Bottleneck identification
//!
//! Edge bottlenecks come either from a minimum cut separating aggregate supply
//! from aggregate demand, or from a capacity percentile threshold. Country
//! bottlenecks are countries whose inbound capacity covers too little of their
//! remaining need. The supply/demand flow summary is computed for both methods.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vaxequity_core::{BottleneckMethod, NeedScore};

use crate::flow::FlowGraph;
use crate::graph::{DistributionNetwork, NetworkNode};

/// A constraining supply -> country edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeBottleneck {
    /// Edge insertion index
    pub edge: usize,
    pub supply: String,
    pub country: String,
    pub capacity: f64,
}

/// A country whose inbound capacity falls short of its remaining need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryBottleneck {
    pub country: String,
    pub unvaccinated_population: f64,
    pub inbound_capacity: f64,
    /// inbound capacity / unvaccinated population
    pub coverage_ratio: f64,
}

/// Max-flow from all supply nodes to all remaining need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub max_flow: f64,
    pub total_supply: f64,
    pub total_need: f64,
    /// Supply nodes whose entire output is used by the maximum flow
    pub saturated_supply: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckSet {
    pub method: BottleneckMethod,
    /// Ordered by capacity ascending, then edge insertion order
    pub edges: Vec<EdgeBottleneck>,
    /// Ordered by coverage ratio ascending, then country code
    pub countries: Vec<CountryBottleneck>,
    pub flow: FlowSummary,
}

impl BottleneckSet {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.countries.is_empty()
    }

    /// Country bottlenecks in the order they should be relieved: highest need
    /// first, then lowest coverage ratio, then country code. Countries without
    /// a score rank as need 0.
    pub fn remediation_order(
        &self,
        scores: &BTreeMap<String, NeedScore>,
    ) -> Vec<&CountryBottleneck> {
        let need = |c: &CountryBottleneck| scores.get(&c.country).map_or(0.0, |s| s.value());
        let mut ordered: Vec<_> = self.countries.iter().collect();
        ordered.sort_by(|a, b| {
            need(b)
                .total_cmp(&need(a))
                .then_with(|| a.coverage_ratio.total_cmp(&b.coverage_ratio))
                .then_with(|| a.country.cmp(&b.country))
        });
        ordered
    }
}

/// Linear-interpolation percentile of an ascending slice
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = pct.clamp(0.0, 100.0) / 100.0 * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

fn edge_bottleneck(network: &DistributionNetwork, edge: usize) -> EdgeBottleneck {
    let e = network.edges()[edge];
    EdgeBottleneck {
        edge,
        supply: network.node(e.source).id().to_string(),
        country: network.node(e.target).id().to_string(),
        capacity: e.capacity,
    }
}

fn by_capacity(a: &EdgeBottleneck, b: &EdgeBottleneck) -> Ordering {
    a.capacity
        .total_cmp(&b.capacity)
        .then_with(|| a.edge.cmp(&b.edge))
}

fn percentile_bottlenecks(network: &DistributionNetwork, pct: f64) -> Vec<EdgeBottleneck> {
    let mut capacities: Vec<f64> = network.edges().iter().map(|e| e.capacity).collect();
    capacities.sort_by(f64::total_cmp);
    let Some(threshold) = percentile(&capacities, pct) else {
        return Vec::new();
    };
    debug!(percentile = pct, threshold, "capacity threshold");

    let mut edges: Vec<_> = network
        .edges()
        .iter()
        .enumerate()
        .filter(|(_, e)| e.capacity < threshold)
        .map(|(idx, _)| edge_bottleneck(network, idx))
        .collect();
    edges.sort_by(by_capacity);
    edges
}

/// Solves supply -> demand max flow. Returns the flow summary and the
/// network edges crossing the resulting minimum cut.
fn min_cut(network: &DistributionNetwork) -> (FlowSummary, Vec<EdgeBottleneck>) {
    let n = network.node_count();
    let (source, sink) = (n, n + 1);
    let mut graph = FlowGraph::new(n + 2);

    let mut supply_arcs = Vec::new();
    for node in network.supply_nodes() {
        if let NetworkNode::Supply {
            output_capacity, ..
        } = network.node(node)
        {
            supply_arcs.push((node, graph.add_arc(source, node, *output_capacity)));
        }
    }
    let edge_arcs: Vec<usize> = network
        .edges()
        .iter()
        .map(|e| graph.add_arc(e.source, e.target, e.capacity))
        .collect();
    let mut total_need = 0.0;
    for node in network.demand_nodes() {
        let need = network.node(node).unvaccinated_population();
        total_need += need;
        graph.add_arc(node, sink, need);
    }

    let max_flow = graph.max_flow(source, sink);
    let side = graph.source_side(source);

    let mut edges: Vec<_> = network
        .edges()
        .iter()
        .enumerate()
        .filter(|(idx, e)| {
            side[e.source] && !side[e.target] && graph.is_saturated(edge_arcs[*idx])
        })
        .map(|(idx, _)| edge_bottleneck(network, idx))
        .collect();
    edges.sort_by(by_capacity);

    let mut saturated_supply: Vec<String> = supply_arcs
        .iter()
        .filter(|(_, arc)| graph.flow(*arc) > 0.0 && graph.is_saturated(*arc))
        .map(|(node, _)| network.node(*node).id().to_string())
        .collect();
    saturated_supply.sort();

    let summary = FlowSummary {
        max_flow,
        total_supply: network.total_supply(),
        total_need,
        saturated_supply,
    };
    (summary, edges)
}

fn country_bottlenecks(network: &DistributionNetwork, threshold: f64) -> Vec<CountryBottleneck> {
    let mut countries: Vec<_> = network
        .demand_nodes()
        .filter_map(|node| {
            let need = network.node(node).unvaccinated_population();
            if need <= 0.0 {
                return None;
            }
            let inbound = network.inbound_capacity_of(node);
            let ratio = inbound / need;
            (ratio < threshold).then(|| CountryBottleneck {
                country: network.node(node).id().to_string(),
                unvaccinated_population: need,
                inbound_capacity: inbound,
                coverage_ratio: ratio,
            })
        })
        .collect();
    countries.sort_by(|a, b| {
        a.coverage_ratio
            .total_cmp(&b.coverage_ratio)
            .then_with(|| a.country.cmp(&b.country))
    });
    countries
}

/// Identify edge and country bottlenecks in `network`.
pub fn find_bottlenecks(
    network: &DistributionNetwork,
    method: BottleneckMethod,
    country_coverage_threshold: f64,
) -> BottleneckSet {
    let (flow, cut_edges) = min_cut(network);
    let edges = match method {
        BottleneckMethod::MinCut => cut_edges,
        BottleneckMethod::Percentile { percentile } => percentile_bottlenecks(network, percentile),
    };
    let countries = country_bottlenecks(network, country_coverage_threshold);

    info!(
        ?method,
        edges = edges.len(),
        countries = countries.len(),
        max_flow = flow.max_flow,
        "bottlenecks identified"
    );
    BottleneckSet {
        method,
        edges,
        countries,
        flow,
    }
}
