//! Degree and betweenness centrality
//!
//! Betweenness uses Brandes' accumulation over single-source shortest paths,
//! with BFS for unweighted paths and Dijkstra for inverse-capacity weights.
//! Directed scores are normalized by `1 / ((n - 1)(n - 2))`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vaxequity_core::PathWeighting;

use crate::graph::DistributionNetwork;

/// Per-node centrality scores, indexed like the network's nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centrality {
    pub degree: Vec<f64>,
    pub betweenness: Vec<f64>,
}

impl Centrality {
    pub fn compute(network: &DistributionNetwork, weighting: PathWeighting) -> Self {
        let centrality = Self {
            degree: degree_centrality(network),
            betweenness: betweenness_centrality(network, weighting),
        };
        debug!(nodes = network.node_count(), ?weighting, "centrality computed");
        centrality
    }
}

/// (in-degree + out-degree) / (n - 1); all zeros for a single node
pub fn degree_centrality(network: &DistributionNetwork) -> Vec<f64> {
    let n = network.node_count();
    if n < 2 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    (0..n)
        .map(|node| (network.in_edges(node).len() + network.out_edges(node).len()) as f64 * scale)
        .collect()
}

pub fn betweenness_centrality(network: &DistributionNetwork, weighting: PathWeighting) -> Vec<f64> {
    let adjacency = network.capacity_adjacency();
    match weighting {
        PathWeighting::Unweighted => brandes(&adjacency, None),
        PathWeighting::InverseCapacity => brandes(&adjacency, Some(inverse_capacity)),
    }
}

/// Zero-capacity edges are unusable
fn inverse_capacity(capacity: f64) -> Option<f64> {
    (capacity > 0.0).then(|| 1.0 / capacity)
}

/// Brandes betweenness on a directed graph given as `(target, capacity)` lists.
pub(crate) fn brandes(
    adjacency: &[Vec<(usize, f64)>],
    weight: Option<fn(f64) -> Option<f64>>,
) -> Vec<f64> {
    let n = adjacency.len();
    let mut scores = vec![0.0; n];
    if n < 3 {
        return scores;
    }

    for source in 0..n {
        let paths = match weight {
            None => bfs_paths(adjacency, source),
            Some(weight) => dijkstra_paths(adjacency, source, weight),
        };

        let mut delta = vec![0.0; n];
        for &w in paths.order.iter().rev() {
            for &v in &paths.predecessors[w] {
                delta[v] += paths.sigma[v] / paths.sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                scores[w] += delta[w];
            }
        }
    }

    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    scores.iter_mut().for_each(|s| *s *= scale);
    scores
}

/// Single-source shortest-path DAG
struct ShortestPaths {
    /// Nodes in non-decreasing distance order
    order: Vec<usize>,
    predecessors: Vec<Vec<usize>>,
    /// Number of shortest paths from the source
    sigma: Vec<f64>,
}

impl ShortestPaths {
    fn new(n: usize, source: usize) -> Self {
        let mut sigma = vec![0.0; n];
        sigma[source] = 1.0;
        Self {
            order: Vec::with_capacity(n),
            predecessors: vec![Vec::new(); n],
            sigma,
        }
    }
}

fn bfs_paths(adjacency: &[Vec<(usize, f64)>], source: usize) -> ShortestPaths {
    let n = adjacency.len();
    let mut paths = ShortestPaths::new(n, source);
    let mut dist: Vec<Option<usize>> = vec![None; n];
    dist[source] = Some(0);

    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        paths.order.push(v);
        let next = dist[v].map_or(0, |d| d + 1);
        for &(w, _) in &adjacency[v] {
            if dist[w].is_none() {
                dist[w] = Some(next);
                queue.push_back(w);
            }
            if dist[w] == Some(next) {
                paths.sigma[w] += paths.sigma[v];
                paths.predecessors[w].push(v);
            }
        }
    }
    paths
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    dist: f64,
    node: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on distance, then node index for determinism
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra_paths(
    adjacency: &[Vec<(usize, f64)>],
    source: usize,
    weight: fn(f64) -> Option<f64>,
) -> ShortestPaths {
    let n = adjacency.len();
    let mut paths = ShortestPaths::new(n, source);
    let mut tentative = vec![f64::INFINITY; n];
    let mut settled = vec![false; n];
    tentative[source] = 0.0;

    let mut heap = BinaryHeap::from([QueueEntry {
        dist: 0.0,
        node: source,
    }]);
    while let Some(QueueEntry { dist, node: v }) = heap.pop() {
        if settled[v] {
            continue;
        }
        settled[v] = true;
        paths.order.push(v);

        for &(w, capacity) in &adjacency[v] {
            let Some(length) = weight(capacity) else {
                continue;
            };
            if settled[w] {
                continue;
            }
            let candidate = dist + length;
            if candidate < tentative[w] {
                tentative[w] = candidate;
                paths.sigma[w] = paths.sigma[v];
                paths.predecessors[w] = vec![v];
                heap.push(QueueEntry {
                    dist: candidate,
                    node: w,
                });
            } else if candidate == tentative[w] {
                paths.sigma[w] += paths.sigma[v];
                paths.predecessors[w].push(v);
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetworkBuilder;
    use vaxequity_core::{CountryRecord, CountryTable, NetworkConfig, SupplyNodeSpec};

    fn path_graph() -> Vec<Vec<(usize, f64)>> {
        // 0 -> 1 -> 2
        vec![vec![(1, 1.0)], vec![(2, 1.0)], vec![]]
    }

    #[test]
    fn test_path_middle_node_is_between() {
        let scores = brandes(&path_graph(), None);
        assert_eq!(scores, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_weighted_prefers_high_capacity_route() {
        // 0 -> 1 -> 3 (capacity 10 each), 0 -> 2 -> 3 (capacity 1 each)
        let adjacency = vec![
            vec![(1, 10.0), (2, 1.0)],
            vec![(3, 10.0)],
            vec![(3, 1.0)],
            vec![],
        ];
        let unweighted = brandes(&adjacency, None);
        assert_eq!(unweighted[1], unweighted[2]);

        let weighted = brandes(&adjacency, Some(inverse_capacity));
        assert!(weighted[1] > 0.0);
        assert_eq!(weighted[2], 0.0);
    }

    #[test]
    fn test_zero_capacity_edge_is_skipped_when_weighted() {
        let adjacency = vec![vec![(1, 0.0)], vec![(2, 1.0)], vec![]];
        assert_eq!(brandes(&adjacency, Some(inverse_capacity)), vec![0.0; 3]);
    }

    #[test]
    fn test_hub_and_spoke_centralities() {
        let table = CountryTable::from_records(vec![
            CountryRecord::new("AA", 10.0, 0.1),
            CountryRecord::new("BB", 20.0, 0.2),
            CountryRecord::new("CC", 30.0, 0.3),
        ])
        .unwrap();
        let config = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("h1", 5.0),
            SupplyNodeSpec::new("h2", 5.0),
        ]);
        let network = NetworkBuilder::new(&config).build(&table).unwrap();
        let centrality = Centrality::compute(&network, PathWeighting::Unweighted);

        // hubs touch 3 of 4 other nodes, countries 2 of 4
        assert_eq!(centrality.degree[0], 0.75);
        assert_eq!(centrality.degree[2], 0.5);
        // bipartite one-hop network: no node lies between two others
        assert!(centrality.betweenness.iter().all(|&b| b == 0.0));
    }
}
