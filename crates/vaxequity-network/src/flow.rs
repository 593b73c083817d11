//! Edmonds-Karp maximum flow over a residual graph

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
struct Arc {
    to: usize,
    capacity: f64,
    flow: f64,
}

impl Arc {
    fn residual(&self) -> f64 {
        self.capacity - self.flow
    }
}

/// Arcs are stored in pairs: arc `i` and its reverse `i ^ 1`.
#[derive(Debug, Clone)]
pub(crate) struct FlowGraph {
    arcs: Vec<Arc>,
    adjacency: Vec<Vec<usize>>,
    tolerance: f64,
}

impl FlowGraph {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            arcs: Vec::new(),
            adjacency: vec![Vec::new(); nodes],
            tolerance: 0.0,
        }
    }

    /// Adds `from -> to` and returns its arc id.
    pub(crate) fn add_arc(&mut self, from: usize, to: usize, capacity: f64) -> usize {
        let id = self.arcs.len();
        self.arcs.push(Arc {
            to,
            capacity,
            flow: 0.0,
        });
        self.arcs.push(Arc {
            to: from,
            capacity: 0.0,
            flow: 0.0,
        });
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
        self.tolerance = self.tolerance.max(capacity.abs() * 1e-12);
        id
    }

    pub(crate) fn flow(&self, arc: usize) -> f64 {
        self.arcs[arc].flow
    }

    pub(crate) fn is_saturated(&self, arc: usize) -> bool {
        self.arcs[arc].residual() <= self.tolerance
    }

    /// Shortest augmenting path as the arc leading into each node
    fn augmenting_path(&self, source: usize, sink: usize) -> Option<Vec<Option<usize>>> {
        let mut via: Vec<Option<usize>> = vec![None; self.adjacency.len()];
        let mut visited = vec![false; self.adjacency.len()];
        visited[source] = true;

        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            for &id in &self.adjacency[v] {
                let arc = self.arcs[id];
                if !visited[arc.to] && arc.residual() > self.tolerance {
                    visited[arc.to] = true;
                    via[arc.to] = Some(id);
                    if arc.to == sink {
                        return Some(via);
                    }
                    queue.push_back(arc.to);
                }
            }
        }
        None
    }

    pub(crate) fn max_flow(&mut self, source: usize, sink: usize) -> f64 {
        let mut total = 0.0;
        while let Some(via) = self.augmenting_path(source, sink) {
            let mut bottleneck = f64::INFINITY;
            let mut node = sink;
            while let Some(id) = via[node] {
                bottleneck = bottleneck.min(self.arcs[id].residual());
                node = self.arcs[id ^ 1].to;
            }

            let mut node = sink;
            while let Some(id) = via[node] {
                self.arcs[id].flow += bottleneck;
                self.arcs[id ^ 1].flow -= bottleneck;
                node = self.arcs[id ^ 1].to;
            }
            total += bottleneck;
        }
        total
    }

    /// Nodes reachable from `source` in the residual graph (the source side of a minimum cut)
    pub(crate) fn source_side(&self, source: usize) -> Vec<bool> {
        let mut reachable = vec![false; self.adjacency.len()];
        reachable[source] = true;
        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            for &id in &self.adjacency[v] {
                let arc = self.arcs[id];
                if !reachable[arc.to] && arc.residual() > self.tolerance {
                    reachable[arc.to] = true;
                    queue.push_back(arc.to);
                }
            }
        }
        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diamond_max_flow() {
        // 0 -> {1, 2} -> 3
        let mut graph = FlowGraph::new(4);
        graph.add_arc(0, 1, 3.0);
        graph.add_arc(0, 2, 2.0);
        let a = graph.add_arc(1, 3, 1.0);
        let b = graph.add_arc(2, 3, 5.0);

        assert_eq!(graph.max_flow(0, 3), 3.0);
        assert!(graph.is_saturated(a));
        assert!(!graph.is_saturated(b));
        assert_eq!(graph.flow(b), 2.0);

        let side = graph.source_side(0);
        assert_eq!(side, vec![true, true, false, false]);
    }

    #[test]
    fn test_flow_uses_reverse_arcs() {
        // the first BFS path 0-1-3 must be partially undone
        let mut graph = FlowGraph::new(4);
        graph.add_arc(0, 1, 1.0);
        graph.add_arc(0, 2, 1.0);
        graph.add_arc(1, 2, 1.0);
        graph.add_arc(1, 3, 1.0);
        graph.add_arc(2, 3, 1.0);
        assert_eq!(graph.max_flow(0, 3), 2.0);
    }

    #[test]
    fn test_disconnected_sink() {
        let mut graph = FlowGraph::new(3);
        graph.add_arc(0, 1, 4.0);
        assert_eq!(graph.max_flow(0, 2), 0.0);
        assert_eq!(graph.source_side(0), vec![true, true, false]);
    }
}
