//! Shortest paths over a built [`CellGraph`].
//!
//! [`GraphIndex`] flattens the graph into index-addressed adjacency lists with
//! Euclidean edge costs between adapted cell centers; [`GraphIndex::find`]
//! runs a bidirectional NBA* search on it. The index is immutable after
//! construction, so any number of queries may share it. [`PathService`] moves
//! the queries onto a worker thread.

mod nba;
mod service;

pub use service::{PathRequest, PathResponse, PathService};

use bevy::platform::collections::HashMap;
use bevy::prelude::*;

use crate::navgrid::{CellGraph, CellId};

/// Read-only search index built from a [`CellGraph`].
#[derive(Clone, Debug, Default)]
pub struct GraphIndex {
    ids: Vec<CellId>,
    positions: Vec<Vec3>,
    adjacency: Vec<Vec<(usize, f32)>>,
    lookup: HashMap<CellId, usize>,
}

impl GraphIndex {
    /// Indexes every node and edge of `graph`.
    pub fn from_graph(graph: &CellGraph) -> Self {
        let ids: Vec<CellId> = graph.ids().collect();
        let lookup: HashMap<CellId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let positions: Vec<Vec3> = graph.iter().map(|(_, n)| n.adapted_center).collect();
        let adjacency = graph
            .iter()
            .map(|(_, node)| {
                node.neighbors
                    .iter()
                    .filter_map(|n| lookup.get(n).copied())
                    .collect::<Vec<_>>()
            })
            .enumerate()
            .map(|(i, ns)| {
                ns.into_iter()
                    .map(|j| (j, positions[i].distance(positions[j])))
                    .collect()
            })
            .collect();
        Self {
            ids,
            positions,
            adjacency,
            lookup,
        }
    }

    /// Number of indexed cells.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no cells are indexed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: CellId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Position used for costs and the heuristic.
    pub fn position(&self, id: CellId) -> Option<Vec3> {
        self.lookup.get(&id).map(|i| self.positions[*i])
    }

    /// Lowest-cost cell sequence from `start` to `target`, both inclusive.
    ///
    /// Empty when either id is unknown or the target is unreachable.
    pub fn find(&self, start: CellId, target: CellId) -> Vec<CellId> {
        let (Some(&s), Some(&t)) = (self.lookup.get(&start), self.lookup.get(&target)) else {
            return Vec::new();
        };
        nba::search(self, s, t)
            .into_iter()
            .map(|i| self.ids[i])
            .collect()
    }

    /// Sum of edge costs along `path`, `None` if two consecutive cells are not linked.
    pub fn path_cost(&self, path: &[CellId]) -> Option<f32> {
        let mut total = 0.0;
        for pair in path.windows(2) {
            let a = *self.lookup.get(&pair[0])?;
            let b = *self.lookup.get(&pair[1])?;
            let (_, cost) = self.adjacency[a].iter().find(|(n, _)| *n == b)?;
            total += cost;
        }
        Some(total)
    }

    fn edges(&self, i: usize) -> &[(usize, f32)] {
        &self.adjacency[i]
    }

    fn distance(&self, a: usize, b: usize) -> f32 {
        self.positions[a].distance(self.positions[b])
    }
}

/// One-off path query; builds a throwaway index.
pub fn find_path(graph: &CellGraph, start: CellId, target: CellId) -> Vec<CellId> {
    GraphIndex::from_graph(graph).find(start, target)
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;
    use std::collections::BinaryHeap;

    use super::*;

    /// `w` x `h` lattice with bumpy heights, straight and some diagonal links.
    fn lattice(w: u32, h: u32) -> CellGraph {
        let mut g = CellGraph::new();
        let id = |x: u32, z: u32| CellId::from_number(z * w + x);
        for z in 0..h {
            for x in 0..w {
                let y = ((x * 7 + z * 3) % 5) as f32 * 0.3;
                let p = Vec3::new(x as f32 * 2.0, y, z as f32 * 1.7);
                g.insert_node(id(x, z), p, p);
            }
        }
        for z in 0..h {
            for x in 0..w {
                if x + 1 < w {
                    g.link(id(x, z), id(x + 1, z));
                }
                if z + 1 < h {
                    g.link(id(x, z), id(x, z + 1));
                }
                if x + 1 < w && z + 1 < h && (x + z) % 3 == 0 {
                    g.link(id(x, z), id(x + 1, z + 1));
                }
            }
        }
        g
    }

    #[derive(PartialEq)]
    struct Entry(f32, usize);
    impl Eq for Entry {}
    impl PartialOrd for Entry {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Entry {
        fn cmp(&self, other: &Self) -> Ordering {
            other.0.total_cmp(&self.0).then(other.1.cmp(&self.1))
        }
    }

    /// Reference shortest-path cost.
    fn dijkstra(index: &GraphIndex, start: CellId, target: CellId) -> Option<f32> {
        let s = index.lookup[&start];
        let t = index.lookup[&target];
        let mut dist = vec![f32::INFINITY; index.len()];
        let mut heap = BinaryHeap::new();
        dist[s] = 0.0;
        heap.push(Entry(0.0, s));
        while let Some(Entry(d, u)) = heap.pop() {
            if u == t {
                return Some(d);
            }
            if d > dist[u] {
                continue;
            }
            for &(v, c) in index.edges(u) {
                if d + c < dist[v] {
                    dist[v] = d + c;
                    heap.push(Entry(d + c, v));
                }
            }
        }
        None
    }

    #[test]
    fn matches_dijkstra_on_every_pair() {
        let graph = lattice(5, 4);
        let index = GraphIndex::from_graph(&graph);
        for a in graph.ids() {
            for b in graph.ids() {
                let path = index.find(a, b);
                assert_eq!(path.first(), Some(&a));
                assert_eq!(path.last(), Some(&b));
                let cost = index.path_cost(&path).expect("path follows edges");
                let reference = dijkstra(&index, a, b).unwrap();
                assert!(
                    (cost - reference).abs() < 1e-4,
                    "{a} -> {b}: nba {cost} vs dijkstra {reference}"
                );
            }
        }
    }

    #[test]
    fn start_equals_target() {
        let graph = lattice(2, 2);
        let a = CellId::from_number(3);
        assert_eq!(find_path(&graph, a, a), vec![a]);
    }

    #[test]
    fn unknown_or_unreachable_is_empty() {
        let mut graph = lattice(3, 1);
        let lonely = CellId::from_number(99);
        graph.insert_node(lonely, Vec3::new(50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0));
        let a = CellId::from_number(0);
        assert!(find_path(&graph, a, lonely).is_empty());
        assert!(find_path(&graph, a, CellId::from_number(1234)).is_empty());
        assert!(find_path(&graph, CellId::from_number(1234), a).is_empty());
    }

    #[test]
    fn costs_use_adapted_centers() {
        let mut g = CellGraph::new();
        let [a, b, c] = [0, 1, 2].map(CellId::from_number);
        g.insert_node(a, Vec3::ZERO, Vec3::ZERO);
        g.insert_node(b, Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 5.0));
        g.insert_node(c, Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        g.link(a, b);
        g.link(b, c);
        let index = GraphIndex::from_graph(&g);
        let cost = index.path_cost(&index.find(a, c)).unwrap();
        assert!((cost - 2.0 * 26.0_f32.sqrt()).abs() < 1e-4);
    }
}
