//! Cell graph and the greedy neighbor linking that builds it.

use std::collections::BTreeMap;
use std::fmt;

use bevy::platform::collections::{HashMap, HashSet};
use bevy::prelude::*;

use super::assembler::AssembledHex;
use super::error::NavGridError;
use super::obstacles::strip_bombing;
use super::session::{BuildSession, HitId};
use super::tiling::HexTiling;
use super::NavGridConfig;
use crate::environment::RayCaster;

/// Permanent id of a linked cell, displayed as `cell-N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct CellId(pub(crate) u32);

impl CellId {
    /// Sequence number inside its build.
    pub fn number(self) -> u32 {
        self.0
    }

    /// Id with the given sequence number.
    pub fn from_number(n: u32) -> Self {
        Self(n)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell-{}", self.0)
    }
}

/// Node data of one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CellNode {
    /// Center hit position.
    pub center: Vec3,
    /// Obstacle-adjusted center (equal to `center` when nothing was found).
    pub adapted_center: Vec3,
    /// Linked cells, in link order.
    pub neighbors: Vec<CellId>,
}

/// Undirected cell graph keyed by id.
#[derive(Clone, Debug, Default)]
pub struct CellGraph {
    nodes: BTreeMap<CellId, CellNode>,
}

impl CellGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node without neighbors; an existing node is left untouched.
    pub fn insert_node(&mut self, id: CellId, center: Vec3, adapted_center: Vec3) {
        self.nodes.entry(id).or_insert_with(|| CellNode {
            center,
            adapted_center,
            neighbors: Vec::new(),
        });
    }

    /// Records `a <-> b`. Both nodes must exist; repeated links are ignored.
    pub fn link(&mut self, a: CellId, b: CellId) {
        if a == b || !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(node) = self.nodes.get_mut(&from)
                && !node.neighbors.contains(&to)
            {
                node.neighbors.push(to);
            }
        }
    }

    /// Removes a node and every reference to it.
    pub fn remove(&mut self, id: CellId) -> Option<CellNode> {
        let node = self.nodes.remove(&id)?;
        for n in &node.neighbors {
            if let Some(other) = self.nodes.get_mut(n) {
                other.neighbors.retain(|x| *x != id);
            }
        }
        Some(node)
    }

    /// Node data by id.
    pub fn get(&self, id: CellId) -> Option<&CellNode> {
        self.nodes.get(&id)
    }

    /// Whether `id` is a node.
    pub fn contains(&self, id: CellId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Neighbor ids of `id` (empty for unknown ids).
    pub fn neighbors(&self, id: CellId) -> &[CellId] {
        self.nodes.get(&id).map_or(&[], |n| n.neighbors.as_slice())
    }

    /// All nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &CellNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True without nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.neighbors.len()).sum::<usize>() / 2
    }

    /// Checks degree bounds (1..=6), duplicate-free adjacency and symmetry.
    pub fn validate(&self) -> Result<(), NavGridError> {
        for (id, node) in &self.nodes {
            let degree = node.neighbors.len();
            if !(1..=6).contains(&degree) {
                return Err(NavGridError::DegreeOutOfRange { id: *id, degree });
            }
            let mut seen = HashSet::new();
            for n in &node.neighbors {
                if !seen.insert(*n) {
                    return Err(NavGridError::DuplicateNeighbor {
                        id: *id,
                        neighbor: *n,
                    });
                }
                if !self.neighbors(*n).contains(id) {
                    return Err(NavGridError::AsymmetricEdge { from: *id, to: *n });
                }
            }
        }
        Ok(())
    }
}

// ── Graph builder ───────────────────────────────────────────────────

/// Result of linking the assembled cells.
pub struct LinkedCells {
    /// The cell graph, not yet validated.
    pub graph: CellGraph,
    /// Id per cell, indexed like `hexes[h].cells[c]`; `None` for never-linked cells.
    pub ids: Vec<Vec<Option<CellId>>>,
    /// Strip checks actually cast.
    pub strip_checks: usize,
    /// Candidate links rejected by strip bombing.
    pub blocked_links: usize,
    /// Strip sample rays without any hit.
    pub strip_holes: usize,
}

/// Links cells of neighboring hexes.
///
/// Each unordered hex pair is handled once. Candidates are all cell pairs
/// whose center heights are within `max_height_neighbor_to_center`; those
/// pass the (cached) strip check, are sorted by ascending height difference
/// and realized greedily so every cell gets at most one link per direction.
/// Strip samples that found no surface are logged like sampling holes.
pub fn link_cells(
    hexes: &[AssembledHex],
    tiling: &HexTiling,
    session: &mut BuildSession,
    cfg: &NavGridConfig,
    surface: &dyn RayCaster,
) -> LinkedCells {
    let by_hex: HashMap<_, usize> = hexes.iter().enumerate().map(|(i, h)| (h.hex, i)).collect();
    let mut ids: Vec<Vec<Option<CellId>>> = hexes.iter().map(|h| vec![None; h.cells.len()]).collect();
    let mut graph = CellGraph::new();
    let mut strip_cache: HashMap<(HitId, HitId), bool> = HashMap::new();
    let mut strip_checks = 0;
    let mut blocked_links = 0;
    let mut strip_holes = 0;
    let max_diff = cfg.tolerances.max_height_neighbor_to_center;

    for (a_idx, a_hex) in hexes.iter().enumerate() {
        for neighbor in tiling.neighbors(a_hex.hex) {
            let Some(&b_idx) = by_hex.get(&neighbor) else {
                continue;
            };
            if b_idx <= a_idx {
                continue;
            }
            let b_hex = &hexes[b_idx];

            let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
            for (ca, cell_a) in a_hex.cells.iter().enumerate() {
                for (cb, cell_b) in b_hex.cells.iter().enumerate() {
                    let ya = session.hits.height(cell_a.center);
                    let yb = session.hits.height(cell_b.center);
                    let diff = (ya - yb).abs();
                    if diff > max_diff {
                        continue;
                    }
                    if cfg.check_for_obstacles_between_cells {
                        let key = if cell_a.center <= cell_b.center {
                            (cell_a.center, cell_b.center)
                        } else {
                            (cell_b.center, cell_a.center)
                        };
                        let blocked = *strip_cache.entry(key).or_insert_with(|| {
                            strip_checks += 1;
                            let verdict = strip_bombing(
                                cell_a.adapted_center,
                                cell_b.adapted_center,
                                cfg.tiling.cell_radius,
                                &cfg.obstacles,
                                surface,
                            );
                            strip_holes += verdict.holes;
                            verdict.blocked
                        });
                        if blocked {
                            blocked_links += 1;
                            continue;
                        }
                    }
                    candidates.push((ca, cb, diff));
                }
            }
            candidates.sort_by(|x, y| x.2.total_cmp(&y.2));

            let mut used_a = HashSet::new();
            let mut used_b = HashSet::new();
            for (ca, cb, _) in candidates {
                if used_a.contains(&ca) || used_b.contains(&cb) {
                    continue;
                }
                used_a.insert(ca);
                used_b.insert(cb);

                let id_a = *ids[a_idx][ca].get_or_insert_with(|| session.ids.allocate());
                let id_b = *ids[b_idx][cb].get_or_insert_with(|| session.ids.allocate());
                let cell_a = &a_hex.cells[ca];
                let cell_b = &b_hex.cells[cb];
                graph.insert_node(
                    id_a,
                    session.hits[cell_a.center].point,
                    cell_a.adapted_center,
                );
                graph.insert_node(
                    id_b,
                    session.hits[cell_b.center].point,
                    cell_b.adapted_center,
                );
                graph.link(id_a, id_b);
            }
        }
    }

    if strip_holes > 0 {
        if cfg.sampling.print_hole_warnings {
            warn!("strip bombing: {strip_holes} rays found no surface");
        } else {
            debug!("strip bombing: {strip_holes} rays found no surface");
        }
    }

    LinkedCells {
        graph,
        ids,
        strip_checks,
        blocked_links,
        strip_holes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, SurfaceHit, SurfaceShape};
    use crate::navgrid::{Cell, PlanarKey};

    fn node(graph: &mut CellGraph, n: u32) -> CellId {
        let id = CellId(n);
        graph.insert_node(id, Vec3::new(n as f32, 0.0, 0.0), Vec3::new(n as f32, 0.0, 0.0));
        id
    }

    #[test]
    fn cell_id_display() {
        assert_eq!(CellId(12).to_string(), "cell-12");
    }

    #[test]
    fn link_is_symmetric_and_deduplicated() {
        let mut g = CellGraph::new();
        let a = node(&mut g, 0);
        let b = node(&mut g, 1);
        g.link(a, b);
        g.link(b, a);
        g.link(a, a);
        assert_eq!(g.neighbors(a), &[b]);
        assert_eq!(g.neighbors(b), &[a]);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.validate(), Ok(()));
    }

    #[test]
    fn remove_prunes_neighbor_lists() {
        let mut g = CellGraph::new();
        let a = node(&mut g, 0);
        let b = node(&mut g, 1);
        let c = node(&mut g, 2);
        g.link(a, b);
        g.link(b, c);
        g.remove(b);
        assert!(!g.contains(b));
        assert!(g.neighbors(a).is_empty());
        assert!(g.neighbors(c).is_empty());
    }

    #[test]
    fn validate_reports_each_violation() {
        let mut g = CellGraph::new();
        let a = node(&mut g, 0);
        assert_eq!(
            g.validate(),
            Err(NavGridError::DegreeOutOfRange { id: a, degree: 0 })
        );

        let b = node(&mut g, 1);
        g.link(a, b);
        g.nodes.get_mut(&b).unwrap().neighbors.clear();
        g.nodes.get_mut(&b).unwrap().neighbors.push(CellId(5));
        let err = g.validate().unwrap_err();
        assert_eq!(err, NavGridError::AsymmetricEdge { from: a, to: b });

        let mut g = CellGraph::new();
        let a = node(&mut g, 0);
        let b = node(&mut g, 1);
        g.link(a, b);
        g.nodes.get_mut(&a).unwrap().neighbors.push(b);
        assert_eq!(
            g.validate(),
            Err(NavGridError::DuplicateNeighbor { id: a, neighbor: b })
        );

        let mut g = CellGraph::new();
        let hub = node(&mut g, 0);
        for n in 1..=7 {
            let leaf = node(&mut g, n);
            g.nodes.get_mut(&hub).unwrap().neighbors.push(leaf);
            g.nodes.get_mut(&leaf).unwrap().neighbors.push(hub);
        }
        assert_eq!(
            g.validate(),
            Err(NavGridError::DegreeOutOfRange { id: hub, degree: 7 })
        );
    }

    // ── linking ─────────────────────────────────────────────────────

    fn two_hex_config() -> NavGridConfig {
        let mut cfg = NavGridConfig::default();
        cfg.tiling.cols = 2;
        cfg.tiling.rows = 1;
        cfg.tiling.offset_x = 0.0;
        cfg.tiling.offset_z = 0.0;
        cfg.check_for_obstacles_between_cells = true;
        cfg
    }

    /// One assembled hex per `(col, center heights)`, highest center first.
    fn stacked_hexes(
        session: &mut BuildSession,
        tiling: &HexTiling,
        columns: &[(i32, &[f32])],
    ) -> Vec<AssembledHex> {
        columns
            .iter()
            .map(|&(col, heights)| {
                let hex = tiling.hex_at(col, 0);
                let c = tiling.center(hex);
                let cells = heights
                    .iter()
                    .map(|&y| {
                        let point = Vec3::new(c.x, y, c.y);
                        let center = session.hits.push(SurfaceHit {
                            point,
                            normal: Vec3::Y,
                            distance: 30.0 - y,
                        });
                        Cell {
                            center,
                            corners: [center; 6],
                            adapted_center: point,
                        }
                    })
                    .collect();
                AssembledHex {
                    hex,
                    corner_keys: std::array::from_fn(|i| PlanarKey::new(tiling.corner(hex, i))),
                    cells,
                }
            })
            .collect()
    }

    /// Center heights of every link, lower first.
    fn linked_heights(linked: &LinkedCells) -> Vec<(f32, f32)> {
        let mut pairs = Vec::new();
        for (id, node) in linked.graph.iter() {
            for n in node.neighbors.iter().filter(|n| **n > id) {
                if let Some(other) = linked.graph.get(*n) {
                    let (y0, y1) = (node.center.y, other.center.y);
                    pairs.push((y0.min(y1), y0.max(y1)));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs
    }

    #[test]
    fn closest_heights_are_paired_first() {
        let mut cfg = two_hex_config();
        cfg.tolerances.max_height_neighbor_to_center = 10.0;
        cfg.obstacles.obstacle_height_neighbor = 100.0;
        let tiling = HexTiling::from_settings(&cfg.tiling);
        let mut session = BuildSession::new();
        let hexes = stacked_hexes(&mut session, &tiling, &[(0, &[6.0, 0.0]), (1, &[5.2, 1.0])]);

        let linked = link_cells(&hexes, &tiling, &mut session, &cfg, &Environment::flat(0.0));

        // all four pairs are candidates; 6-5.2 and 0-1 win over 6-1 and 0-5.2
        assert_eq!(linked.graph.edge_count(), 2);
        assert_eq!(linked_heights(&linked), vec![(0.0, 1.0), (5.2, 6.0)]);
        assert_eq!(linked.strip_checks, 4, "one strip check per cell pair");
        assert_eq!(linked.blocked_links, 0);
        assert_eq!(linked.strip_holes, 0);
        for (id, _) in linked.graph.iter() {
            assert_eq!(linked.graph.neighbors(id).len(), 1);
        }
        assert_eq!(linked.graph.validate(), Ok(()));
    }

    #[test]
    fn cell_without_partner_in_range_stays_unlinked() {
        let mut cfg = two_hex_config();
        cfg.check_for_obstacles_between_cells = false;
        let tiling = HexTiling::from_settings(&cfg.tiling);
        let mut session = BuildSession::new();
        let hexes = stacked_hexes(&mut session, &tiling, &[(0, &[6.0, 0.0]), (1, &[0.5])]);

        let linked = link_cells(&hexes, &tiling, &mut session, &cfg, &Environment::flat(0.0));

        assert_eq!(linked_heights(&linked), vec![(0.0, 0.5)]);
        assert_eq!(linked.ids[0][0], None, "upper cell never linked");
        assert!(linked.ids[0][1].is_some());
        assert_eq!(linked.strip_checks, 0);
    }

    #[test]
    fn strip_samples_over_a_gap_count_as_holes() {
        let mut cfg = two_hex_config();
        let tiling = HexTiling::from_settings(&cfg.tiling);
        let a = tiling.center(tiling.hex_at(0, 0));
        let b = tiling.center(tiling.hex_at(1, 0));
        let mid = (a.x + b.x) / 2.0;
        // two floors with nothing between them
        let env = Environment::new(vec![
            SurfaceShape::Block {
                min: Vec3::new(a.x - 5.0, -1.0, -5.0),
                max: Vec3::new(mid - 0.5, 0.0, 5.0),
            },
            SurfaceShape::Block {
                min: Vec3::new(mid + 0.5, -1.0, -5.0),
                max: Vec3::new(b.x + 5.0, 0.0, 5.0),
            },
        ]);
        let mut session = BuildSession::new();
        let hexes = stacked_hexes(&mut session, &tiling, &[(0, &[0.0]), (1, &[0.0])]);

        cfg.sampling.print_hole_warnings = true;
        let linked = link_cells(&hexes, &tiling, &mut session, &cfg, &env);

        assert_eq!(linked.strip_checks, 1);
        assert!(linked.strip_holes > 0);
        assert_eq!(linked.graph.edge_count(), 1, "holes are skipped, not obstacles");
    }
}
