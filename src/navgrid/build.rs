use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use hexx::Hex;

use super::assembler::{AssembledHex, assemble_all};
use super::corner_merge::merge_stacked_corners;
use super::error::NavGridError;
use super::graph::{CellGraph, CellId, link_cells};
use super::islands::{default_seed, remove_islands};
use super::obstacles::center_bombing;
use super::sampler::sample_tiling;
use super::session::BuildSession;
use super::tiling::HexTiling;
use super::NavGridConfig;
use crate::environment::{RayCaster, SurfaceHit};
use crate::pathfinding::GraphIndex;

/// Counters collected while building a grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Reflect)]
pub struct BuildStats {
    /// Hexes in the tiling.
    pub hexes: usize,
    /// Hexes dropped for a missing center or corner hit.
    pub holes: usize,
    /// Cells produced by assembly.
    pub cells_assembled: usize,
    /// Corner hits folded into a lower neighbor.
    pub corners_merged: usize,
    /// Cells dropped by center bombing.
    pub cells_blocked: usize,
    /// Strip checks cast.
    pub strip_checks: usize,
    /// Links rejected by strip bombing.
    pub blocked_links: usize,
    /// Strip sample rays that found no surface.
    pub strip_holes: usize,
    /// Cells that never got a link.
    pub cells_unlinked: usize,
    /// Cells removed as unreachable from the seed.
    pub islands_removed: usize,
    /// Cells in the final grid.
    pub cells: usize,
    /// Undirected links in the final grid.
    pub edges: usize,
}

/// Geometry of one cell of the final grid.
#[derive(Clone, Debug, PartialEq)]
pub struct NavCell {
    /// Graph id.
    pub id: CellId,
    /// Planar hex the cell sits in.
    pub hex: Hex,
    /// Center hit.
    pub center: SurfaceHit,
    /// Corner hits; slot `i` lies under [`HexTiling::corner`]`(hex, i)`, at
    /// `60°·i` (flat) or `60°·i - 30°` (pointy) from +x toward +z.
    pub corners: [SurfaceHit; 6],
    /// Obstacle-adjusted center.
    pub adapted_center: Vec3,
}

/// A finished navigation grid: cell graph, per-cell geometry and a search index.
///
/// Immutable once built; a rebuild produces a new value.
pub struct NavGrid {
    graph: CellGraph,
    cells: Vec<NavCell>,
    lookup: HashMap<CellId, usize>,
    index: GraphIndex,
    seed: Option<CellId>,
    stats: BuildStats,
}

impl NavGrid {
    /// The cell graph.
    pub fn graph(&self) -> &CellGraph {
        &self.graph
    }

    /// All cells, in tiling order (stacked cells highest first).
    pub fn cells(&self) -> &[NavCell] {
        &self.cells
    }

    /// Cell geometry by id.
    pub fn cell(&self, id: CellId) -> Option<&NavCell> {
        self.lookup.get(&id).map(|i| &self.cells[*i])
    }

    /// Cells at a planar hex.
    pub fn cells_at(&self, hex: Hex) -> impl Iterator<Item = &NavCell> {
        self.cells.iter().filter(move |c| c.hex == hex)
    }

    /// Search index over the graph.
    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    /// Seed used by island removal, if it ran.
    pub fn seed(&self) -> Option<CellId> {
        self.seed
    }

    /// Build counters.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Shortest cell path, empty when unreachable or an id is unknown.
    pub fn find_path(&self, start: CellId, target: CellId) -> Vec<CellId> {
        self.index.find(start, target)
    }
}

/// Builds a navigation grid from scratch.
///
/// Resets `session`, then samples, assembles, merges stacked corners, runs
/// center bombing, links neighbors, validates the graph and removes islands.
/// Only configuration errors and invariant violations are errors.
pub fn build_grid(
    session: &mut BuildSession,
    cfg: &NavGridConfig,
    surface: &dyn RayCaster,
) -> Result<NavGrid, NavGridError> {
    cfg.validate()?;
    session.reset();
    let tiling = HexTiling::from_settings(&cfg.tiling);
    let mut stats = BuildStats {
        hexes: tiling.len(),
        ..default()
    };

    let (samples, holes) = sample_tiling(session, &tiling, &cfg.sampling, surface);
    stats.holes = holes;

    let mut hexes = assemble_all(&samples, &session.hits, &cfg.tolerances)?;
    stats.cells_assembled = hexes.iter().map(|h| h.cells.len()).sum();

    if cfg.merge_stacked_corners {
        stats.corners_merged = merge_stacked_corners(&mut hexes, &session.hits, &cfg.tolerances);
    }

    if cfg.check_for_obstacles {
        stats.cells_blocked = drop_blocked_cells(&mut hexes, session, cfg, surface);
    }

    let linked = link_cells(&hexes, &tiling, session, cfg, surface);
    stats.strip_checks = linked.strip_checks;
    stats.blocked_links = linked.blocked_links;
    stats.strip_holes = linked.strip_holes;
    debug!(
        "linking: {} ids allocated, {} corner rays cached",
        session.ids.allocated(),
        session.cached_corners()
    );
    let mut graph = linked.graph;
    let remaining: usize = hexes.iter().map(|h| h.cells.len()).sum();
    stats.cells_unlinked = remaining - graph.len();

    if let Err(e) = graph.validate() {
        error!("navigation graph violates its invariants: {e}");
        return Err(e);
    }

    let seed = if cfg.islands.no_cell_islands {
        pick_seed(&graph, cfg, &tiling)
    } else {
        None
    };
    if let Some(seed) = seed {
        stats.islands_removed = remove_islands(&mut graph, seed).len();
    }

    let mut cells = Vec::with_capacity(graph.len());
    for (h, hex) in hexes.iter().enumerate() {
        for (c, cell) in hex.cells.iter().enumerate() {
            let Some(id) = linked.ids[h][c] else { continue };
            if !graph.contains(id) {
                continue;
            }
            cells.push(NavCell {
                id,
                hex: hex.hex,
                center: session.hits[cell.center],
                corners: cell.corners.map(|k| session.hits[k]),
                adapted_center: cell.adapted_center,
            });
        }
    }
    let lookup = cells.iter().enumerate().map(|(i, c)| (c.id, i)).collect();

    stats.cells = cells.len();
    stats.edges = graph.edge_count();
    info!(
        "nav grid built: {} hexes ({} holes), {} cells assembled, {} corners merged, \
         {} blocked, {} links blocked, {} unlinked, {} island cells removed -> {} cells, {} edges",
        stats.hexes,
        stats.holes,
        stats.cells_assembled,
        stats.corners_merged,
        stats.cells_blocked,
        stats.blocked_links,
        stats.cells_unlinked,
        stats.islands_removed,
        stats.cells,
        stats.edges,
    );

    let index = GraphIndex::from_graph(&graph);
    Ok(NavGrid {
        graph,
        cells,
        lookup,
        index,
        seed,
        stats,
    })
}

/// Runs center bombing on every cell, drops blocked cells and stores the
/// adapted centers of the others. Returns the number of dropped cells.
fn drop_blocked_cells(
    hexes: &mut Vec<AssembledHex>,
    session: &BuildSession,
    cfg: &NavGridConfig,
    surface: &dyn RayCaster,
) -> usize {
    let mut blocked = 0;
    let mut holes = 0;
    for hex in hexes.iter_mut() {
        hex.cells.retain_mut(|cell| {
            let verdict = center_bombing(
                session.hits[cell.center].point,
                cfg.tiling.cell_radius,
                &cfg.obstacles,
                surface,
            );
            holes += verdict.holes;
            if verdict.blocked {
                blocked += 1;
                return false;
            }
            cell.adapted_center = verdict.adapted_center;
            true
        });
    }
    hexes.retain(|h| !h.cells.is_empty());
    if holes > 0 {
        if cfg.sampling.print_hole_warnings {
            warn!("center bombing: {holes} rays found no surface");
        } else {
            debug!("center bombing: {holes} rays found no surface");
        }
    }
    blocked
}

fn pick_seed(graph: &CellGraph, cfg: &NavGridConfig, tiling: &HexTiling) -> Option<CellId> {
    match cfg.islands.seed_cell.map(CellId::from_number) {
        Some(id) if graph.contains(id) => Some(id),
        Some(id) => {
            warn!("island seed {id} is not in the graph; island removal skipped");
            None
        }
        None => default_seed(graph, tiling.planar_center()),
    }
}
