use std::sync::Arc;

use bevy::prelude::*;

use super::build::NavGrid;
use super::graph::CellId;

/// The grid currently in use, replaced wholesale by every rebuild.
///
/// Readers clone the [`Arc`] and keep a consistent grid even while a newer
/// one is swapped in. `generation` increases with every successful build.
#[derive(Resource, Default)]
pub struct ActiveNavGrid {
    grid: Option<Arc<NavGrid>>,
    generation: u64,
}

impl ActiveNavGrid {
    /// Current grid, if one was built.
    pub fn grid(&self) -> Option<&Arc<NavGrid>> {
        self.grid.as_ref()
    }

    /// Generation of the current grid; 0 before the first build.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Installs `grid` and returns its generation.
    pub fn replace(&mut self, grid: NavGrid) -> u64 {
        self.generation += 1;
        self.grid = Some(Arc::new(grid));
        self.generation
    }
}

/// Requests a rebuild of the navigation grid. Any number per frame collapse into one build.
#[derive(Message, Clone, Copy, Debug, Default)]
pub struct RebuildNavGrid;

/// Last path shown in the viewer.
#[derive(Resource, Default, Debug)]
pub struct ActivePath {
    /// Generation the path belongs to.
    pub generation: u64,
    /// Cells from start to target; empty when unreachable or none asked yet.
    pub cells: Vec<CellId>,
    /// Counter used to pick the next start/target pair.
    pub queries: usize,
    /// A request is in flight.
    pub pending: bool,
}

/// Marker for the merged cell mesh entity.
#[derive(Component, Reflect)]
pub struct NavGridMesh;
