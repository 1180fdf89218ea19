//! Navigation grid: samples the environment with vertical rays on a hex tiling
//! and turns the hits into a graph of walkable, six-cornered cells.
//!
//! Pipeline (see [`build::build_grid`]): sample, assemble, merge stacked
//! corners, center obstacle bombing, neighbor graph with strip bombing,
//! island removal.

mod assembler;
mod build;
mod corner_merge;
mod entities;
mod error;
mod graph;
mod islands;
mod mesh;
mod obstacles;
mod sampler;
mod session;
mod systems;
mod tiling;

pub use assembler::{AssembledHex, Cell};
pub use build::{BuildStats, NavCell, NavGrid, build_grid};
pub use entities::{ActiveNavGrid, ActivePath, NavGridMesh, RebuildNavGrid};
pub use error::NavGridError;
pub use graph::{CellGraph, CellId, CellNode};
pub use mesh::{cell_triangles, nav_grid_mesh};
pub use obstacles::{CenterVerdict, StripVerdict, center_bombing, strip_bombing};
pub use session::{BuildSession, HitArena, HitId, PlanarKey};
pub use tiling::{CellOrientation, HexTiling};

use bevy::prelude::*;

use crate::GameState;
use crate::environment::SurfaceSource;
use crate::pathfinding::PathService;

/// Nested configuration for the navigation grid.
#[derive(Resource, Clone, Debug, Reflect)]
pub struct NavGridConfig {
    /// Planar hex tiling.
    pub tiling: TilingSettings,
    /// Vertical sampling rays.
    pub sampling: SamplingSettings,
    /// Height tolerances between centers, corners and neighbors.
    pub tolerances: ToleranceSettings,
    /// Obstacle bombing parameters.
    pub obstacles: ObstacleSettings,
    /// Island removal.
    pub islands: IslandSettings,
    /// Collapse near-coincident corner hits of adjacent cells.
    pub merge_stacked_corners: bool,
    /// Run center bombing and drop blocked cells.
    pub check_for_obstacles: bool,
    /// Run strip bombing before linking two cells.
    pub check_for_obstacles_between_cells: bool,
    /// Cell mesh appearance.
    pub render: CellRenderSettings,
}

/// Planar hex tiling parameters.
#[derive(Clone, Debug, Reflect)]
pub struct TilingSettings {
    /// Center-to-corner distance of a cell.
    pub cell_radius: f32,
    /// Pointy or flat tiling.
    pub orientation: CellOrientation,
    /// Number of columns.
    pub cols: u32,
    /// Number of rows.
    pub rows: u32,
    /// World `x` of the first hex center.
    pub offset_x: f32,
    /// World `z` of the first hex center.
    pub offset_z: f32,
}

/// Vertical sampling ray parameters.
#[derive(Clone, Debug, Reflect)]
pub struct SamplingSettings {
    /// World height the sampling rays start from.
    pub ray_start_height: f32,
    /// `y` component of the ray direction (negative casts down).
    pub ray_y_direction: f32,
    /// Keep only the closest hit of every ray.
    pub first_hit_only: bool,
    /// Log missing hits at `warn` instead of `debug`.
    pub print_hole_warnings: bool,
    /// Analytic shapes or the spawned environment meshes.
    pub surface_source: SurfaceSource,
}

/// Height tolerances.
#[derive(Clone, Debug, Reflect)]
pub struct ToleranceSettings {
    /// Center hits closer than this are one level.
    pub min_height_diff_stacked_cells: f32,
    /// Largest center-to-corner height difference inside a cell.
    pub max_height_center_to_corner: f32,
    /// Largest center height difference between linked cells.
    pub max_height_neighbor_to_center: f32,
    /// Corner hits closer than this may be merged.
    pub min_height_diff_stacked_corners: f32,
}

/// Center and strip obstacle bombing parameters.
#[derive(Clone, Debug, Reflect)]
pub struct ObstacleSettings {
    /// Inner radius of a cell as a fraction of the cell radius.
    pub inner_cell_radius_factor: f32,
    /// Fraction of the inner radius that must stay free around the adapted center.
    pub center_adaption_obstacle_factor: f32,
    /// Height above the center that counts as an obstacle.
    pub obstacle_height_center: f32,
    /// Ray start height above the center for center bombing.
    pub obstacle_center_ray_start_height: f32,
    /// Angular sectors sampled around a center.
    pub center_sectors: u32,
    /// Rings per sector (ring 0 is the center itself).
    pub center_rings: u32,
    /// Height deviation between two cells that counts as an obstacle.
    pub obstacle_height_neighbor: f32,
    /// Ray start height above the neighbor center for strip bombing.
    pub obstacle_neighbor_ray_start_height: f32,
    /// Strip width as a fraction of the cell side length.
    pub neighbor_strip_width_factor: f32,
    /// Strip length control; 0 is shortest, 1 is longest.
    pub neighbor_strip_len_factor: f32,
    /// Fraction of obstacle samples that blocks a strip.
    pub neighbor_strip_intersection_tolerance: f32,
    /// Sample steps across the strip.
    pub strip_steps_across: u32,
    /// Sample steps along the strip.
    pub strip_steps_along: u32,
}

/// Island removal parameters.
#[derive(Clone, Debug, Reflect)]
pub struct IslandSettings {
    /// Remove every cell not reachable from the seed cell.
    pub no_cell_islands: bool,
    /// Seed cell number (`cell-N`); `None` picks the cell nearest the grid center.
    pub seed_cell: Option<u32>,
}

/// Cell mesh appearance.
#[derive(Clone, Debug, Reflect)]
pub struct CellRenderSettings {
    /// Lift along the cell normal to avoid z-fighting with the environment.
    pub z_fight_offset: f32,
    /// Scale of the cell toward its center; 1 leaves no gap.
    pub cell_gap_factor: f32,
}

impl Default for NavGridConfig {
    fn default() -> Self {
        Self {
            tiling: TilingSettings {
                cell_radius: 1.5,
                orientation: CellOrientation::Pointy,
                cols: 24,
                rows: 18,
                offset_x: -30.0,
                offset_z: -19.0,
            },
            sampling: SamplingSettings {
                ray_start_height: 30.0,
                ray_y_direction: -1.0,
                first_hit_only: false,
                print_hole_warnings: false,
                surface_source: SurfaceSource::Analytic,
            },
            tolerances: ToleranceSettings {
                min_height_diff_stacked_cells: 5.0,
                max_height_center_to_corner: 1.0,
                max_height_neighbor_to_center: 1.3,
                min_height_diff_stacked_corners: 1.5,
            },
            obstacles: ObstacleSettings {
                inner_cell_radius_factor: 0.79,
                center_adaption_obstacle_factor: 0.54,
                obstacle_height_center: 1.0,
                obstacle_center_ray_start_height: 2.0,
                center_sectors: 18,
                center_rings: 8,
                obstacle_height_neighbor: 1.0,
                obstacle_neighbor_ray_start_height: 1.5,
                neighbor_strip_width_factor: 0.5,
                neighbor_strip_len_factor: 0.5,
                neighbor_strip_intersection_tolerance: 0.05,
                strip_steps_across: 6,
                strip_steps_along: 6,
            },
            islands: IslandSettings {
                no_cell_islands: true,
                seed_cell: None,
            },
            merge_stacked_corners: true,
            check_for_obstacles: true,
            check_for_obstacles_between_cells: true,
            render: CellRenderSettings {
                z_fight_offset: 0.05,
                cell_gap_factor: 0.97,
            },
        }
    }
}

impl NavGridConfig {
    /// Rejects configurations that cannot produce a meaningful grid.
    pub fn validate(&self) -> Result<(), NavGridError> {
        let t = &self.tiling;
        if !t.cell_radius.is_finite() || t.cell_radius <= 0.0 {
            return Err(NavGridError::InvalidConfig(format!(
                "cell_radius must be positive, got {}",
                t.cell_radius
            )));
        }
        if t.cols == 0 || t.rows == 0 {
            return Err(NavGridError::InvalidConfig(format!(
                "grid must have at least one hex, got {}x{}",
                t.cols, t.rows
            )));
        }
        if self.sampling.ray_y_direction == 0.0 || !self.sampling.ray_y_direction.is_finite() {
            return Err(NavGridError::InvalidConfig(
                "ray_y_direction must be non-zero".into(),
            ));
        }
        let o = &self.obstacles;
        if o.center_sectors == 0 || o.strip_steps_across == 0 || o.strip_steps_along == 0 {
            return Err(NavGridError::InvalidConfig(
                "obstacle sampling needs at least one sector and one strip step".into(),
            ));
        }
        let tol = &self.tolerances;
        if tol.min_height_diff_stacked_cells <= tol.min_height_diff_stacked_corners {
            return Err(NavGridError::StackingThresholds {
                cells: tol.min_height_diff_stacked_cells,
                corners: tol.min_height_diff_stacked_corners,
            });
        }
        Ok(())
    }

    /// Inner radius used by center bombing.
    pub fn inner_radius(&self) -> f32 {
        self.tiling.cell_radius * self.obstacles.inner_cell_radius_factor
    }
}

/// Navigation grid plugin: builds the grid on request, keeps the path service fed,
/// and draws cells, paths and (while debugging) the neighbor graph.
pub struct NavGridPlugin(pub NavGridConfig);

impl Plugin for NavGridPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<NavGridConfig>()
            .register_type::<NavGridMesh>()
            .insert_resource(self.0.clone())
            .init_resource::<BuildSession>()
            .init_resource::<ActiveNavGrid>()
            .init_resource::<ActivePath>()
            .add_message::<RebuildNavGrid>()
            .add_systems(Startup, systems::request_initial_build)
            .add_systems(
                Update,
                (
                    systems::request_rebuild_on_key,
                    systems::rebuild_nav_grid,
                    systems::spawn_nav_grid_mesh,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (systems::request_path_on_key, systems::receive_paths)
                    .chain()
                    .after(systems::rebuild_nav_grid),
            )
            .add_systems(Update, systems::draw_path);

        app.add_systems(
            Update,
            systems::draw_graph.run_if(in_state(GameState::Debugging)),
        );

        match PathService::spawn() {
            Ok(service) => {
                app.insert_resource(service);
            }
            Err(e) => error!("path service could not start, path queries disabled: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(NavGridConfig::default().validate(), Ok(()));
    }

    #[test]
    fn stacking_thresholds_must_be_ordered() {
        let mut cfg = NavGridConfig::default();
        cfg.tolerances.min_height_diff_stacked_cells = 1.5;
        cfg.tolerances.min_height_diff_stacked_corners = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(NavGridError::StackingThresholds { .. })
        ));
    }

    #[test]
    fn empty_grid_and_bad_radius_are_rejected() {
        let mut cfg = NavGridConfig::default();
        cfg.tiling.cols = 0;
        assert!(matches!(cfg.validate(), Err(NavGridError::InvalidConfig(_))));

        let mut cfg = NavGridConfig::default();
        cfg.tiling.cell_radius = f32::NAN;
        assert!(matches!(cfg.validate(), Err(NavGridError::InvalidConfig(_))));

        let mut cfg = NavGridConfig::default();
        cfg.sampling.ray_y_direction = 0.0;
        assert!(matches!(cfg.validate(), Err(NavGridError::InvalidConfig(_))));
    }
}
