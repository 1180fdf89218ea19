//! Viewer for the hex navigation grid.
//!
//! Builds the grid over the demo environment and shows cells, paths and (Tab)
//! the neighbor graph with the inspector. `R` rebuilds, `N` runs the next
//! path query, `Esc` quits.

mod camera;

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy_inspector_egui::quick::WorldInspectorPlugin;

use hex_navgrid::GameState;
use hex_navgrid::environment::{EnvironmentConfig, EnvironmentPlugin};
#[cfg(feature = "native")]
use hex_navgrid::environment::SurfaceSource;
use hex_navgrid::navgrid::{NavGridConfig, NavGridPlugin};

#[cfg(feature = "native")]
use clap::Parser;

/// Hex navigation grid viewer
#[cfg(feature = "native")]
#[derive(Parser, Debug)]
#[command(name = "hex-navgrid", version, about)]
struct Cli {
    /// Number of hex columns
    #[arg(long)]
    cols: Option<u32>,

    /// Number of hex rows
    #[arg(long)]
    rows: Option<u32>,

    /// Center-to-corner distance of a cell
    #[arg(long)]
    cell_radius: Option<f32>,

    /// Hex orientation
    #[arg(long, value_enum)]
    orientation: Option<hex_navgrid::navgrid::CellOrientation>,

    /// Keep only the closest hit of every sampling ray
    #[arg(long)]
    first_hit_only: bool,

    /// Sample the rendered environment meshes instead of the analytic shapes
    #[arg(long)]
    scene_meshes: bool,

    /// Terrain noise seed
    #[arg(long)]
    seed: Option<u32>,

    /// Cell number island removal starts from
    #[arg(long)]
    seed_cell: Option<u32>,
}

#[cfg(feature = "native")]
impl Cli {
    fn apply(self, grid: &mut NavGridConfig, env: &mut EnvironmentConfig) {
        if let Some(cols) = self.cols {
            grid.tiling.cols = cols;
        }
        if let Some(rows) = self.rows {
            grid.tiling.rows = rows;
        }
        if let Some(radius) = self.cell_radius {
            grid.tiling.cell_radius = radius;
        }
        if let Some(orientation) = self.orientation {
            grid.tiling.orientation = orientation;
        }
        grid.sampling.first_hit_only |= self.first_hit_only;
        if self.scene_meshes {
            grid.sampling.surface_source = SurfaceSource::SceneMeshes;
        }
        if let Some(seed) = self.seed {
            env.terrain.noise_seed = seed;
        }
        if self.seed_cell.is_some() {
            grid.islands.seed_cell = self.seed_cell;
        }
    }
}

fn main() {
    let mut grid_cfg = NavGridConfig::default();
    let mut env_cfg = EnvironmentConfig::default();
    #[cfg(feature = "native")]
    Cli::parse().apply(&mut grid_cfg, &mut env_cfg);

    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Hex NavGrid".into(),
            ..default()
        }),
        ..default()
    }))
    .register_type::<GameState>()
    .init_state::<GameState>()
    .add_plugins(bevy_egui::EguiPlugin::default())
    .add_plugins(EnvironmentPlugin(env_cfg))
    .add_plugins(NavGridPlugin(grid_cfg))
    .add_plugins(camera::CameraPlugin(camera::CameraConfig::default()))
    .add_systems(Update, exit_on_esc)
    .add_systems(Update, toggle_inspector)
    .add_plugins(WorldInspectorPlugin::new().run_if(in_state(GameState::Debugging)));

    #[cfg(feature = "native")]
    app.add_plugins(bevy::remote::RemotePlugin::default())
        .add_plugins(bevy::remote::http::RemoteHttpPlugin::default());

    app.run();
}

fn toggle_inspector(
    keys: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next: ResMut<NextState<GameState>>,
) {
    if keys.just_pressed(KeyCode::Tab) {
        next.set(match state.get() {
            GameState::Running => GameState::Debugging,
            GameState::Debugging => GameState::Running,
        });
    }
}

fn exit_on_esc(keys: Res<ButtonInput<KeyCode>>, mut exit: MessageWriter<AppExit>) {
    if keys.just_pressed(KeyCode::Escape) {
        exit.write(AppExit::Success);
    }
}
