use bevy::camera::primitives::Aabb;
use bevy::picking::mesh_picking::ray_cast::MeshRayCast;
use bevy::prelude::*;

use super::build::build_grid;
use super::entities::{ActiveNavGrid, ActivePath, NavGridMesh, RebuildNavGrid};
use super::mesh::nav_grid_mesh;
use super::session::BuildSession;
use super::NavGridConfig;
use crate::environment::{Environment, NavSurface, SceneRayCaster, SurfaceSource};
use crate::pathfinding::{PathRequest, PathService};

/// Height of path and graph gizmos above the cell centers.
const GIZMO_LIFT: f32 = 0.15;

// ── Building ────────────────────────────────────────────────────────

/// Queues the first build.
pub fn request_initial_build(mut requests: MessageWriter<RebuildNavGrid>) {
    requests.write(RebuildNavGrid);
}

/// `R` rebuilds the grid.
pub fn request_rebuild_on_key(
    keys: Res<ButtonInput<KeyCode>>,
    mut requests: MessageWriter<RebuildNavGrid>,
) {
    if keys.just_pressed(KeyCode::KeyR) {
        requests.write(RebuildNavGrid);
    }
}

/// Builds a fresh grid when asked and swaps it into [`ActiveNavGrid`].
///
/// All requests of a frame collapse into one build. A failed build keeps the
/// previous grid. Sampling scene meshes waits until every [`NavSurface`] has
/// its bounds.
#[allow(clippy::too_many_arguments)]
pub fn rebuild_nav_grid(
    mut requests: MessageReader<RebuildNavGrid>,
    mut waiting: Local<bool>,
    cfg: Res<NavGridConfig>,
    env: Option<Res<Environment>>,
    mut ray_cast: MeshRayCast,
    surfaces: Query<(Entity, Has<Aabb>), With<NavSurface>>,
    mut session: ResMut<BuildSession>,
    mut active: ResMut<ActiveNavGrid>,
    mut path: ResMut<ActivePath>,
    service: Option<Res<PathService>>,
) {
    let count = requests.read().count();
    if count == 0 && !*waiting {
        return;
    }
    if count > 1 {
        debug!("{count} rebuild requests collapsed into one build");
    }

    let built = match cfg.sampling.surface_source {
        SurfaceSource::Analytic => {
            *waiting = false;
            let Some(env) = env else {
                warn!("nav grid rebuild requested without an environment");
                return;
            };
            build_grid(&mut session, &cfg, env.as_ref())
        }
        SurfaceSource::SceneMeshes => {
            if surfaces.is_empty() || surfaces.iter().any(|(_, bounded)| !bounded) {
                if !*waiting {
                    debug!("nav grid rebuild waits for environment meshes");
                }
                *waiting = true;
                return;
            }
            *waiting = false;
            let caster = SceneRayCaster::new(&mut ray_cast, surfaces.iter().map(|(e, _)| e));
            build_grid(&mut session, &cfg, &caster)
        }
    };

    let grid = match built {
        Ok(grid) => grid,
        Err(e) => {
            error!("nav grid build failed: {e}");
            return;
        }
    };
    let index = grid.index().clone();
    let generation = active.replace(grid);
    if let Some(service) = service {
        service.setup(generation, index);
    }
    *path = ActivePath {
        generation,
        ..default()
    };
}

/// Replaces the cell mesh whenever a new grid is installed.
pub fn spawn_nav_grid_mesh(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    active: Res<ActiveNavGrid>,
    cfg: Res<NavGridConfig>,
    existing: Query<Entity, With<NavGridMesh>>,
) {
    if !active.is_changed() {
        return;
    }
    let Some(grid) = active.grid() else { return };
    for entity in &existing {
        commands.entity(entity).despawn();
    }
    let mesh = match nav_grid_mesh(grid, &cfg.render) {
        Ok(mesh) => mesh,
        Err(e) => {
            error!("nav grid mesh: {e}");
            return;
        }
    };
    commands.spawn((
        Name::new(format!("NavGrid gen {}", active.generation())),
        Mesh3d(meshes.add(mesh)),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgba(0.1, 0.55, 0.9, 0.6),
            alpha_mode: AlphaMode::Blend,
            double_sided: true,
            cull_mode: None,
            ..default()
        })),
        Transform::default(),
        NavGridMesh,
    ));
}

// ── Paths ───────────────────────────────────────────────────────────

/// `N` asks the path service for the next sample query on the current grid.
pub fn request_path_on_key(
    keys: Res<ButtonInput<KeyCode>>,
    active: Res<ActiveNavGrid>,
    mut path: ResMut<ActivePath>,
    service: Option<Res<PathService>>,
) {
    if !keys.just_pressed(KeyCode::KeyN) {
        return;
    }
    let Some(service) = service else {
        warn!("no path service running");
        return;
    };
    let Some(grid) = active.grid() else { return };
    let cells = grid.cells();
    if cells.len() < 2 {
        return;
    }
    let n = cells.len();
    let q = path.queries;
    let start = cells[(q * 7) % n].id;
    let target = cells[(q * 13 + n / 2) % n].id;
    path.queries += 1;
    path.pending = true;
    debug!("path query {q}: {start} -> {target}");
    service.request(PathRequest {
        generation: active.generation(),
        start,
        target,
    });
}

/// Takes finished paths from the service; answers for an older grid are dropped.
pub fn receive_paths(
    active: Res<ActiveNavGrid>,
    mut path: ResMut<ActivePath>,
    service: Option<Res<PathService>>,
) {
    let Some(service) = service else { return };
    for resp in service.poll() {
        if resp.generation != active.generation() {
            debug!(
                "dropping path {} -> {} from generation {} (current {})",
                resp.start,
                resp.target,
                resp.generation,
                active.generation()
            );
            continue;
        }
        if resp.path.is_empty() {
            info!("no path from {} to {}", resp.start, resp.target);
        } else {
            info!("path {} -> {}: {} cells", resp.start, resp.target, resp.path.len());
        }
        path.generation = resp.generation;
        path.cells = resp.path;
        path.pending = false;
    }
}

// ── Gizmos ──────────────────────────────────────────────────────────

/// Draws the last path over the adapted cell centers.
pub fn draw_path(mut gizmos: Gizmos, active: Res<ActiveNavGrid>, path: Res<ActivePath>) {
    let Some(grid) = active.grid() else { return };
    if path.generation != active.generation() || path.cells.is_empty() {
        return;
    }
    let points: Vec<Vec3> = path
        .cells
        .iter()
        .filter_map(|id| grid.cell(*id))
        .map(|c| c.adapted_center + Vec3::Y * GIZMO_LIFT)
        .collect();
    let color = Color::srgb(1.0, 0.55, 0.1);
    gizmos.linestrip(points.iter().copied(), color);
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        gizmos.sphere(Isometry3d::from_translation(*first), 0.3, Color::srgb(0.2, 1.0, 0.3));
        gizmos.sphere(Isometry3d::from_translation(*last), 0.3, Color::srgb(1.0, 0.2, 0.2));
    }
}

/// Draws every link of the neighbor graph once.
pub fn draw_graph(mut gizmos: Gizmos, active: Res<ActiveNavGrid>) {
    let Some(grid) = active.grid() else { return };
    let graph = grid.graph();
    let color = Color::srgba(1.0, 1.0, 1.0, 0.5);
    for (id, node) in graph.iter() {
        let a = node.adapted_center + Vec3::Y * GIZMO_LIFT;
        for n in node.neighbors.iter().filter(|n| **n > id) {
            if let Some(other) = graph.get(*n) {
                gizmos.line(a, other.adapted_center + Vec3::Y * GIZMO_LIFT, color);
            }
        }
    }
}
