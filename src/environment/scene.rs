//! Ray casts against the spawned environment meshes instead of the analytic
//! shapes, through Bevy's mesh ray casting.

use std::cell::RefCell;

use bevy::picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use bevy::platform::collections::HashSet;
use bevy::prelude::*;

use super::surface::{RayCaster, SurfaceHit};

/// Marks render meshes that take part in navigation ray casts.
#[derive(Component, Default, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct NavSurface;

/// Which geometry the navigation grid samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum SurfaceSource {
    /// The analytic [`Environment`](super::Environment) resource.
    #[default]
    Analytic,
    /// Every mesh entity marked [`NavSurface`].
    SceneMeshes,
}

/// [`RayCaster`] over a set of [`NavSurface`] mesh entities.
///
/// Solid meshes need `RayCastBackfaces` so a ray starting inside them can be
/// told apart from one passing above.
pub struct SceneRayCaster<'a, 'w, 's> {
    ray_cast: RefCell<&'a mut MeshRayCast<'w, 's>>,
    surfaces: HashSet<Entity>,
}

impl<'a, 'w, 's> SceneRayCaster<'a, 'w, 's> {
    /// Casts against `surfaces` only.
    pub fn new(
        ray_cast: &'a mut MeshRayCast<'w, 's>,
        surfaces: impl IntoIterator<Item = Entity>,
    ) -> Self {
        Self {
            ray_cast: RefCell::new(ray_cast),
            surfaces: surfaces.into_iter().collect(),
        }
    }
}

impl RayCaster for SceneRayCaster<'_, '_, '_> {
    fn cast(&self, origin: Vec3, direction: Vec3, first_hit_only: bool) -> Vec<SurfaceHit> {
        let Ok(dir) = Dir3::new(direction) else {
            return Vec::new();
        };
        let filter = |entity: Entity| self.surfaces.contains(&entity);
        let all_hits = |_: Entity| false;
        let settings = MeshRayCastSettings::default()
            .with_filter(&filter)
            .with_early_exit_test(&all_hits)
            .with_visibility(RayCastVisibility::Any);

        let mut ray_cast = self.ray_cast.borrow_mut();
        let raw: Vec<(Vec3, Vec3, f32)> = ray_cast
            .cast_ray(Ray3d::new(origin, dir), &settings)
            .iter()
            .map(|(_, hit)| (hit.point, hit.normal, hit.distance))
            .collect();
        scene_hits(origin, *dir, raw, first_hit_only)
    }
}

/// Turns raw mesh hits into surface hits, closest first.
///
/// A back face as the closest hit means the ray started inside a closed mesh;
/// it becomes a hit at the origin. Any other back face hit is dropped.
fn scene_hits(
    origin: Vec3,
    dir: Vec3,
    raw: impl IntoIterator<Item = (Vec3, Vec3, f32)>,
    first_hit_only: bool,
) -> Vec<SurfaceHit> {
    let mut raw: Vec<(Vec3, Vec3, f32)> = raw.into_iter().collect();
    raw.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut hits = Vec::with_capacity(raw.len());
    for (i, (point, normal, distance)) in raw.into_iter().enumerate() {
        if normal.dot(dir) < 0.0 {
            hits.push(SurfaceHit {
                point,
                normal,
                distance,
            });
        } else if i == 0 {
            hits.push(SurfaceHit {
                point: origin,
                normal: -dir,
                distance: 0.0,
            });
        }
    }
    if first_hit_only {
        hits.truncate(1);
    }
    hits
}
