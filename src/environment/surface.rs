//! Ray-castable environment surface.
//!
//! The navigation grid only ever talks to the environment through
//! [`RayCaster::cast`]. [`Environment`] is the built-in implementation: a flat
//! list of analytic shapes (planes, blocks, pillars, noise terrain) that only
//! report front-facing hits, the way a single-sided render mesh would. A ray
//! that starts inside a solid (block, pillar) hits it at its origin.

use bevy::math::bounding::{Aabb3d, RayCast3d};
use bevy::prelude::*;

use super::height_field::HeightField;

const PARALLEL_EPS: f32 = 1e-6;

/// A single ray/surface intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    /// World-space hit position.
    pub point: Vec3,
    /// Surface normal at the hit, facing against the ray.
    pub normal: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
}

/// Anything a vertical sampling ray can be cast against.
pub trait RayCaster {
    /// Casts a ray and returns its hits ordered by increasing distance.
    ///
    /// With `first_hit_only` at most one hit (the closest) is returned. A ray
    /// starting inside solid geometry reports a hit at its origin (distance 0,
    /// normal against the ray), so rays starting in a wall read as obstructed.
    fn cast(&self, origin: Vec3, direction: Vec3, first_hit_only: bool) -> Vec<SurfaceHit>;
}

/// One analytic piece of the environment.
pub enum SurfaceShape {
    /// Infinite horizontal plane facing up.
    Plane {
        /// World height of the plane.
        height: f32,
    },
    /// Axis-aligned solid box (platforms, bridges, walls).
    Block {
        /// Minimum corner.
        min: Vec3,
        /// Maximum corner.
        max: Vec3,
    },
    /// Vertical capped cylinder standing on `base`.
    Pillar {
        /// Center of the bottom cap.
        base: Vec3,
        /// Cylinder radius.
        radius: f32,
        /// Cylinder height above `base`.
        height: f32,
    },
    /// Noise-derived terrain patch.
    Terrain(HeightField),
}

impl SurfaceShape {
    /// Closest front-facing intersection with a normalized ray, if any.
    ///
    /// Solids hit a ray that starts inside them at distance 0.
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<SurfaceHit> {
        let (distance, normal) = match self {
            Self::Plane { height } => intersect_plane(*height, origin, dir)?,
            Self::Block { min, max } => intersect_block(*min, *max, origin, dir)?,
            Self::Pillar {
                base,
                radius,
                height,
            } => intersect_pillar(*base, *radius, *height, origin, dir)?,
            Self::Terrain(field) => return field.intersect(origin, dir),
        };
        Some(SurfaceHit {
            point: origin + dir * distance,
            normal,
            distance,
        })
    }
}

/// The ray-castable scene the grid is sampled from.
#[derive(Resource, Default)]
pub struct Environment {
    shapes: Vec<SurfaceShape>,
}

impl Environment {
    /// Environment made of the given shapes.
    pub fn new(shapes: Vec<SurfaceShape>) -> Self {
        Self { shapes }
    }

    /// A single infinite floor at `height`.
    pub fn flat(height: f32) -> Self {
        Self::new(vec![SurfaceShape::Plane { height }])
    }

    /// Adds a shape, builder style.
    pub fn with(mut self, shape: SurfaceShape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// All shapes in insertion order.
    pub fn shapes(&self) -> &[SurfaceShape] {
        &self.shapes
    }
}

impl RayCaster for Environment {
    fn cast(&self, origin: Vec3, direction: Vec3, first_hit_only: bool) -> Vec<SurfaceHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return Vec::new();
        }
        let mut hits: Vec<SurfaceHit> = self
            .shapes
            .iter()
            .filter_map(|shape| shape.intersect(origin, dir))
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if first_hit_only {
            hits.truncate(1);
        }
        hits
    }
}

// ── Shape intersections ───────────────────────────────────────────

fn intersect_plane(height: f32, origin: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
    // Only the upper side is a front face.
    if dir.y > -PARALLEL_EPS {
        return None;
    }
    let t = (height - origin.y) / dir.y;
    (t >= 0.0).then_some((t, Vec3::Y))
}

/// Entry distance and entry-face normal; distance 0 when `origin` is inside.
fn intersect_block(min: Vec3, max: Vec3, origin: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
    let dir = Dir3::new(dir).ok()?;
    let aabb = Aabb3d::new((min + max) / 2.0, (max - min) / 2.0);
    let t = RayCast3d::new(origin, dir, f32::MAX).aabb_intersection_at(&aabb)?;
    if t <= 0.0 {
        return Some((0.0, -*dir));
    }
    Some((t, entry_face(min, max, origin + *dir * t, *dir)))
}

/// Normal of the box face closest to `p` among the faces looking back at the ray.
fn entry_face(min: Vec3, max: Vec3, p: Vec3, dir: Vec3) -> Vec3 {
    let mut best = (f32::INFINITY, Vec3::ZERO);
    for axis in 0..3 {
        let mut unit = Vec3::ZERO;
        unit[axis] = 1.0;
        let faces = [
            ((p[axis] - min[axis]).abs(), -unit),
            ((max[axis] - p[axis]).abs(), unit),
        ];
        for (gap, normal) in faces {
            if normal.dot(dir) < 0.0 && gap < best.0 {
                best = (gap, normal);
            }
        }
    }
    best.1
}

fn intersect_pillar(
    base: Vec3,
    radius: f32,
    height: f32,
    origin: Vec3,
    dir: Vec3,
) -> Option<(f32, Vec3)> {
    let axis = Vec2::new(base.x, base.z);
    let within_radius = |p: Vec3| Vec2::new(p.x, p.z).distance(axis) <= radius;
    if within_radius(origin) && origin.y >= base.y && origin.y <= base.y + height {
        return Some((0.0, -dir));
    }
    let mut best: Option<(f32, Vec3)> = None;
    let mut consider = |t: f32, n: Vec3| {
        if t >= 0.0 && best.is_none_or(|(bt, _)| t < bt) {
            best = Some((t, n));
        }
    };

    if dir.y < -PARALLEL_EPS {
        let t = (base.y + height - origin.y) / dir.y;
        if within_radius(origin + dir * t) {
            consider(t, Vec3::Y);
        }
    } else if dir.y > PARALLEL_EPS {
        let t = (base.y - origin.y) / dir.y;
        if within_radius(origin + dir * t) {
            consider(t, Vec3::NEG_Y);
        }
    }

    let d = Vec2::new(dir.x, dir.z);
    let a = d.length_squared();
    if a > PARALLEL_EPS {
        let oc = Vec2::new(origin.x, origin.z) - axis;
        let b = 2.0 * oc.dot(d);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if c > 0.0 && disc >= 0.0 {
            let t = (-b - disc.sqrt()) / (2.0 * a);
            let p = origin + dir * t;
            if p.y >= base.y && p.y <= base.y + height {
                let radial = (Vec2::new(p.x, p.z) - axis).normalize_or_zero();
                consider(t, Vec3::new(radial.x, 0.0, radial.y));
            }
        }
    }

    best
}
