//! Obstacle bombing: dense vertical ray sampling around a cell center and
//! across the strip between two cells.
//!
//! Both routines only read the surface, so the same inputs always produce the
//! same verdict.

use std::f32::consts::{FRAC_PI_6, TAU};

use bevy::prelude::*;

use super::ObstacleSettings;
use crate::environment::RayCaster;
use crate::math;

/// Outcome of [`center_bombing`].
#[derive(Clone, Debug, PartialEq)]
pub struct CenterVerdict {
    /// Center pushed away from nearby obstacles (height unchanged).
    pub adapted_center: Vec3,
    /// An obstacle is still too close to the adapted center.
    pub blocked: bool,
    /// First obstacle of every sector that found one, flattened to center height.
    pub obstacles: Vec<Vec3>,
    /// Sample rays without any hit.
    pub holes: usize,
}

/// Outcome of [`strip_bombing`].
#[derive(Clone, Debug, PartialEq)]
pub struct StripVerdict {
    /// The strip counts as obstructed.
    pub blocked: bool,
    /// Samples that hit something.
    pub checks: usize,
    /// Samples classified as obstacles.
    pub obstacles: usize,
    /// Sample rays without any hit.
    pub holes: usize,
}

/// Samples rings around `center` and derives an obstacle-free adapted center.
///
/// Every sector walks outward from the center up to the inner radius and stops
/// at its first obstacle (a hit more than `obstacle_height_center` above the
/// center). Each obstacle pushes the center away by how far it intrudes into
/// the inner radius; the adapted center moves by the mean push. The cell is
/// blocked when an obstacle remains within
/// `inner_radius * center_adaption_obstacle_factor` of the adapted center.
pub fn center_bombing(
    center: Vec3,
    cell_radius: f32,
    o: &ObstacleSettings,
    surface: &dyn RayCaster,
) -> CenterVerdict {
    let inner = cell_radius * o.inner_cell_radius_factor;
    let rings = o.center_rings;
    let ring_step = if rings == 0 { 0.0 } else { inner / rings as f32 };
    let start_y = center.y + o.obstacle_center_ray_start_height;
    let flat_center = math::planar(center);

    // Ring 0 is the same point for every sector.
    let mut holes = 0;
    let mut probe = |offset: Vec2| -> Option<Vec3> {
        let origin = Vec3::new(center.x + offset.x, start_y, center.z + offset.y);
        match surface.cast(origin, Vec3::NEG_Y, true).first() {
            Some(hit) => Some(hit.point),
            None => {
                holes += 1;
                None
            }
        }
    };
    let is_obstacle = |p: Vec3| p.y - center.y > o.obstacle_height_center;
    let center_probe = probe(Vec2::ZERO);

    let mut obstacles = Vec::new();
    let mut push = Vec2::ZERO;
    for sector in 0..o.center_sectors {
        let angle = sector as f32 * TAU / o.center_sectors as f32;
        for ring in 0..=rings {
            let point = if ring == 0 {
                center_probe
            } else {
                probe(math::polar_offset(angle, ring, ring_step))
            };
            let Some(point) = point else { continue };
            if !is_obstacle(point) {
                continue;
            }
            let flat = math::planar(point);
            let dist = flat_center.distance(flat);
            let step_len = if dist < inner { inner - dist } else { 0.0 };
            push += math::with_length(flat_center - flat, step_len);
            obstacles.push(Vec3::new(point.x, center.y, point.z));
            break;
        }
    }

    let adapted_center = if obstacles.is_empty() {
        center
    } else {
        let mean = push / obstacles.len() as f32;
        center + Vec3::new(mean.x, 0.0, mean.y)
    };
    let keep_out = inner * o.center_adaption_obstacle_factor;
    let blocked = obstacles
        .iter()
        .any(|p| p.distance(adapted_center) < keep_out);

    CenterVerdict {
        adapted_center,
        blocked,
        obstacles,
        holes,
    }
}

/// Samples the rectangle between two cell centers and decides whether the
/// connection is obstructed.
///
/// The strip starts an inset away from `b` toward `a`, is
/// `neighbor_strip_width_factor` side lengths wide and spans the gap between
/// the two inner circles. A sample is an obstacle when its hit deviates from
/// the mean center height by at least `obstacle_height_neighbor`, up or down.
/// Holes are skipped. The strip is blocked once the obstacle count reaches
/// `max(checks * tolerance, 1)`.
pub fn strip_bombing(
    a: Vec3,
    b: Vec3,
    cell_radius: f32,
    o: &ObstacleSettings,
    surface: &dyn RayCaster,
) -> StripVerdict {
    let side = 2.0 * FRAC_PI_6.sin() * cell_radius;
    let inset = side / (o.neighbor_strip_len_factor * 4.0 + 1.0);
    let width = o.neighbor_strip_width_factor * side;
    let length = 2.0 * (FRAC_PI_6.cos() * cell_radius - inset);

    let between = math::planar(a) - math::planar(b);
    let to_start = math::with_length(between, inset);
    let across = Vec2::new(between.y, -between.x);
    let a1 = to_start + math::with_length(across, width / 2.0);
    let a2 = to_start - math::with_length(across, width / 2.0);
    let a3 = a1 + math::with_length(between, length);
    let dir_across = a2 - a1;
    let dir_along = a3 - a1;

    let base_height = (a.y + b.y) / 2.0;
    let start = Vec3::new(b.x + a1.x, b.y + o.obstacle_neighbor_ray_start_height, b.z + a1.y);

    let mut checks = 0;
    let mut obstacles = 0;
    let mut holes = 0;
    for i in 0..=o.strip_steps_across {
        for j in 0..=o.strip_steps_along {
            let offset = dir_across * (i as f32 / o.strip_steps_across as f32)
                + dir_along * (j as f32 / o.strip_steps_along as f32);
            let origin = start + Vec3::new(offset.x, 0.0, offset.y);
            let Some(hit) = surface.cast(origin, Vec3::NEG_Y, true).into_iter().next() else {
                holes += 1;
                continue;
            };
            checks += 1;
            if (hit.point.y - base_height).abs() >= o.obstacle_height_neighbor {
                obstacles += 1;
            }
        }
    }

    let limit = (checks as f32 * o.neighbor_strip_intersection_tolerance).max(1.0);
    StripVerdict {
        blocked: obstacles as f32 >= limit,
        checks,
        obstacles,
        holes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, SurfaceShape};
    use crate::navgrid::NavGridConfig;

    fn settings() -> ObstacleSettings {
        NavGridConfig::default().obstacles
    }

    fn pillar(x: f32, z: f32, radius: f32, height: f32) -> SurfaceShape {
        SurfaceShape::Pillar {
            base: Vec3::new(x, 0.0, z),
            radius,
            height,
        }
    }

    // ── center bombing ──────────────────────────────────────────────

    #[test]
    fn open_ground_leaves_center_untouched() {
        let env = Environment::flat(0.0);
        let v = center_bombing(Vec3::new(3.0, 0.0, -2.0), 1.5, &settings(), &env);
        assert!(!v.blocked);
        assert!(v.obstacles.is_empty());
        assert_eq!(v.adapted_center, Vec3::new(3.0, 0.0, -2.0));
        assert_eq!(v.holes, 0);
    }

    #[test]
    fn obstacle_on_center_blocks() {
        let env = Environment::flat(0.0).with(pillar(0.0, 0.0, 0.3, 1.5));
        let v = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        assert!(v.blocked);
        assert_eq!(v.obstacles.len(), 18, "every sector starts on the pillar");
        assert_eq!(v.adapted_center, Vec3::ZERO);
    }

    #[test]
    fn obstacle_taller_than_ray_start_blocks() {
        // center rays start at 2.0, inside the pillar
        let env = Environment::flat(0.0).with(pillar(0.0, 0.0, 0.3, 10.0));
        let v = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        assert!(v.blocked);
        assert_eq!(v.obstacles.len(), 18);
        assert_eq!(v.holes, 0);
    }

    #[test]
    fn side_obstacle_pushes_center_away() {
        let env = Environment::flat(0.0).with(pillar(0.6, 0.0, 0.3, 1.5));
        let v = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        // sectors at -20°, 0° and 20° hit the pillar on ring 3
        assert_eq!(v.obstacles.len(), 3);
        assert!(!v.blocked, "adapted center {:?}", v.adapted_center);
        assert!((v.adapted_center.x + 0.711).abs() < 0.01, "{:?}", v.adapted_center);
        assert!(v.adapted_center.z.abs() < 1e-4);
        assert_eq!(v.adapted_center.y, 0.0);
        for p in &v.obstacles {
            assert_eq!(p.y, 0.0, "obstacle points are flattened");
        }
    }

    #[test]
    fn low_bumps_are_not_obstacles() {
        // exactly obstacle_height_center above the center is still walkable
        let env = Environment::flat(0.0).with(pillar(0.5, 0.0, 0.3, 1.0));
        let v = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        assert!(v.obstacles.is_empty());
        assert!(!v.blocked);
    }

    #[test]
    fn center_bombing_is_repeatable() {
        let env = Environment::flat(0.0)
            .with(pillar(0.6, 0.2, 0.3, 1.5))
            .with(pillar(-0.4, -0.7, 0.2, 3.0));
        let first = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        let second = center_bombing(Vec3::ZERO, 1.5, &settings(), &env);
        assert_eq!(first, second);
    }

    // ── strip bombing ───────────────────────────────────────────────

    fn neighbor_pair() -> (Vec3, Vec3) {
        (Vec3::ZERO, Vec3::new(3.0_f32.sqrt() * 1.5, 0.0, 0.0))
    }

    #[test]
    fn flat_strip_is_free() {
        let env = Environment::flat(0.0);
        let (a, b) = neighbor_pair();
        let v = strip_bombing(a, b, 1.5, &settings(), &env);
        assert!(!v.blocked);
        assert_eq!(v.checks, 49);
        assert_eq!(v.obstacles, 0);
    }

    #[test]
    fn wall_between_cells_blocks() {
        let env = Environment::flat(0.0).with(SurfaceShape::Block {
            min: Vec3::new(1.1, 0.0, -2.0),
            max: Vec3::new(1.5, 1.4, 2.0),
        });
        let (a, b) = neighbor_pair();
        let v = strip_bombing(a, b, 1.5, &settings(), &env);
        assert!(v.blocked);
        assert_eq!(v.obstacles, 7, "one row of samples lands on the wall");
        assert_eq!(strip_bombing(b, a, 1.5, &settings(), &env).blocked, v.blocked);
    }

    #[test]
    fn ditch_counts_as_obstacle() {
        // a floor far below the centers is as impassable as a wall
        let env = Environment::new(vec![
            SurfaceShape::Block {
                min: Vec3::new(-5.0, -1.0, -5.0),
                max: Vec3::new(1.1, 0.0, 5.0),
            },
            SurfaceShape::Block {
                min: Vec3::new(1.5, -1.0, -5.0),
                max: Vec3::new(8.0, 0.0, 5.0),
            },
            SurfaceShape::Plane { height: -3.0 },
        ]);
        let (a, b) = neighbor_pair();
        assert!(strip_bombing(a, b, 1.5, &settings(), &env).blocked);
    }

    #[test]
    fn holes_are_skipped() {
        let env = Environment::default();
        let (a, b) = neighbor_pair();
        let v = strip_bombing(a, b, 1.5, &settings(), &env);
        assert_eq!(v.checks, 0);
        assert_eq!(v.holes, 49);
        assert!(!v.blocked);
    }
}
