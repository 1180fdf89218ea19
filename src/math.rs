//! Pure computation helpers extracted for testability.
//!
//! All functions in this module are free of Bevy ECS dependencies and operate
//! on plain numeric / `Vec2` / `Vec3` inputs, making them straightforward to
//! unit-test.

use bevy::prelude::{Vec2, Vec3};

/// Maps a noise value from the standard `[-1, 1]` range into `[min, max]`.
///
/// Noise generators (e.g. `Fbm<Perlin>`) produce values centred around zero.
/// This linearly rescales to an arbitrary output range.
///
/// # Examples
/// ```
/// # use hex_navgrid::math::map_noise_to_range;
/// assert_eq!(map_noise_to_range(-1.0, 0.0, 10.0), 0.0);
/// assert_eq!(map_noise_to_range( 1.0, 0.0, 10.0), 10.0);
/// assert_eq!(map_noise_to_range( 0.0, 2.0, 6.0),  4.0);
/// ```
pub fn map_noise_to_range(noise_val: f64, min: f32, max: f32) -> f32 {
    min + ((noise_val as f32 + 1.0) / 2.0) * (max - min)
}

/// Computes the face normal of a triangle defined by three vertices.
///
/// Uses the cross product of edges `(v1 - v0)` and `(v2 - v0)`.
/// Returns `Vec3::ZERO` if the triangle is degenerate (collinear points).
pub fn compute_normal(v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    edge1.cross(edge2).normalize_or_zero()
}

/// Clamps a pitch angle so the camera cannot flip past vertical.
///
/// `current` is the existing pitch in radians (from `Quat::to_euler`).
/// `delta` is the desired change. The result is clamped to
/// `(-PI/2 + margin, PI/2 - margin)` and the *effective* delta is returned
/// (i.e. how much to actually rotate).
pub fn clamp_pitch(current: f32, delta: f32, margin: f32) -> f32 {
    let limit = std::f32::consts::FRAC_PI_2 - margin;
    let clamped = (current + delta).clamp(-limit, limit);
    clamped - current
}

/// Projects a world position onto the ground plane (`x`, `z`).
pub fn planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Rescales `v` to `len`, keeping its direction. A zero vector stays zero.
pub fn with_length(v: Vec2, len: f32) -> Vec2 {
    v.normalize_or_zero() * len
}

/// Rounds `value` to a fixed number of steps per unit and returns the step index.
///
/// Used to build hashable planar keys: two floats that agree to within
/// `0.5 / steps_per_unit` map to the same integer.
pub fn quantize(value: f32, steps_per_unit: f32) -> i64 {
    (value as f64 * steps_per_unit as f64).round() as i64
}

/// Offset of a sample on a polar grid: `ring * ring_step` along angle `angle`.
///
/// Returned as a planar (`x`, `z`) offset.
pub fn polar_offset(angle: f32, ring: u32, ring_step: f32) -> Vec2 {
    let r = ring as f32 * ring_step;
    Vec2::new(r * angle.cos(), r * angle.sin())
}
