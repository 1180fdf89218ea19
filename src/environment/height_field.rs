use bevy::prelude::*;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::surface::SurfaceHit;
use super::TerrainSettings;
use crate::math;

/// Finite-difference step used for normals.
const NORMAL_EPS: f32 = 0.05;
/// Ray-march step for non-vertical rays.
const MARCH_STEP: f32 = 0.1;
const BISECT_ITERATIONS: usize = 24;

/// Bounded terrain patch whose height is sampled from fractal noise.
///
/// Heights are computed on demand from the noise function, so the patch can
/// be sampled at arbitrary planar positions (grid corners, obstacle probes).
pub struct HeightField {
    fbm: Fbm<Perlin>,
    noise_scale: f64,
    base_height: f32,
    max_height: f32,
    center: Vec2,
    half_extent: Vec2,
}

impl HeightField {
    /// Constructs the field from terrain settings.
    pub fn from_settings(t: &TerrainSettings) -> Self {
        Self {
            fbm: Fbm::new(t.noise_seed).set_octaves(t.noise_octaves),
            noise_scale: t.noise_scale,
            base_height: t.base_height,
            max_height: t.max_height,
            center: t.center,
            half_extent: t.half_extent,
        }
    }

    /// Whether `pos` lies on the patch.
    pub fn contains(&self, pos: Vec2) -> bool {
        let d = (pos - self.center).abs();
        d.x <= self.half_extent.x && d.y <= self.half_extent.y
    }

    /// Terrain height at planar `pos`, `None` outside the patch.
    pub fn height(&self, pos: Vec2) -> Option<f32> {
        self.contains(pos).then(|| self.raw_height(pos))
    }

    /// Upward surface normal at `pos` from central differences.
    pub fn normal(&self, pos: Vec2) -> Vec3 {
        let hx = self.raw_height(pos - Vec2::X * NORMAL_EPS)
            - self.raw_height(pos + Vec2::X * NORMAL_EPS);
        let hz = self.raw_height(pos - Vec2::Y * NORMAL_EPS)
            - self.raw_height(pos + Vec2::Y * NORMAL_EPS);
        Vec3::new(hx, 2.0 * NORMAL_EPS, hz).normalize_or_zero()
    }

    /// Planar bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.center - self.half_extent, self.center + self.half_extent)
    }

    /// Closest front-facing intersection with a normalized ray.
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<SurfaceHit> {
        let vertical = dir.x.abs() < 1e-6 && dir.z.abs() < 1e-6;
        if vertical {
            if dir.y >= 0.0 {
                return None;
            }
            let pos = math::planar(origin);
            let h = self.height(pos)?;
            let t = (h - origin.y) / dir.y;
            return (t >= 0.0).then(|| SurfaceHit {
                point: Vec3::new(origin.x, h, origin.z),
                normal: self.normal(pos),
                distance: t,
            });
        }
        self.march(origin, dir)
    }

    fn raw_height(&self, pos: Vec2) -> f32 {
        let n = self.fbm.get([
            pos.x as f64 / self.noise_scale,
            pos.y as f64 / self.noise_scale,
        ]);
        self.base_height + math::map_noise_to_range(n, 0.0, self.max_height)
    }

    /// Height of the ray above the terrain at parameter `t`.
    fn clearance(&self, origin: Vec3, dir: Vec3, t: f32) -> Option<f32> {
        let p = origin + dir * t;
        self.height(math::planar(p)).map(|h| p.y - h)
    }

    fn march(&self, origin: Vec3, dir: Vec3) -> Option<SurfaceHit> {
        let (min, max) = self.bounds();
        let reach = (max - min).length()
            + (origin.y - self.base_height).abs()
            + self.max_height
            + (math::planar(origin) - self.center).length();
        let steps = (reach / MARCH_STEP).ceil() as usize;

        let mut prev: Option<(f32, f32)> = None;
        for i in 0..=steps {
            let t = i as f32 * MARCH_STEP;
            let Some(c) = self.clearance(origin, dir, t) else {
                prev = None;
                continue;
            };
            if let Some((prev_t, prev_c)) = prev
                && prev_c > 0.0
                && c <= 0.0
            {
                let (mut lo, mut hi) = (prev_t, t);
                for _ in 0..BISECT_ITERATIONS {
                    let mid = 0.5 * (lo + hi);
                    match self.clearance(origin, dir, mid) {
                        Some(mc) if mc > 0.0 => lo = mid,
                        _ => hi = mid,
                    }
                }
                let point = origin + dir * hi;
                return Some(SurfaceHit {
                    point,
                    normal: self.normal(math::planar(point)),
                    distance: hi,
                });
            }
            prev = Some((t, c));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentConfig;

    fn field() -> HeightField {
        HeightField::from_settings(&EnvironmentConfig::default().terrain)
    }

    #[test]
    fn heights_stay_within_configured_range() {
        let f = field();
        let t = EnvironmentConfig::default().terrain;
        for i in -10..=10 {
            for j in -10..=10 {
                let p = Vec2::new(i as f32 * 1.7, j as f32 * 1.3);
                let h = f.height(p).unwrap();
                assert!(
                    h >= t.base_height - 1e-4 && h <= t.base_height + t.max_height + 1e-4,
                    "height {h} at {p:?} out of range"
                );
            }
        }
    }

    #[test]
    fn outside_patch_has_no_height() {
        let f = field();
        assert!(f.height(Vec2::splat(1.0e4)).is_none());
        assert!(
            f.intersect(Vec3::new(1.0e4, 50.0, 1.0e4), Vec3::NEG_Y)
                .is_none()
        );
    }

    #[test]
    fn vertical_ray_lands_on_height() {
        let f = field();
        let p = Vec2::new(3.0, -4.0);
        let hit = f.intersect(Vec3::new(p.x, 30.0, p.y), Vec3::NEG_Y).unwrap();
        let h = f.height(p).unwrap();
        assert!((hit.point.y - h).abs() < 1e-5);
        assert!((hit.distance - (30.0 - h)).abs() < 1e-4);
        assert!(hit.normal.y > 0.0, "terrain normal should face up");
    }

    #[test]
    fn slanted_ray_converges_onto_surface() {
        let f = field();
        let dir = Vec3::new(0.3, -1.0, 0.2).normalize();
        let hit = f.intersect(Vec3::new(0.0, 20.0, 0.0), dir).unwrap();
        let h = f.height(math::planar(hit.point)).unwrap();
        assert!((hit.point.y - h).abs() < 1e-2, "hit {hit:?} vs height {h}");
    }

    #[test]
    fn upward_ray_never_hits() {
        let f = field();
        assert!(f.intersect(Vec3::new(0.0, -50.0, 0.0), Vec3::Y).is_none());
    }
}
