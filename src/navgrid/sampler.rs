use bevy::prelude::*;
use hexx::Hex;

use super::session::{BuildSession, HitId, PlanarKey};
use super::tiling::HexTiling;
use super::SamplingSettings;
use crate::environment::RayCaster;

/// Ray hits of one hex: its center ray and its six corner rays.
pub struct HexSample {
    /// The sampled hex.
    pub hex: Hex,
    /// Center hits, closest to the ray origin first.
    pub center_hits: Vec<HitId>,
    /// Planar keys of the six corners.
    pub corner_keys: [PlanarKey; 6],
    /// Hits per corner, closest to the ray origin first.
    pub corner_hits: [Vec<HitId>; 6],
}

/// Casts the center and corner rays of every hex.
///
/// Corner rays are shared between hexes through the session's corner cache.
/// Hexes with no center hit or a corner without hits are dropped; the second
/// value counts them.
pub fn sample_tiling(
    session: &mut BuildSession,
    tiling: &HexTiling,
    s: &SamplingSettings,
    surface: &dyn RayCaster,
) -> (Vec<HexSample>, usize) {
    let dir = Vec3::new(0.0, s.ray_y_direction, 0.0);
    let cast = |p: Vec2| surface.cast(Vec3::new(p.x, s.ray_start_height, p.y), dir, s.first_hit_only);

    let mut samples = Vec::with_capacity(tiling.len());
    let mut dropped = 0;
    for &hex in tiling.hexes() {
        let center = tiling.center(hex);
        let corners = tiling.corners(hex);
        let corner_keys = corners.map(PlanarKey::new);
        let corner_hits: [Vec<HitId>; 6] =
            std::array::from_fn(|i| session.corner_hits(corner_keys[i], || cast(corners[i])).to_vec());
        let center_hits = session.record(cast(center));

        if center_hits.is_empty() || corner_hits.iter().any(Vec::is_empty) {
            let (col, row) = tiling.offset_coords(hex);
            if s.print_hole_warnings {
                warn!("no surface under hex ({col}, {row}) at {center}; likely a hole in the environment");
            } else {
                debug!("hex ({col}, {row}) dropped: missing center or corner hit");
            }
            dropped += 1;
            continue;
        }

        samples.push(HexSample {
            hex,
            center_hits,
            corner_keys,
            corner_hits,
        });
    }
    (samples, dropped)
}
