//! Resolves the hits of a hex into complete cells: one center hit plus six
//! corner hits each.

use bevy::platform::collections::HashSet;
use bevy::prelude::*;
use hexx::Hex;

use super::error::NavGridError;
use super::sampler::HexSample;
use super::session::{HitArena, HitId, PlanarKey};
use super::ToleranceSettings;

/// A realized cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Center hit.
    pub center: HitId,
    /// Corner hits, in the tiling's corner order.
    pub corners: [HitId; 6],
    /// Obstacle-adjusted center; the center hit position until bombing runs.
    pub adapted_center: Vec3,
}

/// All cells realized at one planar hex (several when surfaces are stacked).
#[derive(Clone, Debug)]
pub struct AssembledHex {
    /// The hex.
    pub hex: Hex,
    /// Planar keys of its six corners.
    pub corner_keys: [PlanarKey; 6],
    /// Cells, highest center first.
    pub cells: Vec<Cell>,
}

/// Builds the cells of one sampled hex.
///
/// Center hits closer than `min_height_diff_stacked_cells` collapse into the
/// higher one. Centers are then served from the top down: each corner hands
/// the center its closest unclaimed hit within `max_height_center_to_corner`.
/// A center that cannot fill all six corners is dropped; the corners it did
/// claim stay claimed.
pub fn assemble_hex(sample: &HexSample, hits: &HitArena, tol: &ToleranceSettings) -> AssembledHex {
    let centers = collapse_stacked(&sample.center_hits, hits, tol.min_height_diff_stacked_cells);

    let mut reserved: HashSet<HitId> = HashSet::new();
    let mut cells = Vec::new();
    'centers: for center in centers {
        let cy = hits.height(center);
        let in_range = |h: &HitId| (hits.height(*h) - cy).abs() <= tol.max_height_center_to_corner;

        let mut candidates: [Vec<HitId>; 6] = Default::default();
        for (i, corner) in sample.corner_hits.iter().enumerate() {
            let mut c: Vec<HitId> = corner.iter().copied().filter(in_range).collect();
            if c.is_empty() {
                continue 'centers;
            }
            c.sort_by(|a, b| hits[*a].distance.total_cmp(&hits[*b].distance));
            candidates[i] = c;
        }

        let mut corners = [center; 6];
        for (i, c) in candidates.iter().enumerate() {
            let Some(free) = c.iter().find(|h| !reserved.contains(*h)) else {
                continue 'centers;
            };
            reserved.insert(*free);
            corners[i] = *free;
        }

        cells.push(Cell {
            center,
            corners,
            adapted_center: hits[center].point,
        });
    }

    AssembledHex {
        hex: sample.hex,
        corner_keys: sample.corner_keys,
        cells,
    }
}

/// Center hits with near-coincident levels merged, highest first.
fn collapse_stacked(center_hits: &[HitId], hits: &HitArena, min_gap: f32) -> Vec<HitId> {
    let mut sorted = center_hits.to_vec();
    sorted.sort_by(|a, b| hits.height(*b).total_cmp(&hits.height(*a)));
    let mut kept: Vec<HitId> = Vec::with_capacity(sorted.len());
    for h in sorted {
        match kept.last() {
            Some(last) if hits.height(*last) - hits.height(h) < min_gap => {}
            _ => kept.push(h),
        }
    }
    kept
}

/// Checks that no corner hit serves two cells of the same hex.
pub fn verify_hex(hex: &AssembledHex) -> Result<(), NavGridError> {
    let mut seen = HashSet::new();
    for cell in &hex.cells {
        for corner in cell.corners {
            if !seen.insert(corner) {
                return Err(NavGridError::CornerReused {
                    q: hex.hex.x,
                    r: hex.hex.y,
                });
            }
        }
    }
    Ok(())
}

/// Assembles every sample, drops hexes without cells and verifies the rest.
pub fn assemble_all(
    samples: &[HexSample],
    hits: &HitArena,
    tol: &ToleranceSettings,
) -> Result<Vec<AssembledHex>, NavGridError> {
    let mut out = Vec::with_capacity(samples.len());
    for sample in samples {
        let hex = assemble_hex(sample, hits, tol);
        if hex.cells.is_empty() {
            continue;
        }
        if let Err(e) = verify_hex(&hex) {
            error!("cell assembly produced an invalid hex: {e}");
            return Err(e);
        }
        out.push(hex);
    }
    Ok(out)
}
