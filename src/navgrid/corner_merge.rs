use std::collections::BTreeMap;

use bevy::platform::collections::HashMap;
use bevy::prelude::*;

use super::assembler::AssembledHex;
use super::session::{HitArena, HitId, PlanarKey};
use super::ToleranceSettings;

/// `(hex index, cell index, corner slot)` of one corner reference.
type CornerUse = (usize, usize, usize);

/// Collapses near-coincident corner hits used by different cells.
///
/// Per planar corner, the used hits are scanned from the top down. A hit is
/// folded into the next lower one when they are less than
/// `min_height_diff_stacked_corners` apart and every cell using either hit
/// keeps its center within `max_height_center_to_corner` of the lower hit.
/// Both hits of a merged pair are final; the scan resumes with the hit below
/// them. Returns the number of merges.
pub fn merge_stacked_corners(
    hexes: &mut [AssembledHex],
    hits: &HitArena,
    tol: &ToleranceSettings,
) -> usize {
    let mut used: BTreeMap<PlanarKey, Vec<HitId>> = BTreeMap::new();
    let mut users: HashMap<HitId, Vec<CornerUse>> = HashMap::new();
    for (h, hex) in hexes.iter().enumerate() {
        for (c, cell) in hex.cells.iter().enumerate() {
            for (slot, hit) in cell.corners.iter().enumerate() {
                let list = used.entry(hex.corner_keys[slot]).or_default();
                if !list.contains(hit) {
                    list.push(*hit);
                }
                users.entry(*hit).or_default().push((h, c, slot));
            }
        }
    }

    let mut merged = 0;
    for (key, mut level) in used {
        if level.len() < 2 {
            continue;
        }
        level.sort_by(|a, b| hits.height(*b).total_cmp(&hits.height(*a)).then(a.cmp(b)));

        // A merged pair is done; the next hit starts a fresh comparison.
        let mut upper = Some(level[0]);
        for &lower in &level[1..] {
            let Some(up) = upper else {
                upper = Some(lower);
                continue;
            };
            let lower_y = hits.height(lower);
            let close = hits.height(up) - lower_y < tol.min_height_diff_stacked_corners;
            let fits = |hit: HitId| {
                users.get(&hit).into_iter().flatten().all(|&(h, c, _)| {
                    let center = hexes[h].cells[c].center;
                    (hits.height(center) - lower_y).abs() <= tol.max_height_center_to_corner
                })
            };
            if close && fits(up) && fits(lower) {
                let moved = users.remove(&up).unwrap_or_default();
                for &(h, c, slot) in &moved {
                    hexes[h].cells[c].corners[slot] = lower;
                }
                users.entry(lower).or_default().extend(moved);
                debug!("merged corner hit at {key:?}: {:.3} -> {:.3}", hits.height(up), lower_y);
                merged += 1;
                upper = None;
            } else {
                upper = Some(lower);
            }
        }
    }
    merged
}
