use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use hexx::{Hex, HexLayout, HexOrientation};

use super::TilingSettings;

/// Orientation of the planar hex tiling. `Flat` is `Pointy` rotated by 90°.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "native", derive(clap::ValueEnum))]
pub enum CellOrientation {
    /// A corner points along +z / -z; rows are offset (odd-r).
    #[default]
    Pointy,
    /// A flat edge faces +z / -z; columns are offset (odd-q).
    Flat,
}

/// Rectangular patch of hexes laid out on the ground plane.
///
/// Hexes are stored row-major (row, then column). That order is the
/// processing order of every later build stage.
pub struct HexTiling {
    layout: HexLayout,
    unit_corners: [Vec2; 6],
    radius: f32,
    orientation: CellOrientation,
    offset: Vec2,
    cols: u32,
    rows: u32,
    hexes: Vec<Hex>,
    index: HashMap<Hex, usize>,
}

impl HexTiling {
    /// Constructs the tiling from grid settings.
    pub fn from_settings(t: &TilingSettings) -> Self {
        let orientation = match t.orientation {
            CellOrientation::Pointy => HexOrientation::Pointy,
            CellOrientation::Flat => HexOrientation::Flat,
        };
        let layout = HexLayout {
            orientation,
            scale: Vec2::splat(t.cell_radius),
            ..default()
        };
        let unit_layout = HexLayout {
            orientation,
            scale: Vec2::splat(1.0),
            ..default()
        };
        let unit_corners_slice = unit_layout.center_aligned_hex_corners();
        let unit_corners: [Vec2; 6] = std::array::from_fn(|i| unit_corners_slice[i]);

        let mut hexes = Vec::with_capacity((t.cols * t.rows) as usize);
        for row in 0..t.rows as i32 {
            for col in 0..t.cols as i32 {
                hexes.push(from_offset(t.orientation, col, row));
            }
        }
        let index = hexes.iter().enumerate().map(|(i, h)| (*h, i)).collect();

        Self {
            layout,
            unit_corners,
            radius: t.cell_radius,
            orientation: t.orientation,
            offset: Vec2::new(t.offset_x, t.offset_z),
            cols: t.cols,
            rows: t.rows,
            hexes,
            index,
        }
    }

    // ── Shape ──────────────────────────────────────────────────────

    /// All hexes, row-major.
    pub fn hexes(&self) -> &[Hex] {
        &self.hexes
    }

    /// Number of hexes in the patch.
    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    /// True when the patch has no hexes.
    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }

    /// Position of `hex` in row-major order.
    pub fn index_of(&self, hex: Hex) -> Option<usize> {
        self.index.get(&hex).copied()
    }

    /// Whether `hex` is part of the patch.
    pub fn contains(&self, hex: Hex) -> bool {
        self.index.contains_key(&hex)
    }

    /// Neighbors of `hex` that lie inside the patch.
    pub fn neighbors(&self, hex: Hex) -> impl Iterator<Item = Hex> + '_ {
        hex.all_neighbors()
            .into_iter()
            .filter(|n| self.contains(*n))
    }

    /// `(col, row)` offset coordinates of `hex`.
    pub fn offset_coords(&self, hex: Hex) -> (i32, i32) {
        to_offset(self.orientation, hex)
    }

    /// Hex at offset coordinates, whether or not it is inside the patch.
    pub fn hex_at(&self, col: i32, row: i32) -> Hex {
        from_offset(self.orientation, col, row)
    }

    // ── Geometry ───────────────────────────────────────────────────

    /// Cell circumradius (center to corner).
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Planar (`x`, `z`) world position of a hex center.
    pub fn center(&self, hex: Hex) -> Vec2 {
        self.layout.hex_to_world_pos(hex) + self.offset
    }

    /// Planar world position of corner `i` (0..6) of `hex`; see [`Self::corners`]
    /// for the slot order.
    pub fn corner(&self, hex: Hex, i: usize) -> Vec2 {
        self.center(hex) + self.unit_corners[i % 6] * self.radius
    }

    /// All six corner positions of `hex`.
    ///
    /// Slot `i` lies at angle `60°·i` (flat) or `60°·i - 30°` (pointy) from
    /// +x toward +z, so consecutive slots are adjacent corners. For pointy
    /// hexes slot 2 is the +z tip and slot 5 the -z tip; for flat hexes slot 0
    /// is the +x tip and slot 3 the -x tip. Every per-corner array of a cell
    /// uses this order.
    pub fn corners(&self, hex: Hex) -> [Vec2; 6] {
        let c = self.center(hex);
        std::array::from_fn(|i| c + self.unit_corners[i] * self.radius)
    }

    /// Middle of the bounding box of all hex centers.
    pub fn planar_center(&self) -> Vec2 {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for hex in &self.hexes {
            let c = self.center(*hex);
            min = min.min(c);
            max = max.max(c);
        }
        if self.hexes.is_empty() {
            self.offset
        } else {
            (min + max) * 0.5
        }
    }

    /// Hex under a planar world position (may lie outside the patch).
    pub fn world_pos_to_hex(&self, pos: Vec2) -> Hex {
        self.layout.world_pos_to_hex(pos - self.offset)
    }

    /// Patch size as `(cols, rows)`.
    pub fn size(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }
}

/// Offset to axial: odd-r rows for pointy, odd-q columns for flat.
fn from_offset(orientation: CellOrientation, col: i32, row: i32) -> Hex {
    match orientation {
        CellOrientation::Pointy => Hex::new(col - (row - (row & 1)) / 2, row),
        CellOrientation::Flat => Hex::new(col, row - (col - (col & 1)) / 2),
    }
}

fn to_offset(orientation: CellOrientation, hex: Hex) -> (i32, i32) {
    match orientation {
        CellOrientation::Pointy => (hex.x + (hex.y - (hex.y & 1)) / 2, hex.y),
        CellOrientation::Flat => (hex.x, hex.y + (hex.x - (hex.x & 1)) / 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(orientation: CellOrientation, cols: u32, rows: u32) -> TilingSettings {
        TilingSettings {
            cell_radius: 1.5,
            orientation,
            cols,
            rows,
            offset_x: 0.0,
            offset_z: 0.0,
        }
    }

    #[test]
    fn offset_roundtrip_both_orientations() {
        for orientation in [CellOrientation::Pointy, CellOrientation::Flat] {
            let tiling = HexTiling::from_settings(&settings(orientation, 5, 4));
            for (i, hex) in tiling.hexes().iter().enumerate() {
                let (col, row) = tiling.offset_coords(*hex);
                assert_eq!(i, (row * 5 + col) as usize, "{orientation:?} {hex:?}");
                assert_eq!(tiling.hex_at(col, row), *hex);
            }
        }
    }

    #[test]
    fn pointy_three_by_three_neighbor_counts() {
        let tiling = HexTiling::from_settings(&settings(CellOrientation::Pointy, 3, 3));
        let expected = [[2, 4, 3], [5, 6, 3], [2, 4, 3]];
        for row in 0..3 {
            for col in 0..3 {
                let hex = tiling.hex_at(col, row);
                let n = tiling.neighbors(hex).count();
                assert_eq!(n, expected[row as usize][col as usize], "({col},{row})");
            }
        }
    }

    #[test]
    fn neighbor_centers_are_one_apothem_pair_apart() {
        for orientation in [CellOrientation::Pointy, CellOrientation::Flat] {
            let tiling = HexTiling::from_settings(&settings(orientation, 4, 4));
            let expected = 3.0_f32.sqrt() * 1.5;
            for hex in tiling.hexes() {
                for n in tiling.neighbors(*hex) {
                    let d = tiling.center(*hex).distance(tiling.center(n));
                    assert!((d - expected).abs() < 1e-4, "{orientation:?} distance {d}");
                }
            }
        }
    }

    #[test]
    fn adjacent_hexes_share_two_corners() {
        let tiling = HexTiling::from_settings(&settings(CellOrientation::Pointy, 3, 3));
        let a = tiling.hex_at(1, 1);
        let b = tiling.hex_at(2, 1);
        let shared = tiling
            .corners(a)
            .iter()
            .filter(|ca| tiling.corners(b).iter().any(|cb| ca.distance(*cb) < 1e-4))
            .count();
        assert_eq!(shared, 2);
    }

    #[test]
    fn corners_lie_on_circumradius() {
        let mut s = settings(CellOrientation::Flat, 2, 2);
        s.offset_x = 10.0;
        s.offset_z = -4.0;
        let tiling = HexTiling::from_settings(&s);
        for hex in tiling.hexes() {
            let c = tiling.center(*hex);
            for corner in tiling.corners(*hex) {
                assert!((corner.distance(c) - 1.5).abs() < 1e-4);
            }
            assert_eq!(tiling.world_pos_to_hex(c), *hex);
        }
    }

    #[test]
    fn corner_slots_follow_documented_angles() {
        use std::f32::consts::{FRAC_PI_3, FRAC_PI_6, TAU};
        for (orientation, first) in [
            (CellOrientation::Flat, 0.0),
            (CellOrientation::Pointy, -FRAC_PI_6),
        ] {
            let tiling = HexTiling::from_settings(&settings(orientation, 2, 2));
            let hex = tiling.hex_at(1, 1);
            let c = tiling.center(hex);
            for (i, corner) in tiling.corners(hex).into_iter().enumerate() {
                let v = corner - c;
                let angle = v.y.atan2(v.x);
                let expected = first + FRAC_PI_3 * i as f32;
                let off = (angle - expected).rem_euclid(TAU);
                assert!(off < 1e-4 || TAU - off < 1e-4, "{orientation:?} slot {i}: {angle}");
                assert_eq!(tiling.corner(hex, i), corner);
            }
        }

        let pointy = HexTiling::from_settings(&settings(CellOrientation::Pointy, 1, 1));
        let hex = pointy.hex_at(0, 0);
        assert!((pointy.corner(hex, 2) - pointy.center(hex) - Vec2::new(0.0, 1.5)).length() < 1e-4);
        assert!((pointy.corner(hex, 5) - pointy.center(hex) - Vec2::new(0.0, -1.5)).length() < 1e-4);
    }
}
