use bevy::asset::RenderAssetUsages;
use bevy::mesh::Indices;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;

use super::build::NavGrid;
use super::error::NavGridError;
use super::CellRenderSettings;
use crate::environment::SurfaceHit;
use crate::math;

/// Fan over the six corners, as corner indices.
const FAN: [[usize; 3]; 4] = [[3, 1, 0], [3, 2, 1], [4, 3, 0], [5, 4, 0]];

/// Four triangles covering one cell.
///
/// Corners are pulled toward the cell center by `cell_gap_factor` and lifted
/// along their surface normal by `z_fight_offset`. Triangles face the same
/// side as the center normal.
pub fn cell_triangles(
    center: &SurfaceHit,
    corners: &[SurfaceHit],
    render: &CellRenderSettings,
) -> Result<[[Vec3; 3]; 4], NavGridError> {
    if corners.len() != 6 {
        return Err(NavGridError::MalformedCell {
            corners: corners.len(),
        });
    }
    let p: [Vec3; 6] = std::array::from_fn(|i| {
        let c = &corners[i];
        center.point + (c.point - center.point) * render.cell_gap_factor
            + c.normal * render.z_fight_offset
    });
    Ok(FAN.map(|[a, b, c]| {
        let tri = [p[a], p[b], p[c]];
        if math::compute_normal(tri[0], tri[1], tri[2]).dot(center.normal) < 0.0 {
            [tri[0], tri[2], tri[1]]
        } else {
            tri
        }
    }))
}

/// One mesh holding every cell of `grid`, flat-shaded with the center normals.
pub fn nav_grid_mesh(grid: &NavGrid, render: &CellRenderSettings) -> Result<Mesh, NavGridError> {
    let mut positions: Vec<[f32; 3]> = Vec::with_capacity(grid.cells().len() * 12);
    let mut normals: Vec<[f32; 3]> = Vec::with_capacity(grid.cells().len() * 12);
    for cell in grid.cells() {
        for tri in cell_triangles(&cell.center, &cell.corners, render)? {
            for v in tri {
                positions.push(v.to_array());
                normals.push(cell.center.normal.to_array());
            }
        }
    }
    let indices: Vec<u32> = (0..positions.len() as u32).collect();
    Ok(Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
    .with_inserted_indices(Indices::U32(indices)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navgrid::NavGridConfig;

    fn hit(p: Vec3) -> SurfaceHit {
        SurfaceHit {
            point: p,
            normal: Vec3::Y,
            distance: 30.0 - p.y,
        }
    }

    fn hexagon() -> (SurfaceHit, Vec<SurfaceHit>) {
        let corners = (0..6)
            .map(|i| {
                let a = i as f32 * std::f32::consts::TAU / 6.0;
                hit(Vec3::new(a.cos(), 0.0, a.sin()))
            })
            .collect();
        (hit(Vec3::ZERO), corners)
    }

    #[test]
    fn wrong_corner_count_is_malformed() {
        let (center, corners) = hexagon();
        let render = NavGridConfig::default().render;
        assert_eq!(
            cell_triangles(&center, &corners[..5], &render),
            Err(NavGridError::MalformedCell { corners: 5 })
        );
    }

    #[test]
    fn triangles_face_up_and_cover_the_hexagon() {
        let (center, corners) = hexagon();
        let render = CellRenderSettings {
            z_fight_offset: 0.0,
            cell_gap_factor: 1.0,
        };
        let tris = cell_triangles(&center, &corners, &render).unwrap();
        let mut area = 0.0;
        for [a, b, c] in tris {
            let n = (b - a).cross(c - a);
            assert!(n.y > 0.0, "triangle faces down");
            area += n.length() / 2.0;
        }
        let expected = 3.0 * 3.0_f32.sqrt() / 2.0;
        assert!((area - expected).abs() < 1e-4, "area {area}");
    }

    #[test]
    fn gap_and_lift_are_applied() {
        let (center, corners) = hexagon();
        let render = CellRenderSettings {
            z_fight_offset: 0.1,
            cell_gap_factor: 0.5,
        };
        let tris = cell_triangles(&center, &corners, &render).unwrap();
        for v in tris.iter().flatten() {
            assert!((v.y - 0.1).abs() < 1e-6);
            assert!((Vec2::new(v.x, v.z).length() - 0.5).abs() < 1e-5);
        }
    }
}
