use bevy::asset::RenderAssetUsages;
use bevy::mesh::Indices;
use bevy::picking::mesh_picking::ray_cast::RayCastBackfaces;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;

use super::height_field::HeightField;
use super::scene::NavSurface;
use super::surface::{Environment, SurfaceShape};
use super::EnvironmentConfig;

/// Extent of the rendered ground plane (the ray-cast plane is infinite).
const GROUND_RENDER_SIZE: f32 = 200.0;

// ── Startup ─────────────────────────────────────────────────────────

/// Spawns a render mesh for every environment shape, plus the sun light.
///
/// Every shape mesh is a [`NavSurface`]; solids also ray cast their back faces.
pub fn spawn_environment(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    env: Res<Environment>,
    cfg: Res<EnvironmentConfig>,
) {
    let ground_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.18, 0.2, 0.16),
        perceptual_roughness: 0.95,
        ..default()
    });
    let terrain_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.32, 0.4, 0.26),
        perceptual_roughness: 0.9,
        ..default()
    });
    let solid_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.45, 0.42, 0.4),
        ..default()
    });

    let root = commands
        .spawn((
            Name::new("Environment"),
            Transform::default(),
            Visibility::default(),
        ))
        .id();

    for (i, shape) in env.shapes().iter().enumerate() {
        let bundle = match shape {
            SurfaceShape::Plane { height } => (
                Name::new("Ground"),
                Mesh3d(meshes.add(
                    Plane3d::default()
                        .mesh()
                        .size(GROUND_RENDER_SIZE, GROUND_RENDER_SIZE),
                )),
                MeshMaterial3d(ground_material.clone()),
                Transform::from_xyz(0.0, *height, 0.0),
            ),
            SurfaceShape::Terrain(field) => (
                Name::new("Terrain"),
                Mesh3d(meshes.add(terrain_mesh(field, cfg.terrain.mesh_step))),
                MeshMaterial3d(terrain_material.clone()),
                Transform::default(),
            ),
            SurfaceShape::Block { min, max } => (
                Name::new(format!("Block({i})")),
                Mesh3d(meshes.add(Cuboid::from_corners(*min, *max))),
                MeshMaterial3d(solid_material.clone()),
                Transform::from_translation((*min + *max) * 0.5),
            ),
            SurfaceShape::Pillar {
                base,
                radius,
                height,
            } => (
                Name::new(format!("Pillar({i})")),
                Mesh3d(meshes.add(Cylinder::new(*radius, *height))),
                MeshMaterial3d(solid_material.clone()),
                Transform::from_translation(*base + Vec3::Y * (*height * 0.5)),
            ),
        };
        let mut entity = commands.spawn((bundle, NavSurface));
        if matches!(shape, SurfaceShape::Block { .. } | SurfaceShape::Pillar { .. }) {
            entity.insert(RayCastBackfaces);
        }
        let entity = entity.id();
        commands.entity(root).add_child(entity);
    }

    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(20.0, 40.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Regular grid mesh over the height field's bounds.
fn terrain_mesh(field: &HeightField, step: f32) -> Mesh {
    let (min, max) = field.bounds();
    let step = step.max(0.05);
    let nx = ((max.x - min.x) / step).ceil() as u32 + 1;
    let nz = ((max.y - min.y) / step).ceil() as u32 + 1;

    let mut positions = Vec::with_capacity((nx * nz) as usize);
    let mut normals = Vec::with_capacity((nx * nz) as usize);
    for j in 0..nz {
        for i in 0..nx {
            let p = Vec2::new(
                (min.x + i as f32 * step).min(max.x),
                (min.y + j as f32 * step).min(max.y),
            );
            let h = field.height(p).unwrap_or_default();
            positions.push([p.x, h, p.y]);
            normals.push(field.normal(p).to_array());
        }
    }

    let mut indices = Vec::with_capacity(((nx - 1) * (nz - 1) * 6) as usize);
    for j in 0..nz - 1 {
        for i in 0..nx - 1 {
            let a = j * nx + i;
            let b = a + 1;
            let c = a + nx;
            let d = c + 1;
            // counter-clockwise seen from above
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    // kept in the main world for mesh ray casts
    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
    .with_inserted_indices(Indices::U32(indices))
}
