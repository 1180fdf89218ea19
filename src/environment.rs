//! Demo environment: the ray-castable surface the navigation grid is sampled from.
//!
//! A noise terrain patch, an optional ground plane, platform blocks (bridges)
//! and pillars. The same config drives both the analytic [`Environment`] used
//! for ray casts and the render meshes spawned for the viewer. Those meshes
//! carry [`NavSurface`] and can be sampled directly with [`SceneRayCaster`].

mod height_field;
mod scene;
mod surface;
mod systems;

pub use height_field::HeightField;
pub use scene::{NavSurface, SceneRayCaster, SurfaceSource};
pub use surface::{Environment, RayCaster, SurfaceHit, SurfaceShape};

use bevy::prelude::*;

/// Nested configuration for the environment subsystem.
#[derive(Resource, Clone, Debug, Reflect)]
pub struct EnvironmentConfig {
    /// Noise terrain patch.
    pub terrain: TerrainSettings,
    /// Infinite fallback floor.
    pub ground: GroundSettings,
    /// Axis-aligned platforms, bridges and walls.
    pub blocks: Vec<BlockSettings>,
    /// Vertical cylinders standing on the surface.
    pub pillars: Vec<PillarSettings>,
    /// Background clear color.
    pub clear_color: Color,
}

/// Noise terrain parameters.
#[derive(Clone, Debug, Reflect)]
pub struct TerrainSettings {
    /// Whether the terrain patch exists at all.
    pub enabled: bool,
    /// Seed for the height noise generator.
    pub noise_seed: u32,
    /// Number of octaves for height noise.
    pub noise_octaves: usize,
    /// Spatial scale divisor for height noise sampling.
    pub noise_scale: f64,
    /// Height of the lowest possible terrain point.
    pub base_height: f32,
    /// Maximum elevation above `base_height`.
    pub max_height: f32,
    /// Planar center of the patch (`x`, `z`).
    pub center: Vec2,
    /// Planar half size of the patch.
    pub half_extent: Vec2,
    /// Vertex spacing of the render mesh.
    pub mesh_step: f32,
}

/// Infinite horizontal floor.
#[derive(Clone, Debug, Reflect)]
pub struct GroundSettings {
    /// Whether the floor exists.
    pub enabled: bool,
    /// World height of the floor.
    pub height: f32,
}

/// Solid axis-aligned box.
#[derive(Clone, Debug, Reflect)]
pub struct BlockSettings {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

/// Capped vertical cylinder.
#[derive(Clone, Debug, Reflect)]
pub struct PillarSettings {
    /// Center of the bottom cap.
    pub base: Vec3,
    /// Cylinder radius.
    pub radius: f32,
    /// Height above `base`.
    pub height: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainSettings {
                enabled: true,
                noise_seed: 42,
                noise_octaves: 4,
                noise_scale: 30.0,
                base_height: 0.0,
                max_height: 2.0,
                center: Vec2::ZERO,
                half_extent: Vec2::new(40.0, 25.0),
                mesh_step: 0.5,
            },
            ground: GroundSettings {
                enabled: true,
                height: -0.25,
            },
            blocks: vec![BlockSettings {
                min: Vec3::new(-20.0, 7.5, -3.0),
                max: Vec3::new(20.0, 8.0, 3.0),
            }],
            pillars: vec![
                PillarSettings {
                    base: Vec3::new(6.0, -1.0, 6.0),
                    radius: 0.7,
                    height: 6.0,
                },
                PillarSettings {
                    base: Vec3::new(-9.0, -1.0, 8.0),
                    radius: 1.2,
                    height: 5.0,
                },
                PillarSettings {
                    base: Vec3::new(12.0, -1.0, -9.0),
                    radius: 0.5,
                    height: 4.0,
                },
            ],
            clear_color: Color::srgb(0.02, 0.02, 0.04),
        }
    }
}

impl Environment {
    /// Builds the analytic surface described by `cfg`.
    ///
    /// Shapes are added in a fixed order (ground, terrain, blocks, pillars) so
    /// equal-distance hits always come back in the same order.
    pub fn from_config(cfg: &EnvironmentConfig) -> Self {
        let mut shapes = Vec::new();
        if cfg.ground.enabled {
            shapes.push(SurfaceShape::Plane {
                height: cfg.ground.height,
            });
        }
        if cfg.terrain.enabled {
            shapes.push(SurfaceShape::Terrain(HeightField::from_settings(
                &cfg.terrain,
            )));
        }
        shapes.extend(cfg.blocks.iter().map(|b| SurfaceShape::Block {
            min: b.min.min(b.max),
            max: b.min.max(b.max),
        }));
        shapes.extend(cfg.pillars.iter().map(|p| SurfaceShape::Pillar {
            base: p.base,
            radius: p.radius,
            height: p.height,
        }));
        Self::new(shapes)
    }
}

/// Environment plugin: builds the ray-cast surface and its render meshes at startup.
pub struct EnvironmentPlugin(pub EnvironmentConfig);

impl Plugin for EnvironmentPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<EnvironmentConfig>()
            .register_type::<NavSurface>()
            .insert_resource(self.0.clone())
            .insert_resource(ClearColor(self.0.clear_color))
            .insert_resource(Environment::from_config(&self.0))
            .add_systems(Startup, systems::spawn_environment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_bridge_above_terrain() {
        let cfg = EnvironmentConfig::default();
        let env = Environment::from_config(&cfg);
        let hits = env.cast(Vec3::new(0.0, 50.0, 0.0), Vec3::NEG_Y, false);
        // bridge top, terrain, ground
        assert_eq!(hits.len(), 3, "hits: {hits:?}");
        assert!((hits[0].point.y - 8.0).abs() < 1e-5);
        assert!(hits[1].point.y >= cfg.terrain.base_height - 1e-4);
        assert!((hits[2].point.y - cfg.ground.height).abs() < 1e-5);
    }

    #[test]
    fn inverted_block_corners_are_normalized() {
        let cfg = EnvironmentConfig {
            terrain: TerrainSettings {
                enabled: false,
                ..EnvironmentConfig::default().terrain
            },
            ground: GroundSettings {
                enabled: false,
                height: 0.0,
            },
            blocks: vec![BlockSettings {
                min: Vec3::new(1.0, 1.0, 1.0),
                max: Vec3::new(-1.0, 0.0, -1.0),
            }],
            pillars: vec![],
            ..default()
        };
        let env = Environment::from_config(&cfg);
        assert_eq!(env.shapes().len(), 1);
        let hits = env.cast(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, true);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point.y - 1.0).abs() < 1e-6);
    }
}
