//! Free-flying viewer camera.
//!
//! WASD moves in the view plane, Q/E moves down/up, holding the right mouse
//! button looks around. Spawns the Camera3d entity.

mod entities;
mod systems;

pub use entities::FlyCamera;

use bevy::prelude::*;

use hex_navgrid::GameState;

/// Per-plugin configuration for the fly camera.
#[derive(Resource, Clone, Debug, Reflect)]
pub struct CameraConfig {
    /// Movement speed in world-units per second.
    pub move_speed: f32,
    /// Speed multiplier while Shift is held.
    pub boost: f32,
    /// Mouse look sensitivity (radians per pixel).
    pub mouse_sensitivity: f32,
    /// Margin from vertical to prevent camera flip (radians).
    pub pitch_margin: f32,
    /// Spawn position.
    pub spawn_position: Vec3,
    /// Point the camera looks at when spawned.
    pub look_at: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 15.0,
            boost: 3.0,
            mouse_sensitivity: 0.003,
            pitch_margin: 0.05,
            spawn_position: Vec3::new(0.0, 35.0, 40.0),
            look_at: Vec3::ZERO,
        }
    }
}

/// Fly camera with WASD, Q/E and right-mouse look.
pub struct CameraPlugin(pub CameraConfig);

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<FlyCamera>()
            .register_type::<CameraConfig>()
            .insert_resource(self.0.clone())
            .add_systems(Startup, systems::spawn_camera)
            .add_systems(Update, systems::fly.run_if(in_state(GameState::Running)));
    }
}
