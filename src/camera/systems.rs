use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;

use super::CameraConfig;
use super::entities::FlyCamera;
use hex_navgrid::math;

/// Spawns the Camera3d entity with the [`FlyCamera`] marker.
pub fn spawn_camera(mut commands: Commands, cfg: Res<CameraConfig>) {
    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        Tonemapping::TonyMcMapface,
        Transform::from_translation(cfg.spawn_position).looking_at(cfg.look_at, Vec3::Y),
        FlyCamera,
    ));
}

/// WASD + Q/E movement, right-mouse look.
pub fn fly(
    time: Res<Time>,
    cfg: Res<CameraConfig>,
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    mut query: Query<&mut Transform, With<FlyCamera>>,
) {
    let Ok(mut transform) = query.single_mut() else {
        return;
    };

    if buttons.pressed(MouseButton::Right) && motion.delta != Vec2::ZERO {
        let yaw = -motion.delta.x * cfg.mouse_sensitivity;
        let pitch = -motion.delta.y * cfg.mouse_sensitivity;
        transform.rotate_y(yaw);
        let (_, current_pitch, _) = transform.rotation.to_euler(EulerRot::YXZ);
        let pitch_delta = math::clamp_pitch(current_pitch, pitch, cfg.pitch_margin);
        transform.rotate_local_x(pitch_delta);
    }

    let forward = transform.forward();
    let right = transform.right();
    let mut direction = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) {
        direction += *forward;
    }
    if keys.pressed(KeyCode::KeyS) {
        direction -= *forward;
    }
    if keys.pressed(KeyCode::KeyD) {
        direction += *right;
    }
    if keys.pressed(KeyCode::KeyA) {
        direction -= *right;
    }
    if keys.pressed(KeyCode::KeyE) {
        direction += Vec3::Y;
    }
    if keys.pressed(KeyCode::KeyQ) {
        direction -= Vec3::Y;
    }
    if direction == Vec3::ZERO {
        return;
    }

    let mut speed = cfg.move_speed;
    if keys.pressed(KeyCode::ShiftLeft) {
        speed *= cfg.boost;
    }
    transform.translation += direction.normalize() * speed * time.delta_secs();
}
