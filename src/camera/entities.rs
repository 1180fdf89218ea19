use bevy::prelude::*;

/// Marker component for the viewer camera entity.
#[derive(Component, Reflect)]
pub struct FlyCamera;
