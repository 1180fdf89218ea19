#![warn(missing_docs)]
//! Hex navigation grid for stacked 3D surfaces.
//!
//! Casts vertical rays on a planar hex tiling, assembles six-cornered walkable
//! cells on every surface level, filters cells and links blocked by obstacles,
//! drops unreachable islands and answers shortest-path queries over the
//! resulting cell graph.
//!
//! The core ([`navgrid::build_grid`], [`pathfinding::GraphIndex`]) only needs a
//! [`environment::RayCaster`]; the plugins wire it into a Bevy app.

pub mod environment;
pub mod math;
pub mod navgrid;
pub mod pathfinding;

use bevy::prelude::*;

/// Application-wide state, used for system scheduling.
#[derive(States, Default, Debug, Clone, PartialEq, Eq, Hash, Reflect)]
pub enum GameState {
    /// Normal viewing.
    #[default]
    Running,
    /// Inspector and graph overlay active (Tab to toggle).
    Debugging,
}
