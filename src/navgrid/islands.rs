use bevy::platform::collections::HashSet;
use bevy::prelude::*;

use super::graph::{CellGraph, CellId};
use crate::math;
use crate::pathfinding::GraphIndex;

/// Node closest to `planar_center` on the ground plane; ties go to the lowest.
pub fn default_seed(graph: &CellGraph, planar_center: Vec2) -> Option<CellId> {
    graph
        .iter()
        .min_by(|(_, a), (_, b)| {
            let da = math::planar(a.center).distance_squared(planar_center);
            let db = math::planar(b.center).distance_squared(planar_center);
            da.total_cmp(&db).then(a.center.y.total_cmp(&b.center.y))
        })
        .map(|(id, _)| id)
}

/// Removes every node that cannot be reached from `seed` and returns the removed ids.
///
/// Each still-unvisited node is tested with a path search from the seed; all
/// nodes on a found path count as visited, so most nodes never need their own
/// search.
pub fn remove_islands(graph: &mut CellGraph, seed: CellId) -> Vec<CellId> {
    let index = GraphIndex::from_graph(graph);
    let mut visited: HashSet<CellId> = HashSet::new();
    visited.insert(seed);
    let mut removed = Vec::new();
    let mut searches = 0;

    for id in graph.ids() {
        if visited.contains(&id) {
            continue;
        }
        searches += 1;
        let path = index.find(seed, id);
        if path.is_empty() {
            removed.push(id);
        } else {
            visited.extend(path);
        }
    }

    for id in &removed {
        graph.remove(*id);
    }
    debug!(
        "island filter: {searches} searches from {seed}, {} cells removed",
        removed.len()
    );
    removed
}
