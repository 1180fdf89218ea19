use std::ops::Index;

use bevy::platform::collections::HashMap;
use bevy::prelude::*;

use super::graph::CellId;
use crate::environment::SurfaceHit;
use crate::math;

/// Handle of a [`SurfaceHit`] stored in the session's [`HitArena`].
///
/// Cells and caches refer to hits by handle, so "the same hit" is an identity
/// comparison rather than a float comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitId(u32);

impl HitId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only storage for all hits of one build.
#[derive(Default)]
pub struct HitArena {
    hits: Vec<SurfaceHit>,
}

impl HitArena {
    /// Stores a hit and returns its handle.
    pub fn push(&mut self, hit: SurfaceHit) -> HitId {
        let id = HitId(self.hits.len() as u32);
        self.hits.push(hit);
        id
    }

    /// Stores all hits, preserving order.
    pub fn extend(&mut self, hits: impl IntoIterator<Item = SurfaceHit>) -> Vec<HitId> {
        hits.into_iter().map(|h| self.push(h)).collect()
    }

    /// Looks a hit up, `None` for a handle from another arena generation.
    pub fn get(&self, id: HitId) -> Option<&SurfaceHit> {
        self.hits.get(id.index())
    }

    /// World height of a hit.
    pub fn height(&self, id: HitId) -> f32 {
        self[id].point.y
    }

    /// Number of stored hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    fn clear(&mut self) {
        self.hits.clear();
    }
}

impl Index<HitId> for HitArena {
    type Output = SurfaceHit;

    fn index(&self, id: HitId) -> &SurfaceHit {
        &self.hits[id.index()]
    }
}

/// Planar position quantized to 1/1000 of a world unit.
///
/// Hexes sharing a corner compute its position independently; quantizing
/// makes the tiny float differences land on the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanarKey {
    x: i64,
    z: i64,
}

impl PlanarKey {
    /// Quantization steps per world unit.
    pub const STEPS_PER_UNIT: f32 = 1000.0;

    /// Key of a planar (`x`, `z`) position.
    pub fn new(pos: Vec2) -> Self {
        Self {
            x: math::quantize(pos.x, Self::STEPS_PER_UNIT),
            z: math::quantize(pos.y, Self::STEPS_PER_UNIT),
        }
    }
}

/// Sequential cell id source. Ids restart at 0 on every build.
#[derive(Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Hands out the next id.
    pub fn allocate(&mut self) -> CellId {
        let id = CellId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

/// All mutable state of a grid build: hit storage, the corner-hit cache and
/// the id allocator.
///
/// [`build_grid`](super::build_grid) calls [`BuildSession::reset`] first, so
/// nothing leaks from one build into the next.
#[derive(Resource, Default)]
pub struct BuildSession {
    pub(crate) hits: HitArena,
    corner_cache: HashMap<PlanarKey, Vec<HitId>>,
    pub(crate) ids: IdAllocator,
}

impl BuildSession {
    /// Empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every hit, cached corner and allocated id.
    pub fn reset(&mut self) {
        self.hits.clear();
        self.corner_cache.clear();
        self.ids.reset();
    }

    /// Hits stored during the current build.
    pub fn hits(&self) -> &HitArena {
        &self.hits
    }

    /// Number of distinct corners sampled so far.
    pub fn cached_corners(&self) -> usize {
        self.corner_cache.len()
    }

    /// Stores a fresh list of hits (center rays are never shared).
    pub fn record(&mut self, hits: Vec<SurfaceHit>) -> Vec<HitId> {
        self.hits.extend(hits)
    }

    /// Hits of the corner at `key`; `sample` runs only the first time a key is seen.
    pub fn corner_hits(
        &mut self,
        key: PlanarKey,
        sample: impl FnOnce() -> Vec<SurfaceHit>,
    ) -> &[HitId] {
        let hits = &mut self.hits;
        self.corner_cache
            .entry(key)
            .or_insert_with(|| hits.extend(sample()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(y: f32) -> SurfaceHit {
        SurfaceHit {
            point: Vec3::new(0.0, y, 0.0),
            normal: Vec3::Y,
            distance: 10.0 - y,
        }
    }

    #[test]
    fn planar_key_absorbs_float_noise() {
        let a = PlanarKey::new(Vec2::new(1.299_038, -0.75));
        let b = PlanarKey::new(Vec2::new(1.299_038_2, -0.750_000_1));
        assert_eq!(a, b);
        assert_ne!(a, PlanarKey::new(Vec2::new(1.301, -0.75)));
    }

    #[test]
    fn corner_is_sampled_once() {
        let mut session = BuildSession::new();
        let key = PlanarKey::new(Vec2::new(3.0, 4.0));
        let mut calls = 0;
        let first = session
            .corner_hits(key, || {
                calls += 1;
                vec![hit(2.0), hit(0.0)]
            })
            .to_vec();
        let second = session
            .corner_hits(key, || {
                calls += 1;
                vec![hit(9.0)]
            })
            .to_vec();
        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert_eq!(session.hits().len(), 2);
        assert_eq!(session.cached_corners(), 1);
    }

    #[test]
    fn reset_clears_hits_cache_and_ids() {
        let mut session = BuildSession::new();
        session.record(vec![hit(1.0)]);
        session.corner_hits(PlanarKey::new(Vec2::ZERO), || vec![hit(0.0)]);
        assert_eq!(session.ids.allocate(), CellId(0));
        assert_eq!(session.ids.allocate(), CellId(1));

        session.reset();
        assert!(session.hits().is_empty());
        assert_eq!(session.cached_corners(), 0);
        assert_eq!(session.ids.allocate(), CellId(0));
    }

    #[test]
    fn arena_lookup_by_handle() {
        let mut arena = HitArena::default();
        let ids = arena.extend([hit(3.0), hit(1.0)]);
        assert_eq!(arena.height(ids[0]), 3.0);
        assert_eq!(arena[ids[1]].point.y, 1.0);
        assert!(arena.get(HitId(7)).is_none());
    }
}
