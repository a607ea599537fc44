//! Chunk lifecycle management - activation, streaming, and entity cache routing

use std::collections::HashMap;
use std::time::Duration;

use ahash::AHashMap;
use glam::{IVec2, Vec2};

use super::chunk::Chunk;
use super::chunk_loader::{ChunkLoader, LoadRequest};
use crate::collision::RectCollider;
use crate::entity::EntitySnapshot;

/// Chebyshev radius of the active set around the observer's chunk
pub const ACTIVATION_DISTANCE: i32 = 1;

/// Default Chebyshev radius for speculative background loading
pub const DEFAULT_PRELOAD_DISTANCE: i32 = 2;

/// Extra margin on the point-query staleness check, keeps entities at a chunk
/// boundary from flapping in and out of eviction
const STALE_QUERY_GRACE: Duration = Duration::from_secs(1);

/// Entities handed back to the simulation when their chunk reactivated
#[derive(Debug)]
pub struct ChunkRestore {
    pub coord: IVec2,
    pub entities: Vec<EntitySnapshot>,
}

/// Owns every chunk, recomputes the active set each tick, coordinates the
/// background loader, and routes cached entity state
pub struct ChunkManager {
    /// All chunks created this session, keyed by chunk coordinates
    chunks: HashMap<IVec2, Chunk>,

    /// Coordinates of the chunks activated by the last update
    active_chunks: Vec<IVec2>,

    /// Background loader; `None` runs the store fully synchronously
    loader: Option<ChunkLoader>,

    preload_distance: i32,

    /// Debug overlay toggle for chunk boundary markers
    show_chunk_boundaries: bool,
}

impl ChunkManager {
    /// Create a store without background loading
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
            active_chunks: Vec::new(),
            loader: None,
            preload_distance: DEFAULT_PRELOAD_DISTANCE,
            show_chunk_boundaries: false,
        }
    }

    /// Create a store backed by a background loader
    pub fn with_loader(loader: ChunkLoader) -> Self {
        Self {
            loader: Some(loader),
            ..Self::new()
        }
    }

    pub fn set_preload_distance(&mut self, distance: i32) {
        self.preload_distance = distance.max(0);
    }

    /// Fetch a chunk, lazily creating a placeholder for unseen coordinates.
    /// With a loader attached the coordinate is also queued for a background
    /// build (deduplicated against queued and in-flight loads); the returned
    /// placeholder is usable immediately and callers never wait.
    pub fn get_or_create(&mut self, coord: IVec2) -> &mut Chunk {
        if !self.chunks.contains_key(&coord) {
            if let Some(loader) = &self.loader {
                loader.request(LoadRequest::new(coord, 0));
            }
        }
        self.chunks.entry(coord).or_insert_with(|| Chunk::new(coord))
    }

    pub fn get(&self, coord: IVec2) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Recompute the active set around the observer and collect entities
    /// whose chunks came back to life.
    ///
    /// Every previously active chunk is deactivated, then the full
    /// `(2 * ACTIVATION_DISTANCE + 1)^2` neighborhood of the observer's chunk
    /// is activated (creating chunks as needed). A chunk crossing
    /// inactive -> active with parked entities contributes a [`ChunkRestore`]
    /// and its cache is drained. Afterwards speculative loads are queued:
    /// a cone along `velocity` when moving, a uniform ring when standing
    /// still.
    pub fn update_active_set(&mut self, observer: Vec2, velocity: Vec2) -> Vec<ChunkRestore> {
        self.publish_loaded();

        let observer_chunk = Chunk::world_to_chunk(observer);

        for coord in self.active_chunks.drain(..) {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.set_active(false);
            }
        }

        let mut restored = Vec::new();
        for cy in (observer_chunk.y - ACTIVATION_DISTANCE)..=(observer_chunk.y + ACTIVATION_DISTANCE)
        {
            for cx in
                (observer_chunk.x - ACTIVATION_DISTANCE)..=(observer_chunk.x + ACTIVATION_DISTANCE)
            {
                let coord = IVec2::new(cx, cy);
                let chunk = self.get_or_create(coord);
                let newly_active = chunk.set_active(true);
                if newly_active && chunk.cached_entity_count() > 0 {
                    let entities = chunk.take_cached_entities();
                    log::debug!(
                        "[CHUNK] restoring {} entities in chunk ({cx}, {cy})",
                        entities.len()
                    );
                    restored.push(ChunkRestore { coord, entities });
                }
                self.active_chunks.push(coord);
            }
        }

        if self.loader.is_some() {
            self.preload_towards(observer_chunk, velocity);
        }

        log::trace!(
            "[CHUNK] {} active chunks around ({}, {})",
            self.active_chunks.len(),
            observer_chunk.x,
            observer_chunk.y
        );

        restored
    }

    /// Coordinates of the currently active chunks
    pub fn active_coords(&self) -> &[IVec2] {
        &self.active_chunks
    }

    /// Iterate the currently active chunks
    pub fn active_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.active_chunks
            .iter()
            .filter_map(|coord| self.chunks.get(coord))
    }

    pub fn is_point_in_active_chunk(&self, point: Vec2) -> bool {
        self.chunks
            .get(&Chunk::world_to_chunk(point))
            .is_some_and(|chunk| chunk.is_active())
    }

    /// Route a world-space tile collider to the chunk containing its origin
    pub fn add_tile_collider(&mut self, key: IVec2, collider: RectCollider) {
        let coord = Chunk::world_to_chunk(collider.position());
        self.get_or_create(coord).add_tile_collider(key, collider);
    }

    /// Merge the tile colliders of the active chunks only. Inactive chunks
    /// never contribute; the per-tick collision pass must not scan them.
    pub fn active_chunk_colliders(&self) -> AHashMap<IVec2, RectCollider> {
        let mut colliders = AHashMap::new();
        for chunk in self.active_chunks() {
            for (key, collider) in chunk.tile_colliders() {
                colliders.insert(*key, *collider);
            }
        }
        colliders
    }

    /// Whether the chunk under `point` is inactive and has been for more than
    /// `stale_time` plus a fixed grace margin. Unknown chunks are not stale.
    pub fn is_in_inactive_stale_chunk(&self, point: Vec2, stale_time: Duration) -> bool {
        match self.chunks.get(&Chunk::world_to_chunk(point)) {
            Some(chunk) if !chunk.is_active() => {
                chunk.last_active().elapsed() > stale_time + STALE_QUERY_GRACE
            }
            _ => false,
        }
    }

    /// All chunks inactive for strictly longer than `stale_time`
    pub fn stale_chunks(&self, stale_time: Duration) -> Vec<&Chunk> {
        self.chunks
            .values()
            .filter(|chunk| !chunk.is_active() && chunk.last_active().elapsed() > stale_time)
            .collect()
    }

    /// Park a despawned entity's snapshot in its owning chunk, creating the
    /// chunk if it has never been seen
    pub fn cache_entity_state(&mut self, snapshot: EntitySnapshot) {
        let coord = snapshot.chunk;
        let chunk = self.get_or_create(coord);
        if chunk.is_active() {
            // Callers evict from stale chunks, which are inactive by
            // definition; anything else surfaces on the next reactivation.
            log::warn!(
                "[CHUNK] caching entity state into active chunk ({}, {})",
                coord.x,
                coord.y
            );
        }
        log::debug!(
            "[CHUNK] cached {:?} state in chunk ({}, {})",
            snapshot.class,
            coord.x,
            coord.y
        );
        chunk.cache_entity(snapshot);
    }

    /// Publish chunks finished by the background loader. A coordinate that
    /// gained a placeholder in the meantime keeps it and absorbs the built
    /// colliders; activation state and cached entities are never clobbered.
    pub fn publish_loaded(&mut self) {
        let Some(loader) = &self.loader else {
            return;
        };
        for loaded in loader.drain_loaded() {
            match self.chunks.entry(loaded.coord) {
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(loaded);
                }
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().absorb(loaded);
                }
            }
        }
    }

    /// Toggle the chunk boundary debug overlay. Marker geometry comes from
    /// [`ChunkManager::chunk_boundary_markers`]; drawing is the renderer's
    /// job.
    pub fn set_show_chunk_boundaries(&mut self, show: bool) {
        self.show_chunk_boundaries = show;
    }

    pub fn show_chunk_boundaries(&self) -> bool {
        self.show_chunk_boundaries
    }

    /// Boundary rectangles plus activation flags for every chunk, empty while
    /// the overlay is disabled
    pub fn chunk_boundary_markers(&self) -> Vec<(RectCollider, bool)> {
        if !self.show_chunk_boundaries {
            return Vec::new();
        }
        self.chunks
            .values()
            .map(|chunk| (chunk.boundary_rect(), chunk.is_active()))
            .collect()
    }

    /// Drop every chunk and the active set (level reset). The loader keeps
    /// running; stale in-flight results are absorbed into fresh placeholders
    /// or published as new chunks.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.active_chunks.clear();
    }

    fn preload_towards(&self, origin: IVec2, velocity: Vec2) {
        let direction = IVec2::new(axis_sign(velocity.x), axis_sign(velocity.y));
        if direction == IVec2::ZERO {
            for (coord, priority) in omni_preload_footprint(origin, self.preload_distance) {
                self.queue_preload(coord, priority);
            }
        } else {
            for (coord, priority) in
                directional_preload_footprint(origin, direction, self.preload_distance)
            {
                self.queue_preload(coord, priority);
            }
        }
    }

    fn queue_preload(&self, coord: IVec2, priority: i32) {
        if self.chunks.contains_key(&coord) {
            return;
        }
        if let Some(loader) = &self.loader {
            if loader.request(LoadRequest::new(coord, priority)) {
                log::trace!(
                    "[LOAD] preload queued for chunk ({}, {}) priority {}",
                    coord.x,
                    coord.y,
                    priority
                );
            }
        }
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new()
    }
}

fn axis_sign(v: f32) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Cone-shaped preload footprint ahead of a moving observer.
///
/// For each step distance: the chunk straight ahead loads most urgently
/// (priority = distance), the axis projections follow for diagonal movement
/// (distance + 1), then the lateral chunks flanking the ahead chunk
/// (distance + 2). Biasing the footprint toward the travel direction keeps
/// background work off chunks the observer is moving away from.
fn directional_preload_footprint(
    origin: IVec2,
    direction: IVec2,
    preload_distance: i32,
) -> Vec<(IVec2, i32)> {
    let mut footprint = Vec::new();

    for distance in 1..=preload_distance {
        let priority = distance;
        let ahead = origin + direction * distance;
        footprint.push((ahead, priority));

        if direction.x != 0 && direction.y != 0 {
            footprint.push((
                IVec2::new(origin.x + direction.x * distance, origin.y),
                priority + 1,
            ));
            footprint.push((
                IVec2::new(origin.x, origin.y + direction.y * distance),
                priority + 1,
            ));
        }

        if direction.x != 0 {
            footprint.push((IVec2::new(ahead.x, origin.y + 1), priority + 2));
            footprint.push((IVec2::new(ahead.x, origin.y - 1), priority + 2));
        }
        if direction.y != 0 {
            footprint.push((IVec2::new(origin.x + 1, ahead.y), priority + 2));
            footprint.push((IVec2::new(origin.x - 1, ahead.y), priority + 2));
        }
    }

    footprint
}

/// Uniform preload ring around a stationary observer, center excluded,
/// priority growing with Chebyshev distance
fn omni_preload_footprint(center: IVec2, radius: i32) -> Vec<(IVec2, i32)> {
    let mut footprint = Vec::new();
    for cy in (center.y - radius)..=(center.y + radius) {
        for cx in (center.x - radius)..=(center.x + radius) {
            if cx == center.x && cy == center.y {
                continue;
            }
            let distance = (cx - center.x).abs().max((cy - center.y).abs());
            footprint.push((IVec2::new(cx, cy), distance * 2));
        }
    }
    footprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EnemyClass, EntitySnapshot};
    use crate::world::chunk::chunk_span;
    use instant::Instant;

    fn chunk_center(coord: IVec2) -> Vec2 {
        Chunk::chunk_to_world(coord) + Vec2::splat(chunk_span() / 2.0)
    }

    fn snapshot_in_chunk(coord: IVec2) -> EntitySnapshot {
        EntitySnapshot::capture(
            EnemyClass::Basic,
            chunk_center(coord),
            20.0,
            40.0,
            80.0,
            12.0,
            10,
            5.0,
            Instant::now(),
        )
    }

    #[test]
    fn test_get_or_create_returns_same_chunk() {
        let mut manager = ChunkManager::new();
        let coord = IVec2::new(4, -2);

        manager
            .get_or_create(coord)
            .add_tile_collider(IVec2::new(0, 0), RectCollider::new(0.0, 0.0, 1.0, 1.0));

        // Same coordinate resolves to the same chunk, not a fresh one.
        assert_eq!(manager.get_or_create(coord).tile_colliders().len(), 1);
        assert_eq!(manager.chunk_count(), 1);
    }

    #[test]
    fn test_world_positions_share_chunk_identity() {
        let mut manager = ChunkManager::new();
        let span = chunk_span();

        let a = Chunk::world_to_chunk(Vec2::new(span + 1.0, 1.0));
        let b = Chunk::world_to_chunk(Vec2::new(span * 2.0 - 1.0, span - 1.0));
        assert_eq!(a, b);

        manager.get_or_create(a);
        manager.get_or_create(b);
        assert_eq!(manager.chunk_count(), 1);
    }

    #[test]
    fn test_active_set_is_exactly_the_neighborhood() {
        let mut manager = ChunkManager::new();
        let restored = manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);
        assert!(restored.is_empty());

        assert_eq!(manager.active_coords().len(), 9);
        for cy in -1..=1 {
            for cx in -1..=1 {
                let coord = IVec2::new(cx, cy);
                assert!(
                    manager.get(coord).is_some_and(|c| c.is_active()),
                    "chunk ({cx}, {cy}) should be active"
                );
            }
        }
    }

    #[test]
    fn test_previous_active_set_is_deactivated() {
        let mut manager = ChunkManager::new();
        manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);
        manager.update_active_set(chunk_center(IVec2::new(10, 10)), Vec2::ZERO);

        assert_eq!(manager.active_coords().len(), 9);
        for cy in -1..=1 {
            for cx in -1..=1 {
                let chunk = manager.get(IVec2::new(cx, cy)).expect("chunk exists");
                assert!(!chunk.is_active(), "chunk ({cx}, {cy}) should be inactive");
            }
        }
        assert!(manager.is_point_in_active_chunk(chunk_center(IVec2::new(10, 10))));
        assert!(!manager.is_point_in_active_chunk(chunk_center(IVec2::new(0, 0))));
    }

    #[test]
    fn test_cache_round_trip() {
        let mut manager = ChunkManager::new();
        let far = IVec2::new(6, 6);

        manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);
        manager.cache_entity_state(snapshot_in_chunk(far));
        assert_eq!(
            manager.get(far).map(|c| c.cached_entity_count()),
            Some(1),
            "snapshot parked in its owning chunk"
        );

        // Observer moves onto the cached chunk: exactly one restore event.
        let restored = manager.update_active_set(chunk_center(far), Vec2::ZERO);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].coord, far);
        assert_eq!(restored[0].entities.len(), 1);
        assert_eq!(manager.get(far).map(|c| c.cached_entity_count()), Some(0));

        // Re-activation without new snapshots restores nothing.
        let restored = manager.update_active_set(chunk_center(far), Vec2::ZERO);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_collider_routing_and_active_merge() {
        let mut manager = ChunkManager::new();
        let span = chunk_span();

        // One collider in chunk (0, 0), one in chunk (5, 0).
        manager.add_tile_collider(
            IVec2::new(1, 1),
            RectCollider::new(70.0, 70.0, 60.0, 60.0),
        );
        manager.add_tile_collider(
            IVec2::new(90, 1),
            RectCollider::new(span * 5.0 + 70.0, 70.0, 60.0, 60.0),
        );

        manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);
        let colliders = manager.active_chunk_colliders();
        assert_eq!(colliders.len(), 1);
        assert!(colliders.contains_key(&IVec2::new(1, 1)));

        manager.update_active_set(chunk_center(IVec2::new(5, 0)), Vec2::ZERO);
        let colliders = manager.active_chunk_colliders();
        assert_eq!(colliders.len(), 1);
        assert!(colliders.contains_key(&IVec2::new(90, 1)));
    }

    #[test]
    fn test_staleness_uses_strict_threshold_and_grace() {
        let mut manager = ChunkManager::new();
        let coord = IVec2::new(3, 3);
        manager.get_or_create(coord);

        std::thread::sleep(Duration::from_millis(5));

        // Inactive for ~5ms: stale against a zero threshold...
        assert_eq!(manager.stale_chunks(Duration::ZERO).len(), 1);
        // ...but not against a threshold it has not exceeded...
        assert!(manager.stale_chunks(Duration::from_secs(60)).is_empty());
        // ...and the point query adds a one second grace margin on top.
        assert!(!manager.is_in_inactive_stale_chunk(chunk_center(coord), Duration::ZERO));

        // Active chunks are never stale.
        manager.update_active_set(chunk_center(coord), Vec2::ZERO);
        assert!(manager.stale_chunks(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_unknown_chunk_is_not_stale() {
        let manager = ChunkManager::new();
        assert!(!manager.is_in_inactive_stale_chunk(Vec2::new(1e6, 1e6), Duration::ZERO));
    }

    #[test]
    fn test_directional_footprint_straight() {
        let footprint = directional_preload_footprint(IVec2::ZERO, IVec2::new(1, 0), 2);

        // Per step: ahead + two lateral cells.
        assert_eq!(footprint.len(), 6);
        assert!(footprint.contains(&(IVec2::new(1, 0), 1)));
        assert!(footprint.contains(&(IVec2::new(1, 1), 3)));
        assert!(footprint.contains(&(IVec2::new(1, -1), 3)));
        assert!(footprint.contains(&(IVec2::new(2, 0), 2)));
        assert!(footprint.contains(&(IVec2::new(2, 1), 4)));
        assert!(footprint.contains(&(IVec2::new(2, -1), 4)));

        // Nothing behind the observer.
        assert!(footprint.iter().all(|(coord, _)| coord.x >= 1));
    }

    #[test]
    fn test_directional_footprint_diagonal() {
        let footprint = directional_preload_footprint(IVec2::ZERO, IVec2::new(1, -1), 1);

        assert!(footprint.contains(&(IVec2::new(1, -1), 1)));
        // Axis projections at one step.
        assert!(footprint.contains(&(IVec2::new(1, 0), 2)));
        assert!(footprint.contains(&(IVec2::new(0, -1), 2)));
        // Laterals flank the ahead cell on both axes.
        assert!(footprint.contains(&(IVec2::new(1, 1), 3)));
        assert!(footprint.contains(&(IVec2::new(-1, -1), 3)));
        assert_eq!(footprint.len(), 7);
    }

    #[test]
    fn test_omni_footprint_ring() {
        let footprint = omni_preload_footprint(IVec2::new(2, 2), 2);

        // 5x5 square minus the center.
        assert_eq!(footprint.len(), 24);
        assert!(!footprint.iter().any(|(coord, _)| *coord == IVec2::new(2, 2)));
        assert!(footprint.contains(&(IVec2::new(3, 2), 2)));
        assert!(footprint.contains(&(IVec2::new(4, 4), 4)));
    }

    #[test]
    fn test_priorities_grow_with_distance() {
        let footprint = directional_preload_footprint(IVec2::ZERO, IVec2::new(0, 1), 3);
        for (coord, priority) in footprint {
            let distance = coord.x.abs().max(coord.y.abs());
            assert!(
                priority >= distance,
                "chunk {coord:?} priority {priority} below its distance {distance}"
            );
        }
    }

    #[test]
    fn test_debug_overlay_markers() {
        let mut manager = ChunkManager::new();
        manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);

        assert!(manager.chunk_boundary_markers().is_empty());

        manager.set_show_chunk_boundaries(true);
        let markers = manager.chunk_boundary_markers();
        assert_eq!(markers.len(), 9);
        assert!(markers.iter().all(|(_, active)| *active));
    }

    #[test]
    fn test_clear_resets_store() {
        let mut manager = ChunkManager::new();
        manager.update_active_set(chunk_center(IVec2::new(0, 0)), Vec2::ZERO);
        assert_ne!(manager.chunk_count(), 0);

        manager.clear();
        assert_eq!(manager.chunk_count(), 0);
        assert!(manager.active_coords().is_empty());
    }
}
