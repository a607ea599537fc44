//! Chunk - 16x16 tile cell of the streamed world grid

use ahash::AHashMap;
use glam::{IVec2, Vec2};
use instant::Instant;

use super::tile::TILE_SIZE;
use crate::collision::RectCollider;
use crate::entity::EntitySnapshot;

/// Chunk side length in tiles
pub const CHUNK_SIZE: usize = 16;

/// Chunk side length in world units
pub fn chunk_span() -> f32 {
    CHUNK_SIZE as f32 * TILE_SIZE
}

/// A fixed-size cell of the world grid, the unit of activation and streaming
///
/// Owns the colliders of its non-walkable tiles and the snapshots of entities
/// parked while the chunk is inactive. Activation state is flipped by the
/// chunk store every tick; all other fields settle at creation time.
pub struct Chunk {
    /// Chunk coordinates (in chunk space, not world space)
    pub coord: IVec2,

    active: bool,
    /// Refreshed on every inactive -> active transition
    last_active: Instant,

    /// Colliders of the chunk's non-walkable tiles, keyed by tile coordinate.
    /// Populated once while the chunk is built, immutable afterwards.
    tile_colliders: AHashMap<IVec2, RectCollider>,

    /// Entities parked here while the chunk is inactive
    cached_entities: Vec<EntitySnapshot>,
}

impl Chunk {
    pub fn new(coord: IVec2) -> Self {
        Self {
            coord,
            active: false,
            last_active: Instant::now(),
            tile_colliders: AHashMap::new(),
            cached_entities: Vec::new(),
        }
    }

    /// World position of the chunk's top-left corner
    pub fn world_origin(&self) -> Vec2 {
        Self::chunk_to_world(self.coord)
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        let origin = self.world_origin();
        let span = chunk_span();
        point.x >= origin.x
            && point.x < origin.x + span
            && point.y >= origin.y
            && point.y < origin.y + span
    }

    /// Chebyshev range test in chunk units
    pub fn in_range_of(&self, center: IVec2, distance: i32) -> bool {
        (self.coord.x - center.x).abs() <= distance && (self.coord.y - center.y).abs() <= distance
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip activation state. Returns true on an inactive -> active
    /// transition, which also refreshes the last-active timestamp.
    pub(crate) fn set_active(&mut self, active: bool) -> bool {
        let newly_active = active && !self.active;
        if newly_active {
            self.last_active = Instant::now();
        }
        self.active = active;
        newly_active
    }

    /// Time of the most recent activation
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Register a tile collider. The first collider wins for a given key;
    /// tiles never change shape after the level is built.
    pub fn add_tile_collider(&mut self, key: IVec2, collider: RectCollider) {
        self.tile_colliders.entry(key).or_insert(collider);
    }

    pub fn tile_colliders(&self) -> &AHashMap<IVec2, RectCollider> {
        &self.tile_colliders
    }

    /// Park a despawned entity's state in this chunk
    pub fn cache_entity(&mut self, snapshot: EntitySnapshot) {
        self.cached_entities.push(snapshot);
    }

    pub fn cached_entity_count(&self) -> usize {
        self.cached_entities.len()
    }

    /// Drain the parked entities for restoration. Each snapshot is handed out
    /// exactly once.
    pub(crate) fn take_cached_entities(&mut self) -> Vec<EntitySnapshot> {
        std::mem::take(&mut self.cached_entities)
    }

    /// Fold a background-built chunk for the same coordinate into this one.
    /// Only colliders move over; activation state and cached entities belong
    /// to the already-published chunk.
    pub(crate) fn absorb(&mut self, loaded: Chunk) {
        debug_assert_eq!(self.coord, loaded.coord);
        for (key, collider) in loaded.tile_colliders {
            self.tile_colliders.entry(key).or_insert(collider);
        }
    }

    /// Boundary rectangle in world units, for the debug overlay
    pub fn boundary_rect(&self) -> RectCollider {
        let origin = self.world_origin();
        RectCollider::new(origin.x, origin.y, chunk_span(), chunk_span())
    }

    /// World position to chunk coordinate
    pub fn world_to_chunk(world: Vec2) -> IVec2 {
        let span = chunk_span();
        IVec2::new(
            (world.x / span).floor() as i32,
            (world.y / span).floor() as i32,
        )
    }

    /// Chunk coordinate to the world position of its top-left corner
    pub fn chunk_to_world(coord: IVec2) -> Vec2 {
        Vec2::new(coord.x as f32 * chunk_span(), coord.y as f32 * chunk_span())
    }
}
