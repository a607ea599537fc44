//! World level - owns the generated tile grid and its collider index
//!
//! The level converts between world coordinates and the padded tile grid,
//! derives a collider for every non-walkable tile, and answers the
//! walkability queries the simulation runs each tick. Collision lookups are
//! windowed to the tiles near the query point; nothing here scans the whole
//! map per tick.

use std::sync::Arc;

use ahash::AHashMap;
use glam::IVec2;

use super::chunk::Chunk;
use super::chunk_loader::ChunkSource;
use super::chunk_manager::ChunkManager;
use super::gen_config::GenerationConfig;
use super::generation::{TerrainGenerator, TileGrid};
use super::tile::{TILE_OVERLAP, TILE_SIZE, TileType};
use crate::collision::RectCollider;

/// Shrink factor for tile colliders, leaves a sliver of clearance so entities
/// sliding along a wall do not snag on seams between flush tiles
const COLLIDER_SIZE_FACTOR: f32 = 0.98;

/// Extra grid cells beyond the viewport so border tiles always have a full
/// neighborhood during generation
const BORDER_PADDING: usize = 3;

/// Offset from world-space tile indexing into the padded grid
const BORDER_OFFSET: i32 = 1;

/// Search radius for nearby-collider queries, in tiles
const NEARBY_SEARCH_TILES: f32 = 4.0;

/// Viewport change below which a resize keeps the current map
const RESIZE_TOLERANCE: f32 = 50.0;

/// The generated level: tile grid plus derived tile colliders
pub struct WorldLevel {
    width: f32,
    height: f32,
    seed: u64,
    generator: TerrainGenerator,
    grid: TileGrid,
    colliders: AHashMap<IVec2, RectCollider>,
}

impl WorldLevel {
    /// Generate a level for a viewport with the default configuration
    pub fn new(width: f32, height: f32, seed: u64) -> Self {
        Self::with_config(width, height, seed, GenerationConfig::default())
    }

    pub fn with_config(width: f32, height: f32, seed: u64, config: GenerationConfig) -> Self {
        let generator = TerrainGenerator::with_config(config);
        let (grid, colliders) = build_level(&generator, width, height, seed);
        Self {
            width,
            height,
            seed,
            generator,
            grid,
            colliders,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Colliders of every non-walkable tile, keyed by grid tile coordinate
    pub fn tile_colliders(&self) -> &AHashMap<IVec2, RectCollider> {
        &self.colliders
    }

    /// Whether the tile under a world position can be walked on. Outside the
    /// generated grid nothing is walkable.
    ///
    /// World coordinates map into the padded grid with a +1 offset per axis;
    /// the first padded row/column covers the strip just outside the
    /// viewport.
    pub fn is_tile_walkable(&self, x: f32, y: f32) -> bool {
        let tile_x = (x / TILE_SIZE).floor() as i32 + BORDER_OFFSET;
        let tile_y = (y / TILE_SIZE).floor() as i32 + BORDER_OFFSET;

        self.grid
            .get(tile_x, tile_y)
            .map(|tile| tile.is_walkable())
            .unwrap_or(false)
    }

    /// Whether `area` clears every collider near it. Only the windowed
    /// nearby set is consulted.
    pub fn is_area_walkable(&self, area: &RectCollider) -> bool {
        let nearby = self.nearby_tile_colliders(area.x, area.y);
        !nearby.values().any(|collider| area.intersects_rect(collider))
    }

    /// Colliders whose tile sits within the search window of a world
    /// position, regardless of chunk activation. Used for localized
    /// bullet/tile collision.
    pub fn nearby_tile_colliders(&self, x: f32, y: f32) -> AHashMap<IVec2, RectCollider> {
        let search = TILE_SIZE * NEARBY_SEARCH_TILES;

        let min_tile_x = (((x - search) / TILE_SIZE).floor() as i32).max(0);
        let max_tile_x = (((x + search) / TILE_SIZE).ceil() as i32).min(self.grid.width() as i32 - 1);
        let min_tile_y = (((y - search) / TILE_SIZE).floor() as i32).max(0);
        let max_tile_y = (((y + search) / TILE_SIZE).ceil() as i32).min(self.grid.height() as i32 - 1);

        let mut nearby = AHashMap::new();
        for tile_y in min_tile_y..=max_tile_y {
            for tile_x in min_tile_x..=max_tile_x {
                let key = IVec2::new(tile_x, tile_y);
                if let Some(collider) = self.colliders.get(&key) {
                    nearby.insert(key, *collider);
                }
            }
        }
        nearby
    }

    /// Tile type at raw grid coordinates; out of bounds falls back to the
    /// walkable default
    pub fn tile_type(&self, tile_x: i32, tile_y: i32) -> TileType {
        self.grid.get(tile_x, tile_y).unwrap_or_default()
    }

    /// Route every tile collider into the chunk store
    pub fn feed_colliders(&self, chunks: &mut ChunkManager) {
        for (key, collider) in &self.colliders {
            chunks.add_tile_collider(*key, *collider);
        }
        log::debug!(
            "[LEVEL] routed {} tile colliders into the chunk store",
            self.colliders.len()
        );
    }

    /// Snapshot the collider index for the background loader
    pub fn chunk_source(&self) -> TerrainChunkSource {
        TerrainChunkSource::new(&self.colliders)
    }

    /// Adopt a new viewport size. Small changes keep the current map; larger
    /// ones regenerate it from the persistent seed. Returns true when the
    /// level was regenerated.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if (self.width - width).abs() < RESIZE_TOLERANCE
            && (self.height - height).abs() < RESIZE_TOLERANCE
        {
            log::debug!("[LEVEL] resize within tolerance, keeping current map");
            self.width = width;
            self.height = height;
            return false;
        }

        self.width = width;
        self.height = height;
        self.regenerate();
        true
    }

    /// Rebuild the grid and colliders from the persistent seed
    pub fn regenerate(&mut self) {
        let (grid, colliders) = build_level(&self.generator, self.width, self.height, self.seed);
        self.grid = grid;
        self.colliders = colliders;
    }
}

fn build_level(
    generator: &TerrainGenerator,
    width: f32,
    height: f32,
    seed: u64,
) -> (TileGrid, AHashMap<IVec2, RectCollider>) {
    let map_width = (width / TILE_SIZE).ceil() as usize + BORDER_PADDING;
    let map_height = (height / TILE_SIZE).ceil() as usize + BORDER_PADDING;

    let grid = generator.generate(map_width, map_height, seed);

    // Tiles overlap by a sliver to hide sprite seams; colliders shrink and
    // re-center inside their tile.
    let tile_step = TILE_SIZE - TILE_OVERLAP;
    let collider_size = TILE_SIZE * COLLIDER_SIZE_FACTOR;
    let collider_offset = (TILE_SIZE - collider_size) / 2.0;

    let mut colliders = AHashMap::new();
    for tile_y in 0..map_height {
        for tile_x in 0..map_width {
            let tile = grid
                .get(tile_x as i32, tile_y as i32)
                .unwrap_or_default();
            if tile.is_walkable() {
                continue;
            }

            let x = tile_x as f32 * tile_step - TILE_OVERLAP;
            let y = tile_y as f32 * tile_step - TILE_OVERLAP;
            colliders.insert(
                IVec2::new(tile_x as i32, tile_y as i32),
                RectCollider::new(
                    x + collider_offset,
                    y + collider_offset,
                    collider_size,
                    collider_size,
                ),
            );
        }
    }

    let histogram = grid.histogram();
    for tile in TileType::ALL {
        log::debug!("[LEVEL] {:?}: {} tiles", tile, histogram[tile.index()]);
    }
    log::info!(
        "[LEVEL] generated {}x{} tiles (seed {seed}), {} colliders",
        map_width,
        map_height,
        colliders.len()
    );

    (grid, colliders)
}

/// Immutable snapshot of the level's colliders, bucketed per chunk, shared
/// with loader workers
pub struct TerrainChunkSource {
    by_chunk: Arc<AHashMap<IVec2, Vec<(IVec2, RectCollider)>>>,
}

impl TerrainChunkSource {
    fn new(colliders: &AHashMap<IVec2, RectCollider>) -> Self {
        let mut by_chunk: AHashMap<IVec2, Vec<(IVec2, RectCollider)>> = AHashMap::new();
        for (key, collider) in colliders {
            let coord = Chunk::world_to_chunk(collider.position());
            by_chunk.entry(coord).or_default().push((*key, *collider));
        }
        Self {
            by_chunk: Arc::new(by_chunk),
        }
    }
}

impl ChunkSource for TerrainChunkSource {
    fn build_chunk(&self, coord: IVec2) -> anyhow::Result<Chunk> {
        let mut chunk = Chunk::new(coord);
        if let Some(colliders) = self.by_chunk.get(&coord) {
            for (key, collider) in colliders {
                chunk.add_tile_collider(*key, *collider);
            }
        }
        Ok(chunk)
    }
}
