//! Procedural tile map generation
//!
//! Three-stage pipeline: stochastic Markov expansion from the grid center,
//! cellular-automata smoothing, then cleanup of undersized regions. The whole
//! pipeline is deterministic for a fixed seed and keeps no state between
//! calls, so one generator can serve concurrent callers.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use smallvec::SmallVec;

use super::gen_config::GenerationConfig;
use super::tile::TileType;

/// 8-neighborhood offsets in the fixed visit order used by the expansion flood
const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// 4-neighborhood offsets used by region flood fill
const NEIGHBORS_4: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Upper bound on cleanup sweeps; reassignment can split or spawn small
/// regions of another type, so the sweep repeats until none remain
const MAX_CLEANUP_PASSES: usize = 8;

/// 2D grid of tile types, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<TileType>,
}

impl TileGrid {
    fn filled(width: usize, height: usize, tile: TileType) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height
    }

    /// Tile at grid coordinates, `None` when out of bounds
    pub fn get(&self, x: i32, y: i32) -> Option<TileType> {
        if self.in_bounds(x, y) {
            Some(self.tile(x as usize, y as usize))
        } else {
            None
        }
    }

    fn tile(&self, x: usize, y: usize) -> TileType {
        self.tiles[y * self.width + x]
    }

    fn set(&mut self, x: usize, y: usize, tile: TileType) {
        self.tiles[y * self.width + x] = tile;
    }

    /// Per-type tile counts, indexed by `TileType::index()`
    pub fn histogram(&self) -> [usize; TileType::COUNT] {
        let mut counts = [0usize; TileType::COUNT];
        for tile in &self.tiles {
            counts[tile.index()] += 1;
        }
        counts
    }
}

/// Seeded tile map generator
pub struct TerrainGenerator {
    config: GenerationConfig,
    /// Dense transition table, `table[parent][next]`
    table: [[f64; TileType::COUNT]; TileType::COUNT],
    /// Survival bands as `(min, max)` same-type neighbor counts
    bands: [(usize, usize); TileType::COUNT],
}

impl TerrainGenerator {
    /// Create a generator with the default configuration
    pub fn new() -> Self {
        Self::with_config(GenerationConfig::default())
    }

    /// Create a generator from a configuration
    ///
    /// A malformed config is diagnosed but not rejected: sampling falls back
    /// to keeping the parent type wherever a transition row is short.
    pub fn with_config(config: GenerationConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("[GEN] config check failed ({e}); sampler keeps the parent type on fallthrough");
        }

        let mut table = [[0.0; TileType::COUNT]; TileType::COUNT];
        let mut bands = [(0usize, 8usize); TileType::COUNT];
        for tile in TileType::ALL {
            if let Some(row) = config.transition_row(tile) {
                table[tile.index()] = row.weights;
            }
            if let Some(band) = config.survival_band(tile) {
                bands[tile.index()] = (band.min, band.max);
            }
        }

        Self {
            config,
            table,
            bands,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate a `width` x `height` tile grid. Deterministic per seed.
    pub fn generate(&self, width: usize, height: usize, seed: u64) -> TileGrid {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let mut grid = self.markov_expand(width, height, &mut rng);
        self.smooth(&mut grid);
        self.cleanup_regions(&mut grid);

        grid
    }

    /// Stage 1: breadth-first flood from the grid center, sampling each newly
    /// reached cell from the parent cell's transition row.
    fn markov_expand(
        &self,
        width: usize,
        height: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> TileGrid {
        let initial = self.config.initial_tile;
        let mut grid = TileGrid::filled(width, height, initial);
        if width == 0 || height == 0 {
            return grid;
        }

        let mut visited = vec![false; width * height];
        let mut queue = VecDeque::new();

        let center = (width / 2, height / 2);
        visited[center.1 * width + center.0] = true;
        queue.push_back(center);

        while let Some((x, y)) = queue.pop_front() {
            let parent = grid.tile(x, y);

            for (dx, dy) in NEIGHBORS_8 {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if grid.in_bounds(nx, ny) && !visited[ny as usize * width + nx as usize] {
                    visited[ny as usize * width + nx as usize] = true;
                    let next = self.sample_transition(parent, rng.gen::<f64>());
                    grid.set(nx as usize, ny as usize, next);
                    queue.push_back((nx as usize, ny as usize));
                }
            }
        }

        // Safety net: the flood reaches every cell of a connected grid, but
        // any straggler takes the type of a random neighbor.
        for y in 0..height {
            for x in 0..width {
                if !visited[y * width + x] {
                    let tile = self.random_neighbor_type(&grid, x, y, rng).unwrap_or(initial);
                    grid.set(x, y, tile);
                }
            }
        }

        grid
    }

    /// Sample the next tile type from `parent`'s transition row by cumulative
    /// probability. A roll that runs past the end of the row (weights not
    /// summing to 1) keeps the parent type.
    fn sample_transition(&self, parent: TileType, roll: f64) -> TileType {
        let mut cumulative = 0.0;
        for next in TileType::ALL {
            cumulative += self.table[parent.index()][next.index()];
            if roll < cumulative {
                return next;
            }
        }
        parent
    }

    fn random_neighbor_type(
        &self,
        grid: &TileGrid,
        x: usize,
        y: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Option<TileType> {
        let mut neighbors: SmallVec<[TileType; 8]> = SmallVec::new();
        for (dx, dy) in NEIGHBORS_8 {
            if let Some(tile) = grid.get(x as i32 + dx, y as i32 + dy) {
                neighbors.push(tile);
            }
        }
        if neighbors.is_empty() {
            None
        } else {
            Some(neighbors[rng.gen_range(0..neighbors.len())])
        }
    }

    /// Stage 2: double-buffered cellular-automata smoothing. A cell keeps its
    /// type while its same-type neighbor count sits inside the type's survival
    /// band, otherwise it takes the most frequent neighbor type.
    fn smooth(&self, grid: &mut TileGrid) {
        for _ in 0..self.config.ca_iterations {
            let mut next = grid.tiles.clone();

            for y in 0..grid.height {
                for x in 0..grid.width {
                    let counts = Self::neighbor_counts(grid, x, y);
                    let current = grid.tile(x, y);
                    let (min, max) = self.bands[current.index()];
                    let same = counts[current.index()];

                    next[y * grid.width + x] = if same >= min && same <= max {
                        current
                    } else {
                        Self::dominant_type(&counts)
                    };
                }
            }

            grid.tiles = next;
        }
    }

    fn neighbor_counts(grid: &TileGrid, x: usize, y: usize) -> [usize; TileType::COUNT] {
        let mut counts = [0usize; TileType::COUNT];
        for (dx, dy) in NEIGHBORS_8 {
            if let Some(tile) = grid.get(x as i32 + dx, y as i32 + dy) {
                counts[tile.index()] += 1;
            }
        }
        counts
    }

    /// Most frequent type in `counts`; ties resolve to the lowest type index
    fn dominant_type(counts: &[usize; TileType::COUNT]) -> TileType {
        let mut dominant = TileType::Grass;
        let mut max_count = 0;
        for tile in TileType::ALL {
            if counts[tile.index()] > max_count {
                max_count = counts[tile.index()];
                dominant = tile;
            }
        }
        dominant
    }

    /// Stage 3: dissolve 4-connected regions of non-default types that fall
    /// below the configured minimum size, reassigning them to the dominant
    /// surrounding type. Sweeps repeat because a reassignment can leave a new
    /// undersized region of the replacement type.
    fn cleanup_regions(&self, grid: &mut TileGrid) {
        for _ in 0..MAX_CLEANUP_PASSES {
            if !self.cleanup_pass(grid) {
                return;
            }
        }
        log::warn!(
            "[GEN] region cleanup did not settle within {MAX_CLEANUP_PASSES} passes ({}x{} grid)",
            grid.width,
            grid.height
        );
    }

    /// One sweep over all non-default types. Returns true when any region was
    /// reassigned.
    fn cleanup_pass(&self, grid: &mut TileGrid) -> bool {
        let default_tile = self.config.initial_tile;
        let mut changed = false;
        let mut visited = vec![false; grid.width * grid.height];

        for target in TileType::ALL {
            if target == default_tile {
                continue;
            }
            visited.fill(false);

            for y in 0..grid.height {
                for x in 0..grid.width {
                    if grid.tile(x, y) != target || visited[y * grid.width + x] {
                        continue;
                    }

                    let region = Self::connected_region(grid, x, y, target, &mut visited);
                    if region.len() >= self.config.min_region_size {
                        continue;
                    }

                    let replacement = self.dominant_exterior_type(grid, &region, target);
                    for &(rx, ry) in &region {
                        grid.set(rx, ry, replacement);
                    }
                    changed = true;
                }
            }
        }

        changed
    }

    /// 4-connected flood fill of `target`-typed cells starting at `(x, y)`,
    /// marking every member in `visited`
    fn connected_region(
        grid: &TileGrid,
        x: usize,
        y: usize,
        target: TileType,
        visited: &mut [bool],
    ) -> Vec<(usize, usize)> {
        let mut region = Vec::new();
        let mut queue = VecDeque::new();

        visited[y * grid.width + x] = true;
        queue.push_back((x, y));

        while let Some((cx, cy)) = queue.pop_front() {
            region.push((cx, cy));

            for (dx, dy) in NEIGHBORS_4 {
                let nx = cx as i32 + dx;
                let ny = cy as i32 + dy;
                if grid.in_bounds(nx, ny)
                    && grid.tile(nx as usize, ny as usize) == target
                    && !visited[ny as usize * grid.width + nx as usize]
                {
                    visited[ny as usize * grid.width + nx as usize] = true;
                    queue.push_back((nx as usize, ny as usize));
                }
            }
        }

        region
    }

    /// Most frequent type among the 8-neighborhood cells bordering `region`,
    /// never the region's own type (so reassignment always dissolves it).
    /// Falls back to the default type for regions with no differing neighbor.
    fn dominant_exterior_type(
        &self,
        grid: &TileGrid,
        region: &[(usize, usize)],
        region_type: TileType,
    ) -> TileType {
        let mut counts = [0usize; TileType::COUNT];

        for &(x, y) in region {
            for (dx, dy) in NEIGHBORS_8 {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if let Some(tile) = grid.get(nx, ny) {
                    // Exterior means outside the region; same-typed diagonal
                    // cells belong to a different region but cannot be the
                    // replacement either.
                    if tile != region_type {
                        counts[tile.index()] += 1;
                    }
                }
            }
        }

        if counts.iter().all(|&c| c == 0) {
            self.config.initial_tile
        } else {
            Self::dominant_type(&counts)
        }
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new()
    }
}
