//! Tile types and the static tile registry

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Side length of a tile in world units (pixels)
pub const TILE_SIZE: f32 = 64.0;

/// Overlap between adjacent tiles when placed, hides seams between sprites
pub const TILE_OVERLAP: f32 = 1.0;

/// Ground tile types
///
/// `Grass` is the base/fallback type: generation seeds from it and region
/// cleanup never removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileType {
    #[default]
    Grass = 0,
    Dirt = 1,
    Water = 2,
    Stone = 3,
    Sand = 4,
}

impl TileType {
    /// Number of tile types
    pub const COUNT: usize = 5;

    /// All tile types in index order
    pub const ALL: [TileType; Self::COUNT] = [
        TileType::Grass,
        TileType::Dirt,
        TileType::Water,
        TileType::Stone,
        TileType::Sand,
    ];

    /// Index into per-type tables (transition rows, survival bands, histograms)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<TileType> {
        Self::ALL.get(index).copied()
    }

    /// Whether entities can walk over this tile type
    pub fn is_walkable(self) -> bool {
        self.info().flags.contains(TileFlags::WALKABLE)
    }

    /// Whether projectiles pass over this tile type
    pub fn allows_projectiles(self) -> bool {
        self.info().flags.contains(TileFlags::PROJECTILE_PASSABLE)
    }

    /// Registry entry for this tile type
    pub fn info(self) -> &'static TileInfo {
        &TILE_REGISTRY[self.index()]
    }
}

bitflags! {
    /// Traversability flags for a tile type
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TileFlags: u8 {
        /// Entities can move across the tile
        const WALKABLE = 1 << 0;
        /// Projectiles fly over the tile
        const PROJECTILE_PASSABLE = 1 << 1;
    }
}

/// Static per-type tile data: visual key plus physics flags
#[derive(Debug, Clone, Copy)]
pub struct TileInfo {
    pub tile: TileType,
    /// Sprite sheet key used by the renderer
    pub sprite: &'static str,
    pub flags: TileFlags,
}

/// Registry indexed by `TileType::index()`
static TILE_REGISTRY: [TileInfo; TileType::COUNT] = [
    TileInfo {
        tile: TileType::Grass,
        sprite: "grass1",
        flags: TileFlags::WALKABLE.union(TileFlags::PROJECTILE_PASSABLE),
    },
    TileInfo {
        tile: TileType::Dirt,
        sprite: "dirty",
        flags: TileFlags::WALKABLE.union(TileFlags::PROJECTILE_PASSABLE),
    },
    TileInfo {
        tile: TileType::Water,
        sprite: "sea",
        flags: TileFlags::PROJECTILE_PASSABLE,
    },
    TileInfo {
        tile: TileType::Stone,
        sprite: "stone",
        flags: TileFlags::PROJECTILE_PASSABLE,
    },
    TileInfo {
        tile: TileType::Sand,
        sprite: "sand",
        flags: TileFlags::WALKABLE.union(TileFlags::PROJECTILE_PASSABLE),
    },
];
