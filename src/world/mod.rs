//! World management - terrain generation, chunks, streaming

mod chunk;
mod chunk_loader;
mod chunk_manager;
pub mod gen_config;
pub mod generation;
mod level;
pub mod tile;

pub use chunk::{CHUNK_SIZE, Chunk, chunk_span};
pub use chunk_loader::{
    ChunkLoader, ChunkSource, DEFAULT_POLL_INTERVAL, EmptyChunkSource, LoadRequest,
};
pub use chunk_manager::{
    ACTIVATION_DISTANCE, ChunkManager, ChunkRestore, DEFAULT_PRELOAD_DISTANCE,
};
pub use gen_config::{ConfigError, GenerationConfig, SurvivalBand, TransitionRow};
pub use generation::{TerrainGenerator, TileGrid};
pub use level::{TerrainChunkSource, WorldLevel};
pub use tile::{TILE_OVERLAP, TILE_SIZE, TileFlags, TileInfo, TileType};
