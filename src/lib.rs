//! # Gridfall - chunk-streamed world for a 2D top-down shooter
//!
//! Partitions an unbounded 2D world into fixed-size chunks, generates tile
//! terrain through a seeded procedural pipeline, streams chunks in and out of
//! an active working set around a moving observer, and preserves despawned
//! entity state across chunk deactivation cycles.
//!
//! The usual wiring:
//!
//! 1. Build a [`world::WorldLevel`] for the viewport (it generates the tile
//!    grid and derives the tile colliders).
//! 2. Create a [`world::ChunkManager`], optionally backed by a
//!    [`world::ChunkLoader`] fed from [`world::WorldLevel::chunk_source`],
//!    and route the level's colliders into it.
//! 3. Once per simulation tick, call
//!    [`world::ChunkManager::update_active_set`] with the observer position
//!    and velocity, respawn the entities it returns, and collide against
//!    [`world::ChunkManager::active_chunk_colliders`].

pub mod collision;
pub mod entity;
pub mod world;
