//! Entity snapshots parked in inactive chunks
//!
//! When an enemy is despawned because its chunk went stale, enough state is
//! captured here to rebuild it later. The snapshot sits in the owning chunk's
//! cache until that chunk reactivates, then it is handed back to the
//! simulation exactly once.

use glam::{IVec2, Vec2};
use instant::Instant;

use super::EntityId;
use crate::world::Chunk;

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyClass {
    Basic,
    Runner,
    Tank,
    Bomber,
    Boss,
}

impl EnemyClass {
    /// Sprite sheet key used when the enemy is rebuilt
    pub fn sprite(self) -> &'static str {
        match self {
            EnemyClass::Basic => "enemy1",
            EnemyClass::Runner => "enemy2",
            EnemyClass::Tank => "enemy1",
            EnemyClass::Bomber => "enemy1",
            EnemyClass::Boss => "enemy1",
        }
    }
}

/// Immutable capture of a despawned enemy's simulation state
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub class: EnemyClass,
    pub position: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub radius: f32,
    pub score_value: u32,
    pub contact_damage: f32,
    /// Chunk the entity occupied when it was parked
    pub chunk: IVec2,
    pub spawned_at: Instant,
    pub despawned_at: Instant,
}

impl EntitySnapshot {
    /// Capture a despawning enemy. The owning chunk is derived from the
    /// position and the despawn time is stamped now.
    #[allow(clippy::too_many_arguments)]
    pub fn capture(
        class: EnemyClass,
        position: Vec2,
        health: f32,
        max_health: f32,
        speed: f32,
        radius: f32,
        score_value: u32,
        contact_damage: f32,
        spawned_at: Instant,
    ) -> Self {
        Self {
            id: EntityId::new(),
            class,
            position,
            health,
            max_health,
            speed,
            radius,
            score_value,
            contact_damage,
            chunk: Chunk::world_to_chunk(position),
            spawned_at,
            despawned_at: Instant::now(),
        }
    }

    pub fn sprite(&self) -> &'static str {
        self.class.sprite()
    }
}
