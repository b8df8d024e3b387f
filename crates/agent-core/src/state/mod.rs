//! Read-only view of the live game world.
//!
//! The external network client owns and mutates this state in response to
//! server packets; the agent core only ever reads a snapshot of it at the top
//! of each tick. Entities live in a `BTreeMap` so "first nearby" lookups are
//! deterministic.

pub mod entity;
pub mod player;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

pub use entity::{EntityKind, EntitySnapshot, Vec3};
pub use player::{INVENTORY_CAPACITY, ItemSnapshot, PlayerSnapshot, Skill, SkillState};

/// Shared handle used by both the network client (writer) and the agent
/// session (reader).
pub type SharedState = Arc<RwLock<GameState>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub connected: bool,
    pub player: PlayerSnapshot,
    pub entities: BTreeMap<String, EntitySnapshot>,
    pub bank_open: bool,
    pub dialogue_open: bool,
    pub store_open: bool,
    /// Target id maintained ad hoc by the command layer; may be stale after
    /// the target dies or despawns. Treated as advisory only.
    pub current_target: Option<String>,
}

impl GameState {
    pub fn health_fraction(&self) -> f32 {
        self.player.health_fraction()
    }

    pub fn living_mobs(&self) -> impl Iterator<Item = (&String, &EntitySnapshot)> {
        self.entities.iter().filter(|(_, e)| e.is_living_mob())
    }

    pub fn resources(&self) -> impl Iterator<Item = (&String, &EntitySnapshot)> {
        self.entities
            .iter()
            .filter(|(_, e)| e.kind == EntityKind::Resource)
    }

    pub fn ground_items(&self) -> impl Iterator<Item = (&String, &EntitySnapshot)> {
        self.entities
            .iter()
            .filter(|(_, e)| e.kind == EntityKind::GroundItem)
    }

    /// First nearby entity whose name contains "bank" (booth, chest, banker).
    pub fn bank_entity(&self) -> Option<(&String, &EntitySnapshot)> {
        self.entities
            .iter()
            .find(|(_, e)| e.name.to_ascii_lowercase().contains("bank"))
    }

    /// Lowest-level living mob, ties broken by entity-id order.
    pub fn weakest_mob(&self) -> Option<(&String, &EntitySnapshot)> {
        self.living_mobs().min_by_key(|(id, e)| (e.level, id.clone()))
    }
}
