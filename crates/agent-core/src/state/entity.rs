use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn dist(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mob,
    Resource,
    GroundItem,
    Npc,
    Player,
}

/// Snapshot of one nearby entity, keyed by its server id in [`super::GameState::entities`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub name: String,
    pub position: Vec3,
    #[serde(default)]
    pub health: u32,
    #[serde(default)]
    pub level: u32,
    pub alive: bool,
}

impl EntitySnapshot {
    pub fn is_living_mob(&self) -> bool {
        self.kind == EntityKind::Mob && self.alive
    }
}
