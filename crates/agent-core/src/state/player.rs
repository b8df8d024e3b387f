use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::Vec3;

/// Fixed inventory capacity for this game (28 backpack slots).
pub const INVENTORY_CAPACITY: u32 = 28;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Attack,
    Strength,
    Defence,
    Hitpoints,
    Woodcutting,
    Mining,
    Fishing,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct SkillState {
    pub level: u32,
    pub xp: u64,
}

impl Default for SkillState {
    fn default() -> Self {
        Self { level: 1, xp: 0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

impl ItemSnapshot {
    /// Best-effort food heuristic over item names. The server exposes no
    /// edibility flag, so substring matching is the contract here.
    pub fn is_food(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        ["fish", "meat", "bread"].iter().any(|k| name.contains(k))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlayerSnapshot {
    pub health: u32,
    pub max_health: u32,
    pub position: Vec3,
    #[serde(default)]
    pub inventory: Vec<ItemSnapshot>,
    /// Equipped items keyed by slot name ("weapon", "shield", ...).
    #[serde(default)]
    pub equipment: BTreeMap<String, ItemSnapshot>,
    #[serde(default)]
    pub skills: BTreeMap<Skill, SkillState>,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub in_combat: bool,
    #[serde(default)]
    pub coins: u64,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            health: 10,
            max_health: 10,
            position: Vec3::default(),
            inventory: Vec::new(),
            equipment: BTreeMap::new(),
            skills: BTreeMap::new(),
            is_dead: false,
            in_combat: false,
            coins: 0,
        }
    }
}

impl PlayerSnapshot {
    pub fn health_fraction(&self) -> f32 {
        if self.max_health == 0 {
            return 0.0;
        }
        self.health as f32 / self.max_health as f32
    }

    pub fn skill_level(&self, skill: Skill) -> u32 {
        self.skills.get(&skill).map(|s| s.level).unwrap_or(1)
    }

    /// Average of attack/strength/defence/hitpoints levels, floored.
    pub fn combat_level(&self) -> u32 {
        let sum = self.skill_level(Skill::Attack)
            + self.skill_level(Skill::Strength)
            + self.skill_level(Skill::Defence)
            + self.skill_level(Skill::Hitpoints);
        sum / 4
    }

    pub fn free_slots(&self) -> u32 {
        INVENTORY_CAPACITY.saturating_sub(self.inventory.len() as u32)
    }

    pub fn has_weapon(&self) -> bool {
        self.equipment.contains_key("weapon")
    }

    pub fn first_food(&self) -> Option<&ItemSnapshot> {
        self.inventory.iter().find(|i| i.is_food())
    }
}
