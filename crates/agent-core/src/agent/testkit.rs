//! Shared fixtures for agent tests.

use crate::state::{
    EntityKind, EntitySnapshot, GameState, ItemSnapshot, Skill, SkillState, Vec3,
};

/// Connected, healthy level-10 player with a weapon and an empty world.
pub fn base_state() -> GameState {
    let mut state = GameState::default();
    state.connected = true;
    state.player.health = 100;
    state.player.max_health = 100;
    for skill in [
        Skill::Attack,
        Skill::Strength,
        Skill::Defence,
        Skill::Hitpoints,
    ] {
        state.player.skills.insert(skill, SkillState { level: 10, xp: 0 });
    }
    state.player.equipment.insert(
        "weapon".into(),
        ItemSnapshot {
            id: "bronze_sword".into(),
            name: "Bronze sword".into(),
            quantity: 1,
        },
    );
    state
}

pub fn set_health_fraction(state: &mut GameState, frac: f32) {
    state.player.max_health = 100;
    state.player.health = (frac * 100.0).round() as u32;
}

pub fn add_mob(state: &mut GameState, id: &str, level: u32, alive: bool) {
    state.entities.insert(
        id.into(),
        EntitySnapshot {
            kind: EntityKind::Mob,
            name: "Goblin".into(),
            position: Vec3 { x: 5.0, y: 0.0, z: 5.0 },
            health: 10,
            level,
            alive,
        },
    );
}

pub fn add_resource(state: &mut GameState, id: &str, name: &str) {
    state.entities.insert(
        id.into(),
        EntitySnapshot {
            kind: EntityKind::Resource,
            name: name.into(),
            position: Vec3 { x: 3.0, y: 0.0, z: 3.0 },
            health: 0,
            level: 0,
            alive: true,
        },
    );
}

pub fn add_ground_item(state: &mut GameState, id: &str, name: &str) {
    state.entities.insert(
        id.into(),
        EntitySnapshot {
            kind: EntityKind::GroundItem,
            name: name.into(),
            position: Vec3 { x: 1.0, y: 0.0, z: 1.0 },
            health: 0,
            level: 0,
            alive: true,
        },
    );
}

pub fn add_bank_booth(state: &mut GameState, id: &str) {
    state.entities.insert(
        id.into(),
        EntitySnapshot {
            kind: EntityKind::Npc,
            name: "Bank booth".into(),
            position: Vec3 { x: 8.0, y: 0.0, z: 8.0 },
            health: 0,
            level: 0,
            alive: true,
        },
    );
}

pub fn add_food(state: &mut GameState, id: &str) {
    state.player.inventory.push(ItemSnapshot {
        id: id.into(),
        name: "Cooked fish".into(),
        quantity: 1,
    });
}

pub fn fill_inventory(state: &mut GameState, slots: usize) {
    state.player.inventory.clear();
    for i in 0..slots {
        state.player.inventory.push(ItemSnapshot {
            id: format!("junk_{i}"),
            name: "Logs".into(),
            quantity: 1,
        });
    }
}
