//! Guardrail catalog: veto or annotate a proposed action before dispatch.
//!
//! Every rule is evaluated against every proposed action (no early exit).
//! `block`/`critical` severities stop the action; `warning` only annotates.

use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::state::{GameState, INVENTORY_CAPACITY};

/// Substrings that mark an item as too valuable to drop (and worth a warning
/// before selling). A heuristic, not a rarity flag: it will over- and
/// under-match until an item-metadata lookup exists.
pub const VALUABLE_KEYWORDS: [&str; 11] = [
    "rune", "dragon", "mystic", "amulet", "ring", "necklace", "ancient", "rare", "unique", "gold",
    "coin",
];

/// Warn when a target's level exceeds the player's combat level by this much.
const LEVEL_GAP_WARNING: u32 = 10;

/// Gather/pickup warning threshold (slots used, of 28).
const INVENTORY_WARNING_AT: u32 = 26;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Block,
    Critical,
}

impl Severity {
    pub fn halts(&self) -> bool {
        matches!(self, Severity::Block | Severity::Critical)
    }
}

/// Static safety rule. Trigger predicates are pure; messages are generated
/// from state only when the rule fires.
pub struct Guardrail {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub is_triggered: fn(&GameState, &Action) -> bool,
    pub message: fn(&GameState) -> String,
}

impl std::fmt::Debug for Guardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guardrail")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Outcome of running the full catalog against one proposed action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn is_valuable(item: &str) -> bool {
    let item = item.to_ascii_lowercase();
    VALUABLE_KEYWORDS.iter().any(|k| item.contains(k))
}

fn target_level(state: &GameState, action: &Action) -> Option<u32> {
    let id = action.target_ref()?;
    state.entities.get(id).map(|e| e.level)
}

static CATALOG: [Guardrail; 10] = [
    Guardrail {
        id: "no_low_health_combat",
        name: "No combat at low health",
        severity: Severity::Block,
        is_triggered: |state, action| action.is_combat() && state.health_fraction() < 0.25,
        message: |state| {
            format!(
                "Health too low to fight ({:.0}%)",
                state.health_fraction() * 100.0
            )
        },
    },
    Guardrail {
        id: "forced_flee",
        name: "Forced flee",
        // Fires on every action below 15% health so the urgency shows up in
        // every thought until the agent is safe; the flee goal itself is what
        // actually reroutes behavior, so this never gates an action.
        severity: Severity::Warning,
        is_triggered: |state, _| !state.player.is_dead && state.health_fraction() < 0.15,
        message: |state| {
            format!(
                "CRITICAL: health at {:.0}%, disengage now",
                state.health_fraction() * 100.0
            )
        },
    },
    Guardrail {
        id: "protect_valuables",
        name: "Protect valuable items",
        severity: Severity::Block,
        is_triggered: |_, action| {
            matches!(action, Action::DropItem(_))
                && action.item_ref().is_some_and(is_valuable)
        },
        message: |_| "Refusing to drop an item that looks valuable".to_string(),
    },
    Guardrail {
        id: "warn_sell_valuables",
        name: "Selling something valuable",
        severity: Severity::Warning,
        is_triggered: |_, action| {
            matches!(action, Action::SellItem(_))
                && action.item_ref().is_some_and(is_valuable)
        },
        message: |_| "About to sell an item that looks valuable".to_string(),
    },
    Guardrail {
        id: "high_level_target",
        name: "Target above our level",
        severity: Severity::Warning,
        is_triggered: |state, action| {
            action.is_combat()
                && target_level(state, action)
                    .is_some_and(|lvl| lvl > state.player.combat_level() + LEVEL_GAP_WARNING)
        },
        message: |state| {
            format!(
                "Target is more than {LEVEL_GAP_WARNING} levels above combat level {}",
                state.player.combat_level()
            )
        },
    },
    Guardrail {
        id: "no_multi_combat",
        name: "Already fighting something else",
        severity: Severity::Warning,
        // current_target is maintained ad hoc by the command layer and may be
        // stale after the old target dies; treated as advisory only.
        is_triggered: |state, action| {
            if let Action::Attack(args) = action
                && let Some(current) = state.current_target.as_deref()
            {
                return current != args.target_id;
            }
            false
        },
        message: |state| {
            format!(
                "Switching targets while still engaged with {}",
                state.current_target.as_deref().unwrap_or("?")
            )
        },
    },
    Guardrail {
        id: "inventory_full",
        name: "Inventory nearly full",
        severity: Severity::Warning,
        is_triggered: |state, action| {
            action.is_gather_or_pickup()
                && state.player.inventory.len() as u32
                    >= INVENTORY_WARNING_AT.min(INVENTORY_CAPACITY)
        },
        message: |state| {
            format!(
                "Only {} inventory slots left",
                state.player.free_slots()
            )
        },
    },
    Guardrail {
        id: "respect_dialogue",
        name: "Dialogue is open",
        severity: Severity::Block,
        is_triggered: |state, action| state.dialogue_open && !action.allowed_in_dialogue(),
        message: |_| "A dialogue is open; continue or close it first".to_string(),
    },
    Guardrail {
        id: "respect_bank",
        name: "Bank is open",
        severity: Severity::Block,
        is_triggered: |state, action| state.bank_open && !action.allowed_in_bank(),
        message: |_| "The bank is open; deposit or close it first".to_string(),
    },
    Guardrail {
        id: "respect_store",
        name: "Store is open",
        severity: Severity::Block,
        is_triggered: |state, action| state.store_open && !action.allowed_in_store(),
        message: |_| "A store is open; finish trading or close it first".to_string(),
    },
];

pub fn catalog() -> &'static [Guardrail] {
    &CATALOG
}

/// Run every rule against the proposed action and collect the outcome.
pub fn check(state: &GameState, action: &Action) -> Verdict {
    let mut verdict = Verdict {
        allowed: true,
        violations: Vec::new(),
        warnings: Vec::new(),
    };
    for rule in &CATALOG {
        if !(rule.is_triggered)(state, action) {
            continue;
        }
        let msg = format!("{}: {}", rule.name, (rule.message)(state));
        if rule.severity.halts() {
            verdict.allowed = false;
            verdict.violations.push(msg);
        } else {
            verdict.warnings.push(msg);
        }
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::action::{AttackArgs, ItemArgs, MoveToArgs, TargetArgs};
    use crate::agent::testkit::*;

    fn attack(target: &str) -> Action {
        Action::Attack(AttackArgs {
            target_id: target.into(),
            style: None,
        })
    }

    fn move_somewhere() -> Action {
        Action::MoveTo(MoveToArgs {
            x: 10.0,
            y: 0.0,
            z: 10.0,
            run: false,
        })
    }

    #[test]
    fn low_health_blocks_combat_but_not_movement() {
        let mut state = base_state();
        set_health_fraction(&mut state, 0.20);
        add_mob(&mut state, "mob_1", 2, true);

        let v = check(&state, &attack("mob_1"));
        assert!(!v.allowed);
        assert!(!v.violations.is_empty());

        let v = check(&state, &move_somewhere());
        assert!(v.allowed);
    }

    #[test]
    fn forced_flee_warns_but_never_blocks_on_its_own() {
        let mut state = base_state();
        set_health_fraction(&mut state, 0.12);

        let v = check(&state, &move_somewhere());
        assert!(v.allowed);
        assert!(v.warnings.iter().any(|w| w.contains("CRITICAL")));
    }

    #[test]
    fn valuable_drop_is_always_blocked() {
        let state = base_state();
        for item in ["rune_scimitar", "Dragon dagger", "GOLD necklace", "coin pouch"] {
            let v = check(
                &state,
                &Action::DropItem(ItemArgs {
                    item_id: item.into(),
                }),
            );
            assert!(!v.allowed, "{item} should not be droppable");
        }
        // Plain junk is fine.
        let v = check(
            &state,
            &Action::DropItem(ItemArgs {
                item_id: "burnt_fish".into(),
            }),
        );
        assert!(v.allowed);
    }

    #[test]
    fn selling_valuables_warns_without_blocking() {
        let state = base_state();
        let v = check(
            &state,
            &Action::SellItem(ItemArgs {
                item_id: "mystic_robe".into(),
            }),
        );
        assert!(v.allowed);
        assert!(v.warnings.iter().any(|w| w.contains("valuable")));
    }

    #[test]
    fn warnings_alone_never_force_a_block() {
        let mut state = base_state();
        // Trip three warning rules at once: high-level target, multi-combat,
        // near-full inventory is left out since the action is an attack.
        add_mob(&mut state, "boss", 30, true);
        state.current_target = Some("mob_other".into());

        let v = check(&state, &attack("boss"));
        assert!(v.allowed);
        assert!(v.warnings.len() >= 2);
        assert!(v.violations.is_empty());
    }

    #[test]
    fn multi_combat_warns_only_for_a_different_target() {
        let mut state = base_state();
        add_mob(&mut state, "mob_a", 2, true);
        state.current_target = Some("mob_a".into());

        let same = check(&state, &attack("mob_a"));
        assert!(same.warnings.is_empty());

        add_mob(&mut state, "mob_b", 2, true);
        let other = check(&state, &attack("mob_b"));
        assert!(other.allowed);
        assert!(other.warnings.iter().any(|w| w.contains("engaged")));
    }

    #[test]
    fn stale_current_target_still_warns() {
        // Known edge case: the command layer may not clear current_target
        // when the old target dies. The rule fires anyway; it is advisory.
        let mut state = base_state();
        state.current_target = Some("long_dead_mob".into());
        add_mob(&mut state, "mob_b", 2, true);

        let v = check(&state, &attack("mob_b"));
        assert!(v.allowed);
        assert_eq!(v.warnings.len(), 1);
    }

    #[test]
    fn near_full_inventory_warns_on_gather() {
        let mut state = base_state();
        fill_inventory(&mut state, 26);
        add_resource(&mut state, "tree_1", "Tree");

        let v = check(
            &state,
            &Action::GatherResource(TargetArgs {
                target_id: "tree_1".into(),
            }),
        );
        assert!(v.allowed);
        assert!(v.warnings.iter().any(|w| w.contains("slots")));
    }

    #[test]
    fn open_bank_blocks_everything_outside_its_allow_list() {
        let mut state = base_state();
        state.bank_open = true;

        assert!(!check(&state, &move_somewhere()).allowed);
        assert!(!check(&state, &attack("mob_1")).allowed);
        assert!(check(&state, &Action::DepositAll).allowed);
        assert!(check(&state, &Action::CloseBank).allowed);
    }

    #[test]
    fn open_dialogue_and_store_have_their_own_allow_lists() {
        let mut state = base_state();
        state.dialogue_open = true;
        assert!(!check(&state, &move_somewhere()).allowed);
        assert!(check(&state, &Action::ContinueDialogue).allowed);
        assert!(check(&state, &Action::CloseDialogue).allowed);
        state.dialogue_open = false;

        state.store_open = true;
        assert!(!check(&state, &move_somewhere()).allowed);
        assert!(check(&state, &Action::CloseStore).allowed);
        assert!(
            check(
                &state,
                &Action::SellItem(ItemArgs {
                    item_id: "burnt_fish".into()
                })
            )
            .allowed
        );
    }

    #[test]
    fn catalog_ids_are_unique() {
        for (i, a) in catalog().iter().enumerate() {
            for b in catalog().iter().skip(i + 1) {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
