//! Proposed actions and their wire form.
//!
//! An [`Action`] is a tool id plus typed parameters, not yet vetted or
//! dispatched. The wire form is `{"tool": <name>, "params": {...}}` with
//! camelCase parameter keys, matching what the hosting tool layer speaks.

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveToArgs {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub run: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttackArgs {
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetArgs {
    pub target_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemArgs {
    pub item_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractNpcArgs {
    pub target_id: String,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum Action {
    MoveTo(MoveToArgs),
    Attack(AttackArgs),
    GatherResource(TargetArgs),
    PickUp(TargetArgs),
    UseItem(ItemArgs),
    DropItem(ItemArgs),
    SellItem(ItemArgs),
    Respawn,
    TeleportHome,
    InteractNpc(InteractNpcArgs),
    DepositAll,
    CloseBank,
    CloseStore,
    ContinueDialogue,
    CloseDialogue,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::MoveTo(_) => "move_to",
            Action::Attack(_) => "attack",
            Action::GatherResource(_) => "gather_resource",
            Action::PickUp(_) => "pick_up",
            Action::UseItem(_) => "use_item",
            Action::DropItem(_) => "drop_item",
            Action::SellItem(_) => "sell_item",
            Action::Respawn => "respawn",
            Action::TeleportHome => "teleport_home",
            Action::InteractNpc(_) => "interact_npc",
            Action::DepositAll => "deposit_all",
            Action::CloseBank => "close_bank",
            Action::CloseStore => "close_store",
            Action::ContinueDialogue => "continue_dialogue",
            Action::CloseDialogue => "close_dialogue",
        }
    }

    /// `{"tool": <name>, "params": {...}}` as recorded in the thought log.
    pub fn to_wire(&self) -> serde_json::Value {
        let params = match self {
            Action::MoveTo(a) => serde_json::to_value(a).unwrap_or(json!({})),
            Action::Attack(a) => serde_json::to_value(a).unwrap_or(json!({})),
            Action::GatherResource(a) | Action::PickUp(a) => {
                serde_json::to_value(a).unwrap_or(json!({}))
            }
            Action::UseItem(a) | Action::DropItem(a) | Action::SellItem(a) => {
                serde_json::to_value(a).unwrap_or(json!({}))
            }
            Action::InteractNpc(a) => serde_json::to_value(a).unwrap_or(json!({})),
            _ => json!({}),
        };
        json!({ "tool": self.name(), "params": params })
    }

    /// True for actions that initiate combat.
    pub fn is_combat(&self) -> bool {
        matches!(self, Action::Attack(_))
    }

    /// True for actions that add items to the inventory.
    pub fn is_gather_or_pickup(&self) -> bool {
        matches!(self, Action::GatherResource(_) | Action::PickUp(_))
    }

    pub fn allowed_in_dialogue(&self) -> bool {
        matches!(self, Action::ContinueDialogue | Action::CloseDialogue)
    }

    pub fn allowed_in_bank(&self) -> bool {
        matches!(self, Action::DepositAll | Action::CloseBank)
    }

    pub fn allowed_in_store(&self) -> bool {
        matches!(self, Action::SellItem(_) | Action::CloseStore)
    }

    /// Item id/name the action touches, for valuable-item checks.
    pub fn item_ref(&self) -> Option<&str> {
        match self {
            Action::UseItem(a) | Action::DropItem(a) | Action::SellItem(a) => Some(&a.item_id),
            _ => None,
        }
    }

    /// Target id the action is aimed at, if any.
    pub fn target_ref(&self) -> Option<&str> {
        match self {
            Action::Attack(a) => Some(&a.target_id),
            Action::GatherResource(a) | Action::PickUp(a) => Some(&a.target_id),
            Action::InteractNpc(a) => Some(&a.target_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_wire_shape_uses_camel_case_target_id() {
        let action = Action::Attack(AttackArgs {
            target_id: "mob_7".into(),
            style: None,
        });
        let wire = action.to_wire();
        assert_eq!(wire["tool"], "attack");
        assert_eq!(wire["params"]["targetId"], "mob_7");
        assert!(wire["params"].get("style").is_none());
    }

    #[test]
    fn parameterless_actions_serialize_empty_params() {
        let wire = Action::Respawn.to_wire();
        assert_eq!(wire["tool"], "respawn");
        assert_eq!(wire["params"], json!({}));
    }

    #[test]
    fn ui_allow_lists_are_disjoint_from_world_actions() {
        let attack = Action::Attack(AttackArgs {
            target_id: "mob_1".into(),
            style: None,
        });
        assert!(!attack.allowed_in_bank());
        assert!(!attack.allowed_in_dialogue());
        assert!(!attack.allowed_in_store());
        assert!(Action::DepositAll.allowed_in_bank());
        assert!(Action::ContinueDialogue.allowed_in_dialogue());
        assert!(Action::CloseStore.allowed_in_store());
    }
}
