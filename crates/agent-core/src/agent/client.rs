use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::state::Skill;

/// Boundary the agent uses to emit commands at the game server.
///
/// Every command is a one-way notification: the transport may fail, but there
/// is no success confirmation to await. The network client implements this.
pub trait GameCommands: Send + Sync {
    fn dispatch<'a>(
        &'a self,
        action: Action,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// State-change notifications delivered by the external client, out of band
/// with the tick cadence. Consumed by the session's own task so all counter
/// mutation stays single-writer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    XpGained { skill: Skill, amount: u64 },
    Death,
    Respawned,
    GatheringComplete,
    DamageDealt { amount: u32, killed: bool },
}
