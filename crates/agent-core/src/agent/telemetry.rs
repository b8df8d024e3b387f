//! Session telemetry: passive counters plus the rolling thought log.
//!
//! Counters are plain commutative increments driven by external state-change
//! events; the thought log is appended once per tick by the decision loop.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::client::GameEvent;
use crate::state::Skill;

/// Thought entries beyond this are discarded oldest-first.
pub const THOUGHT_LOG_CAP: usize = 50;

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One tick's reasoning record.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentThought {
    pub at_ms: u64,
    pub reasoning: String,
    /// Wire form of the dispatched action, if any (`{"tool", "params"}`).
    #[serde(default)]
    pub action: Option<serde_json::Value>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AgentThought {
    pub fn new(reasoning: impl Into<String>) -> Self {
        Self {
            at_ms: unix_ms(),
            reasoning: reasoning.into(),
            action: None,
            goal: None,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentStats {
    pub started_at_ms: u64,
    pub ticks: u64,
    pub goals_completed: u32,
    pub mobs_killed: u32,
    pub resources_gathered: u32,
    pub deaths: u32,
    pub xp_by_skill: BTreeMap<Skill, u64>,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            started_at_ms: unix_ms(),
            ticks: 0,
            goals_completed: 0,
            mobs_killed: 0,
            resources_gathered: 0,
            deaths: 0,
            xp_by_skill: BTreeMap::new(),
        }
    }
}

impl AgentStats {
    pub fn total_xp(&self) -> u64 {
        self.xp_by_skill.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionTelemetry {
    pub stats: AgentStats,
    thoughts: VecDeque<AgentThought>,
}

impl SessionTelemetry {
    pub fn apply_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::XpGained { skill, amount } => {
                *self.stats.xp_by_skill.entry(*skill).or_insert(0) += amount;
            }
            GameEvent::Death => self.stats.deaths += 1,
            GameEvent::Respawned => {}
            GameEvent::GatheringComplete => self.stats.resources_gathered += 1,
            GameEvent::DamageDealt { killed, .. } => {
                if *killed {
                    self.stats.mobs_killed += 1;
                }
            }
        }
    }

    pub fn push_thought(&mut self, thought: AgentThought) {
        self.thoughts.push_back(thought);
        while self.thoughts.len() > THOUGHT_LOG_CAP {
            self.thoughts.pop_front();
        }
    }

    /// Most recent `limit` thoughts in chronological order.
    pub fn recent_thoughts(&self, limit: usize) -> Vec<AgentThought> {
        let skip = self.thoughts.len().saturating_sub(limit);
        self.thoughts.iter().skip(skip).cloned().collect()
    }

    pub fn thought_count(&self) -> usize {
        self.thoughts.len()
    }

    /// Human-readable end-of-session summary.
    pub fn summary(&self, session_duration: Duration) -> String {
        format!(
            "session over: {:.1} min, {} goals completed, {} mobs killed, {} resources gathered, {} xp, {} deaths",
            session_duration.as_secs_f64() / 60.0,
            self.stats.goals_completed,
            self.stats.mobs_killed,
            self.stats.resources_gathered,
            self.stats.total_xp(),
            self.stats.deaths,
        )
    }
}
