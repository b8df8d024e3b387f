//! Goal catalog: what the agent should be trying to do.
//!
//! Each goal is a plain record of fn pointers (applicability gate, scorer,
//! completion check, prompt), kept in a fixed ordered catalog. Selection
//! filters by `is_possible`, scores the rest, and takes the top entry; ties
//! fall back to catalog order via stable sort.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::{GameState, Skill};

/// Score deduction per recent completion of the same goal, and its cap.
const DIVERSITY_STEP: f32 = 15.0;
const DIVERSITY_CAP: f32 = 45.0;

/// Deduction applied while a goal's category completed within the last 60 s.
const RECENCY_PENALTY: f32 = 10.0;
const RECENCY_WINDOW: Duration = Duration::from_secs(60);

/// Bounded most-recent-first history of completed goal ids.
const RECENT_GOALS_CAP: usize = 10;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalId {
    Respawn,
    FleeDanger,
    EatFood,
    TrainCombat,
    GatherResources,
    CollectLoot,
    BankItems,
    ExploreArea,
}

impl GoalId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalId::Respawn => "respawn",
            GoalId::FleeDanger => "flee_danger",
            GoalId::EatFood => "eat_food",
            GoalId::TrainCombat => "train_combat",
            GoalId::GatherResources => "gather_resources",
            GoalId::CollectLoot => "collect_loot",
            GoalId::BankItems => "bank_items",
            GoalId::ExploreArea => "explore_area",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalCategory {
    Combat,
    Skilling,
    Gathering,
    Exploration,
    Social,
    Survival,
}

/// Static behavior template. Instances live in [`catalog`]; ids are unique.
pub struct GoalTemplate {
    pub id: GoalId,
    pub name: &'static str,
    pub category: GoalCategory,
    pub is_possible: fn(&GameState) -> bool,
    pub score: fn(&GameState, &GoalContext) -> f32,
    pub is_complete: fn(&GameState, &GoalProgress) -> bool,
    pub prompt: fn(&GameState) -> String,
}

impl std::fmt::Debug for GoalTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalTemplate")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish()
    }
}

/// Session-lived scoring context, mutated only by the decision loop.
#[derive(Debug, Clone)]
pub struct GoalContext {
    recent_goals: VecDeque<GoalId>,
    completions: HashMap<GoalId, u32>,
    pub time_since_combat: Duration,
    pub time_since_skilling: Duration,
    pub session_duration: Duration,
    pub xp_gained: BTreeMap<Skill, u64>,
}

impl Default for GoalContext {
    fn default() -> Self {
        Self {
            recent_goals: VecDeque::new(),
            completions: HashMap::new(),
            // Start well outside the recency window so nothing is penalized
            // before it has ever completed.
            time_since_combat: Duration::from_secs(3600),
            time_since_skilling: Duration::from_secs(3600),
            session_duration: Duration::ZERO,
            xp_gained: BTreeMap::new(),
        }
    }
}

impl GoalContext {
    pub fn advance(&mut self, dt: Duration) {
        self.session_duration = self.session_duration.saturating_add(dt);
        self.time_since_combat = self.time_since_combat.saturating_add(dt);
        self.time_since_skilling = self.time_since_skilling.saturating_add(dt);
    }

    /// Fold a completed goal into the diversity/recency bookkeeping.
    pub fn note_completion(&mut self, id: GoalId, category: GoalCategory) {
        self.recent_goals.push_front(id);
        self.recent_goals.truncate(RECENT_GOALS_CAP);
        *self.completions.entry(id).or_insert(0) += 1;
        match category {
            GoalCategory::Combat => self.time_since_combat = Duration::ZERO,
            GoalCategory::Skilling | GoalCategory::Gathering => {
                self.time_since_skilling = Duration::ZERO
            }
            _ => {}
        }
    }

    pub fn note_xp(&mut self, skill: Skill, amount: u64) {
        *self.xp_gained.entry(skill).or_insert(0) += amount;
    }

    pub fn recent_goals(&self) -> &VecDeque<GoalId> {
        &self.recent_goals
    }

    pub fn completion_count(&self, id: GoalId) -> u32 {
        self.completions.get(&id).copied().unwrap_or(0)
    }

    pub fn diversity_penalty(&self, id: GoalId) -> f32 {
        (self.completion_count(id) as f32 * DIVERSITY_STEP).min(DIVERSITY_CAP)
    }

    pub fn recency_penalty(&self, category: GoalCategory) -> f32 {
        let since = match category {
            GoalCategory::Combat => self.time_since_combat,
            GoalCategory::Skilling | GoalCategory::Gathering => self.time_since_skilling,
            _ => return 0.0,
        };
        if since < RECENCY_WINDOW { RECENCY_PENALTY } else { 0.0 }
    }
}

/// Per-active-goal counters, fed by state-change events while the goal runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalProgress {
    pub goal: Option<GoalId>,
    /// Time this goal has been active, advanced once per tick.
    pub elapsed: Duration,
    pub kills: u32,
    pub gathered: u32,
    pub xp: u64,
    pub items_collected: u32,
}

impl GoalProgress {
    pub fn new(goal: GoalId) -> Self {
        Self {
            goal: Some(goal),
            ..Self::default()
        }
    }
}

/// The active goal and its progress travel together so they can never be
/// inconsistent with each other.
#[derive(Debug)]
pub struct ActiveGoal {
    pub template: &'static GoalTemplate,
    pub progress: GoalProgress,
}

impl ActiveGoal {
    pub fn new(template: &'static GoalTemplate) -> Self {
        Self {
            template,
            progress: GoalProgress::new(template.id),
        }
    }
}

fn scored(base: f32, bonus: f32, id: GoalId, category: GoalCategory, ctx: &GoalContext) -> f32 {
    (base + bonus - ctx.diversity_penalty(id) - ctx.recency_penalty(category)).max(0.0)
}

fn no_ui_open(state: &GameState) -> bool {
    !state.bank_open && !state.dialogue_open && !state.store_open
}

static CATALOG: [GoalTemplate; 8] = [
    GoalTemplate {
        id: GoalId::Respawn,
        name: "Respawn",
        category: GoalCategory::Survival,
        is_possible: |state| state.player.is_dead,
        // Absolute priority: death preempts everything.
        score: |_, _| 100.0,
        is_complete: |state, _| !state.player.is_dead,
        prompt: |_| "You are dead. Respawn and regroup.".to_string(),
    },
    GoalTemplate {
        id: GoalId::FleeDanger,
        name: "Flee danger",
        category: GoalCategory::Survival,
        is_possible: |state| !state.player.is_dead && state.health_fraction() < 0.25,
        // Tiered by how close to death we are; always beats ordinary goals.
        score: |state, _| {
            let hp = state.health_fraction();
            if hp < 0.10 {
                100.0
            } else if hp < 0.15 {
                95.0
            } else if hp < 0.20 {
                90.0
            } else {
                85.0
            }
        },
        is_complete: |state, _| state.health_fraction() > 0.5,
        prompt: |state| {
            format!(
                "Health critical ({:.0}%). Get to safety before anything else.",
                state.health_fraction() * 100.0
            )
        },
    },
    GoalTemplate {
        id: GoalId::EatFood,
        name: "Eat food",
        category: GoalCategory::Survival,
        is_possible: |state| {
            !state.player.is_dead
                && state.health_fraction() < 0.7
                && state.player.first_food().is_some()
        },
        // Scales toward 80 as health drops; flee always outranks it below 25%.
        score: |state, ctx| {
            let bonus = (1.0 - state.health_fraction()) * 40.0;
            scored(40.0, bonus, GoalId::EatFood, GoalCategory::Survival, ctx)
        },
        is_complete: |state, _| {
            state.health_fraction() > 0.8 || state.player.first_food().is_none()
        },
        prompt: |_| "Eat something from the inventory to recover health.".to_string(),
    },
    GoalTemplate {
        id: GoalId::TrainCombat,
        name: "Train combat",
        category: GoalCategory::Combat,
        is_possible: |state| {
            !state.player.is_dead
                && state.player.has_weapon()
                && state.health_fraction() > 0.40
                && state.living_mobs().next().is_some()
        },
        score: |state, ctx| {
            let player_level = state.player.combat_level();
            let easy_mobs = state
                .living_mobs()
                .filter(|(_, e)| e.level <= player_level)
                .count();
            let bonus = if easy_mobs > 3 { 15.0 } else { 0.0 };
            scored(50.0, bonus, GoalId::TrainCombat, GoalCategory::Combat, ctx)
        },
        is_complete: |_, progress| {
            progress.kills >= 5 || progress.elapsed >= Duration::from_secs(300)
        },
        prompt: |_| "Fight nearby low-level mobs to train combat skills.".to_string(),
    },
    GoalTemplate {
        id: GoalId::GatherResources,
        name: "Gather resources",
        category: GoalCategory::Gathering,
        is_possible: |state| {
            !state.player.is_dead
                && state.resources().next().is_some()
                && state.player.free_slots() > 0
        },
        score: |_, ctx| scored(45.0, 0.0, GoalId::GatherResources, GoalCategory::Gathering, ctx),
        is_complete: |state, progress| {
            progress.gathered >= 10
                || progress.elapsed >= Duration::from_secs(300)
                || state.player.free_slots() == 0
        },
        prompt: |_| "Work a nearby resource (tree, rock, fishing spot).".to_string(),
    },
    GoalTemplate {
        id: GoalId::CollectLoot,
        name: "Collect loot",
        category: GoalCategory::Gathering,
        is_possible: |state| {
            !state.player.is_dead
                && state.ground_items().next().is_some()
                && state.player.free_slots() > 0
        },
        score: |state, ctx| {
            let bonus = if state.ground_items().count() > 5 { 20.0 } else { 0.0 };
            scored(40.0, bonus, GoalId::CollectLoot, GoalCategory::Gathering, ctx)
        },
        is_complete: |state, progress| {
            progress.items_collected >= 5
                || progress.elapsed >= Duration::from_secs(120)
                || state.player.free_slots() == 0
        },
        prompt: |_| "Pick up dropped items lying nearby.".to_string(),
    },
    GoalTemplate {
        id: GoalId::BankItems,
        name: "Bank items",
        category: GoalCategory::Skilling,
        is_possible: |state| {
            !state.player.is_dead
                && state.player.free_slots() < 5
                && state.bank_entity().is_some()
        },
        score: |_, ctx| scored(75.0, 0.0, GoalId::BankItems, GoalCategory::Skilling, ctx),
        is_complete: |state, progress| {
            state.player.free_slots() > 10 || progress.elapsed >= Duration::from_secs(120)
        },
        prompt: |_| "Inventory is nearly full. Deposit everything at the bank.".to_string(),
    },
    GoalTemplate {
        id: GoalId::ExploreArea,
        name: "Explore the area",
        category: GoalCategory::Exploration,
        // Wandering is pointless (and blocked anyway) while a UI is open.
        is_possible: |state| !state.player.is_dead && no_ui_open(state),
        score: |_, ctx| scored(20.0, 0.0, GoalId::ExploreArea, GoalCategory::Exploration, ctx),
        is_complete: |_, progress| progress.elapsed >= Duration::from_secs(120),
        prompt: |_| "Nothing urgent. Wander and see what is around.".to_string(),
    },
];

pub fn catalog() -> &'static [GoalTemplate] {
    &CATALOG
}

pub fn template(id: GoalId) -> &'static GoalTemplate {
    CATALOG
        .iter()
        .find(|t| t.id == id)
        .expect("every GoalId has a catalog entry")
}

/// Pick the highest-scoring possible goal, or `None` when nothing applies.
pub fn select_goal(state: &GameState, ctx: &GoalContext) -> Option<&'static GoalTemplate> {
    let mut candidates: Vec<(&'static GoalTemplate, f32)> = CATALOG
        .iter()
        .filter(|t| (t.is_possible)(state))
        .map(|t| (t, (t.score)(state, ctx)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    // Stable sort keeps catalog order on score ties.
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Some(candidates[0].0)
}
