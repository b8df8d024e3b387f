//! Demo harness: runs the agent against a simulated game client.
//!
//! The simulator stands in for the real network client: it owns the shared
//! [`GameState`], mutates it in response to dispatched actions, and feeds
//! state-change events back through the session's event channel. Useful for
//! watching the decision loop end to end without a server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing_subscriber::EnvFilter;

use mmo_agent_core::agent::client::{GameCommands, GameEvent};
use mmo_agent_core::agent::session::{AgentConfig, AgentSession, LogSink};
use mmo_agent_core::agent::Action;
use mmo_agent_core::state::{
    EntityKind, EntitySnapshot, GameState, ItemSnapshot, SharedState, Skill, Vec3,
};

/// Fake network client. Applies each dispatched action to the shared state
/// roughly the way the real server would, then reports the side effects as
/// events.
struct SimulatedClient {
    state: SharedState,
    events: Mutex<Option<mpsc::UnboundedSender<GameEvent>>>,
}

impl SimulatedClient {
    fn new(state: SharedState) -> Self {
        Self {
            state,
            events: Mutex::new(None),
        }
    }

    async fn wire_events(&self, tx: mpsc::UnboundedSender<GameEvent>) {
        *self.events.lock().await = Some(tx);
    }

    async fn emit(&self, event: GameEvent) {
        if let Some(tx) = self.events.lock().await.as_ref() {
            let _ = tx.send(event);
        }
    }

    async fn apply(&self, action: &Action) {
        match action {
            Action::MoveTo(args) => {
                let mut state = self.state.write().await;
                state.player.position = Vec3 {
                    x: args.x,
                    y: args.y,
                    z: args.z,
                };
            }
            Action::Attack(args) => {
                let (damage, killed) = {
                    let mut state = self.state.write().await;
                    let damage: u32 = rand::thread_rng().gen_range(1..=4);
                    state.current_target = Some(args.target_id.clone());
                    let Some(mob) = state.entities.get_mut(&args.target_id) else {
                        return;
                    };
                    mob.health = mob.health.saturating_sub(damage);
                    let killed = mob.health == 0;
                    if killed {
                        mob.alive = false;
                        state.current_target = None;
                    }
                    (damage, killed)
                };
                self.emit(GameEvent::DamageDealt {
                    amount: damage,
                    killed,
                })
                .await;
                if killed {
                    self.emit(GameEvent::XpGained {
                        skill: Skill::Attack,
                        amount: 40,
                    })
                    .await;
                }
            }
            Action::GatherResource(args) => {
                {
                    let mut state = self.state.write().await;
                    if !state.entities.contains_key(&args.target_id) {
                        return;
                    }
                    let logs = ItemSnapshot {
                        id: "logs".into(),
                        name: "Logs".into(),
                        quantity: 1,
                    };
                    state.player.inventory.push(logs);
                }
                self.emit(GameEvent::GatheringComplete).await;
                self.emit(GameEvent::XpGained {
                    skill: Skill::Woodcutting,
                    amount: 25,
                })
                .await;
            }
            Action::PickUp(args) => {
                let mut state = self.state.write().await;
                if let Some(item) = state.entities.remove(&args.target_id) {
                    state.player.inventory.push(ItemSnapshot {
                        id: args.target_id.clone(),
                        name: item.name,
                        quantity: 1,
                    });
                }
            }
            Action::UseItem(args) => {
                let mut state = self.state.write().await;
                if let Some(idx) = state
                    .player
                    .inventory
                    .iter()
                    .position(|i| i.id == args.item_id)
                {
                    state.player.inventory.remove(idx);
                    state.player.health =
                        (state.player.health + 8).min(state.player.max_health);
                }
            }
            Action::Respawn => {
                let mut state = self.state.write().await;
                state.player.is_dead = false;
                state.player.health = state.player.max_health;
                self.emit_locked(GameEvent::Respawned);
            }
            Action::TeleportHome => {
                let mut state = self.state.write().await;
                state.player.position = Vec3::default();
                state.player.in_combat = false;
                state.current_target = None;
            }
            Action::InteractNpc(args) => {
                let mut state = self.state.write().await;
                if args.action == "bank" {
                    state.bank_open = true;
                }
            }
            Action::DepositAll => {
                let mut state = self.state.write().await;
                state.player.inventory.clear();
            }
            Action::CloseBank => self.state.write().await.bank_open = false,
            Action::CloseStore => self.state.write().await.store_open = false,
            Action::ContinueDialogue | Action::CloseDialogue => {
                self.state.write().await.dialogue_open = false;
            }
            Action::DropItem(_) | Action::SellItem(_) => {}
        }
    }

    fn emit_locked(&self, event: GameEvent) {
        // Best effort from inside a write section; the channel is unbounded
        // so try_lock only fails if wiring is in progress.
        if let Ok(guard) = self.events.try_lock()
            && let Some(tx) = guard.as_ref()
        {
            let _ = tx.send(event);
        }
    }
}

impl GameCommands for SimulatedClient {
    fn dispatch<'a>(
        &'a self,
        action: Action,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(tool = action.name(), "sim.dispatch");
            self.apply(&action).await;
            Ok(())
        })
    }
}

/// A small woodland clearing: a few goblins, trees, and a bank booth.
fn demo_world() -> GameState {
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
        state.player.skills.entry(skill).or_default().level = 10;
    }
    state.player.equipment.insert(
        "weapon".into(),
        ItemSnapshot {
            id: "bronze_sword".into(),
            name: "Bronze sword".into(),
            quantity: 1,
        },
    );

    for (id, name, level) in [
        ("mob_goblin_1", "Goblin", 3),
        ("mob_goblin_2", "Goblin", 4),
        ("mob_rat_1", "Giant rat", 2),
    ] {
        state.entities.insert(
            id.into(),
            EntitySnapshot {
                kind: EntityKind::Mob,
                name: name.into(),
                position: Vec3 {
                    x: 12.0,
                    y: 0.0,
                    z: 8.0,
                },
                health: 10,
                level,
                alive: true,
            },
        );
    }
    for (id, name) in [("res_tree_1", "Tree"), ("res_tree_2", "Oak tree")] {
        state.entities.insert(
            id.into(),
            EntitySnapshot {
                kind: EntityKind::Resource,
                name: name.into(),
                position: Vec3 {
                    x: -15.0,
                    y: 0.0,
                    z: 20.0,
                },
                health: 0,
                level: 0,
                alive: true,
            },
        );
    }
    state.entities.insert(
        "npc_banker".into(),
        EntitySnapshot {
            kind: EntityKind::Npc,
            name: "Bank booth".into(),
            position: Vec3 {
                x: 30.0,
                y: 0.0,
                z: -5.0,
            },
            health: 0,
            level: 0,
            alive: true,
        },
    );
    state
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tick_ms = env_u64("MMO_AGENT_TICK_MS", 1000);
    let session_secs = env_u64("MMO_AGENT_SESSION_SECS", 30);

    let state: SharedState = Arc::new(RwLock::new(demo_world()));
    let client = Arc::new(SimulatedClient::new(Arc::clone(&state)));

    let mut session = AgentSession::new(
        Arc::clone(&state),
        Arc::clone(&client) as Arc<dyn GameCommands>,
    );
    let stdout_sink: LogSink = Arc::new(|line: String| {
        Box::pin(async move {
            println!("{line}");
            Ok(())
        }) as Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
    });
    let cfg = AgentConfig {
        tick_interval: Duration::from_millis(tick_ms),
        max_session: Duration::from_secs(session_secs),
        verbose: true,
        log_sink: Some(stdout_sink),
    };
    session.start(cfg).await?;
    client.wire_events(session.event_sender()).await;

    while session.is_running() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let stats = session.stats().await;
    println!(
        "final stats: {} ticks, {} goals, {} kills, {} gathered, {} xp",
        stats.ticks,
        stats.goals_completed,
        stats.mobs_killed,
        stats.resources_gathered,
        stats.total_xp(),
    );
    for thought in session.thoughts(5).await {
        println!("thought: {}", thought.reasoning);
    }
    Ok(())
}
