//! Tick-based decision controller.
//!
//! One [`Controller::tick`] runs the strict per-tick sequence: advance timers,
//! check the session ceiling, preempt on death, manage the goal lifecycle,
//! derive an action, filter it through the guardrails, and dispatch. It owns
//! no timers or channels; the session runtime drives it, which keeps the
//! whole decision path deterministic under test.

use std::ops::Range;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::action::{Action, AttackArgs, InteractNpcArgs, ItemArgs, MoveToArgs, TargetArgs};
use super::client::{GameCommands, GameEvent};
use super::goal::{self, ActiveGoal, GoalContext, GoalId};
use super::guardrail;
use super::telemetry::{AgentThought, SessionTelemetry};
use crate::state::GameState;

/// Unguided wander distance when no goal applies.
const WANDER_RANGE: Range<f32> = 5.0..20.0;
/// Explore-goal wander distance (wider).
const EXPLORE_RANGE: Range<f32> = 10.0..30.0;

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session ceiling reached; the caller must stop the loop.
    SessionExpired,
    /// Player is dead; a respawn command preempted all goal logic.
    RespawnDispatched,
    /// An action passed the guardrails and was dispatched.
    Dispatched(Action),
    /// The derived action was blocked; the fallback (if any) was dispatched.
    Blocked {
        proposed: Action,
        fallback: Option<Action>,
    },
    /// No goal was possible; an unguided wander move was dispatched.
    Wandered(Action),
    /// Nothing to derive or dispatch this tick.
    Idle,
}

pub struct Controller {
    max_session: Duration,
    ctx: GoalContext,
    active: Option<ActiveGoal>,
    rng: StdRng,
}

impl Controller {
    pub fn new(max_session: Duration) -> Self {
        Self {
            max_session,
            ctx: GoalContext::default(),
            active: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(max_session: Duration, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(max_session)
        }
    }

    pub fn context(&self) -> &GoalContext {
        &self.ctx
    }

    pub fn active_goal(&self) -> Option<GoalId> {
        self.active.as_ref().map(|a| a.template.id)
    }

    pub fn session_duration(&self) -> Duration {
        self.ctx.session_duration
    }

    /// Fold an out-of-band state-change event into goal progress and context.
    /// Called on the loop task only, so there is a single writer throughout.
    pub fn note_event(&mut self, event: &GameEvent) {
        if let GameEvent::XpGained { skill, amount } = event {
            self.ctx.note_xp(*skill, *amount);
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match event {
            GameEvent::XpGained { amount, .. } => active.progress.xp += amount,
            GameEvent::GatheringComplete => {
                active.progress.gathered += 1;
                // Pickups complete through the same client notification.
                if active.template.id == GoalId::CollectLoot {
                    active.progress.items_collected += 1;
                }
            }
            GameEvent::DamageDealt { killed: true, .. } => active.progress.kills += 1,
            _ => {}
        }
    }

    pub async fn tick(
        &mut self,
        state: &GameState,
        client: &dyn GameCommands,
        telemetry: &mut SessionTelemetry,
        dt: Duration,
    ) -> TickOutcome {
        // 1. Timing context.
        telemetry.stats.ticks += 1;
        self.ctx.advance(dt);
        if let Some(active) = self.active.as_mut() {
            active.progress.elapsed += dt;
        }

        // 2. Session ceiling is a hard stop; no goal or guardrail logic runs.
        if self.ctx.session_duration >= self.max_session {
            tracing::info!(
                "agent.session.expired after {:?}",
                self.ctx.session_duration
            );
            return TickOutcome::SessionExpired;
        }

        // 3. Death preempts everything, every tick, until the flag clears.
        if state.player.is_dead {
            tracing::info!("agent.respawn.dispatch");
            self.dispatch(client, Action::Respawn).await;
            return TickOutcome::RespawnDispatched;
        }

        // 4. Goal completion.
        if let Some(active) = self.active.as_ref()
            && (active.template.is_complete)(state, &active.progress)
        {
            let template = active.template;
            tracing::info!(goal = template.id.as_str(), "agent.goal.complete");
            self.ctx.note_completion(template.id, template.category);
            telemetry.stats.goals_completed += 1;
            self.active = None;
        }

        // 5. Goal selection, or an unguided wander when nothing applies.
        if self.active.is_none() {
            match goal::select_goal(state, &self.ctx) {
                Some(template) => {
                    tracing::info!(goal = template.id.as_str(), "agent.goal.start");
                    self.active = Some(ActiveGoal::new(template));
                }
                None => {
                    let wander = self.random_move(state, WANDER_RANGE);
                    tracing::debug!("agent.wander");
                    self.dispatch(client, wander.clone()).await;
                    return TickOutcome::Wandered(wander);
                }
            }
        }

        // 6. Derive one concrete action from the active goal.
        let Some(template) = self.active.as_ref().map(|a| a.template) else {
            return TickOutcome::Idle;
        };
        let Some(action) = self.derive_action(template.id, state) else {
            tracing::debug!(goal = template.id.as_str(), "agent.derive.none");
            return TickOutcome::Idle;
        };

        // 7. Guardrails, dispatch, fallback.
        let verdict = guardrail::check(state, &action);
        let mut thought = AgentThought::new((template.prompt)(state));
        thought.goal = Some(template.name.to_string());
        thought.warnings = verdict.warnings;

        let outcome = if verdict.allowed {
            thought.action = Some(action.to_wire());
            self.dispatch(client, action.clone()).await;
            TickOutcome::Dispatched(action)
        } else {
            let fallback = fallback_action(state);
            thought.reasoning = format!(
                "{} [blocked: {}]",
                thought.reasoning,
                verdict.violations.join("; ")
            );
            thought.warnings.extend(verdict.violations);
            if let Some(fb) = fallback.clone() {
                thought.action = Some(fb.to_wire());
                tracing::info!(
                    proposed = action.name(),
                    fallback = fb.name(),
                    "agent.guardrail.blocked"
                );
                self.dispatch(client, fb).await;
            } else {
                tracing::info!(proposed = action.name(), "agent.guardrail.blocked");
            }
            TickOutcome::Blocked {
                proposed: action,
                fallback,
            }
        };

        // 8. Append to the rolling thought log.
        telemetry.push_thought(thought);
        outcome
    }

    fn derive_action(&mut self, goal: GoalId, state: &GameState) -> Option<Action> {
        match goal {
            GoalId::Respawn => Some(Action::Respawn),
            GoalId::FleeDanger => Some(Action::TeleportHome),
            GoalId::EatFood => state.player.first_food().map(|f| {
                Action::UseItem(ItemArgs {
                    item_id: f.id.clone(),
                })
            }),
            GoalId::TrainCombat => state.weakest_mob().map(|(id, _)| {
                Action::Attack(AttackArgs {
                    target_id: id.clone(),
                    style: None,
                })
            }),
            GoalId::GatherResources => state.resources().next().map(|(id, _)| {
                Action::GatherResource(TargetArgs {
                    target_id: id.clone(),
                })
            }),
            GoalId::CollectLoot => state.ground_items().next().map(|(id, _)| {
                Action::PickUp(TargetArgs {
                    target_id: id.clone(),
                })
            }),
            GoalId::ExploreArea => Some(self.random_move(state, EXPLORE_RANGE)),
            GoalId::BankItems => {
                if state.bank_open {
                    Some(Action::DepositAll)
                } else {
                    state.bank_entity().map(|(id, _)| {
                        Action::InteractNpc(InteractNpcArgs {
                            target_id: id.clone(),
                            action: "bank".into(),
                        })
                    })
                }
            }
        }
    }

    /// Random heading in [0, 2π), random distance in `range`, same height.
    fn random_move(&mut self, state: &GameState, range: Range<f32>) -> Action {
        let heading = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = self.rng.gen_range(range);
        let pos = state.player.position;
        Action::MoveTo(MoveToArgs {
            x: pos.x + heading.cos() * dist,
            y: pos.y,
            z: pos.z + heading.sin() * dist,
            run: false,
        })
    }

    /// Fire-and-forget: transport failures are logged and never halt the loop.
    async fn dispatch(&self, client: &dyn GameCommands, action: Action) {
        let tool = action.name();
        if let Err(err) = client.dispatch(action).await {
            tracing::warn!(tool, "agent.dispatch.failed: {err:#}");
        }
    }
}

/// Bounded fallback search for when the derived action is blocked.
pub fn fallback_action(state: &GameState) -> Option<Action> {
    if state.health_fraction() < 0.25 {
        return Some(match state.player.first_food() {
            Some(food) => Action::UseItem(ItemArgs {
                item_id: food.id.clone(),
            }),
            None => Action::TeleportHome,
        });
    }
    if state.dialogue_open {
        return Some(Action::ContinueDialogue);
    }
    if state.bank_open {
        return Some(Action::CloseBank);
    }
    if state.store_open {
        return Some(Action::CloseStore);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::agent::testkit::*;

    #[derive(Default)]
    struct FakeClient {
        dispatched: Mutex<Vec<Action>>,
        fail_next: AtomicBool,
    }

    impl FakeClient {
        fn dispatched(&self) -> Vec<Action> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    impl GameCommands for FakeClient {
        fn dispatch<'a>(
            &'a self,
            action: Action,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.dispatched.lock().unwrap().push(action);
                if self.fail_next.swap(false, Ordering::SeqCst) {
                    anyhow::bail!("socket closed");
                }
                Ok(())
            })
        }
    }

    fn controller() -> Controller {
        Controller::with_seed(Duration::from_secs(3600), 7)
    }

    const DT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn death_preempts_any_active_goal() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        // Establish an active combat goal first.
        let mut state = base_state();
        add_mob(&mut state, "mob_1", 5, true);
        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        assert!(matches!(out, TickOutcome::Dispatched(Action::Attack(_))));
        assert_eq!(ctrl.active_goal(), Some(GoalId::TrainCombat));

        // Death: respawn dispatched, goal logic skipped entirely.
        state.player.is_dead = true;
        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        assert_eq!(out, TickOutcome::RespawnDispatched);
        assert_eq!(ctrl.active_goal(), Some(GoalId::TrainCombat));
        assert_eq!(client.dispatched().last(), Some(&Action::Respawn));
    }

    #[tokio::test]
    async fn healthy_player_near_mob_attacks_it() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        set_health_fraction(&mut state, 0.90);
        add_mob(&mut state, "mob_9", 10, true);

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Dispatched(Action::Attack(args)) = out else {
            panic!("expected attack, got {out:?}");
        };
        assert_eq!(args.target_id, "mob_9");

        // The thought log entry carries the wire form of the action.
        let thought = telemetry.recent_thoughts(1).pop().unwrap();
        assert_eq!(thought.goal.as_deref(), Some("Train combat"));
        let wire = thought.action.unwrap();
        assert_eq!(wire["tool"], "attack");
        assert_eq!(wire["params"]["targetId"], "mob_9");
        assert!(thought.warnings.is_empty());
    }

    #[tokio::test]
    async fn attack_prefers_the_lowest_level_mob() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        add_mob(&mut state, "mob_big", 9, true);
        add_mob(&mut state, "mob_small", 2, true);
        add_mob(&mut state, "mob_dead", 1, false);

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Dispatched(Action::Attack(args)) = out else {
            panic!("expected attack, got {out:?}");
        };
        assert_eq!(args.target_id, "mob_small");
    }

    #[tokio::test]
    async fn bank_goal_deposits_when_the_bank_is_open() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        fill_inventory(&mut state, 25);
        add_bank_booth(&mut state, "booth_1");
        state.bank_open = true;

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        assert_eq!(out, TickOutcome::Dispatched(Action::DepositAll));
    }

    #[tokio::test]
    async fn bank_goal_walks_to_the_booth_when_closed() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        fill_inventory(&mut state, 25);
        add_bank_booth(&mut state, "booth_1");

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Dispatched(Action::InteractNpc(args)) = out else {
            panic!("expected npc interaction, got {out:?}");
        };
        assert_eq!(args.target_id, "booth_1");
        assert_eq!(args.action, "bank");
    }

    #[test]
    fn blocked_move_in_bank_falls_back_to_close_bank() {
        let mut state = base_state();
        state.bank_open = true;

        // A stale move proposal must be blocked by the bank rule...
        let stale_move = Action::MoveTo(MoveToArgs {
            x: 1.0,
            y: 0.0,
            z: 1.0,
            run: false,
        });
        assert!(!guardrail::check(&state, &stale_move).allowed);
        // ...and the fallback is to close the bank.
        assert_eq!(fallback_action(&state), Some(Action::CloseBank));
    }

    #[test]
    fn fallback_prefers_food_at_low_health() {
        let mut state = base_state();
        set_health_fraction(&mut state, 0.20);
        assert_eq!(fallback_action(&state), Some(Action::TeleportHome));

        add_food(&mut state, "fish_1");
        let fb = fallback_action(&state).unwrap();
        assert!(matches!(fb, Action::UseItem(ref a) if a.item_id == "fish_1"));
    }

    #[test]
    fn fallback_order_is_dialogue_then_bank_then_store() {
        let mut state = base_state();
        state.dialogue_open = true;
        state.bank_open = true;
        state.store_open = true;
        assert_eq!(fallback_action(&state), Some(Action::ContinueDialogue));

        state.dialogue_open = false;
        assert_eq!(fallback_action(&state), Some(Action::CloseBank));

        state.bank_open = false;
        assert_eq!(fallback_action(&state), Some(Action::CloseStore));

        state.store_open = false;
        assert_eq!(fallback_action(&state), None);
    }

    #[tokio::test]
    async fn blocked_attack_at_low_health_substitutes_the_fallback() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        // Start the combat goal while healthy.
        let mut state = base_state();
        add_mob(&mut state, "mob_1", 5, true);
        ctrl.tick(&state, &client, &mut telemetry, DT).await;
        assert_eq!(ctrl.active_goal(), Some(GoalId::TrainCombat));

        // Health collapses; the goal is still active and derives an attack,
        // which the guardrail blocks. Teleport home is the substitute.
        set_health_fraction(&mut state, 0.20);
        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Blocked { proposed, fallback } = out else {
            panic!("expected block, got {out:?}");
        };
        assert!(matches!(proposed, Action::Attack(_)));
        assert_eq!(fallback, Some(Action::TeleportHome));
        assert_eq!(client.dispatched().last(), Some(&Action::TeleportHome));

        let thought = telemetry.recent_thoughts(1).pop().unwrap();
        assert!(thought.reasoning.contains("blocked"));
        assert!(!thought.warnings.is_empty());
    }

    #[tokio::test]
    async fn no_possible_goal_wanders_a_short_distance() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        // Bank UI open with an empty inventory: nothing is possible.
        let mut state = base_state();
        state.bank_open = true;
        state.player.position = crate::state::Vec3 { x: 50.0, y: 2.0, z: 50.0 };

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Wandered(Action::MoveTo(args)) = out else {
            panic!("expected wander, got {out:?}");
        };
        let dx = args.x - 50.0;
        let dz = args.z - 50.0;
        let dist = (dx * dx + dz * dz).sqrt();
        assert!((5.0..20.0).contains(&dist), "wander distance {dist}");
        assert_eq!(args.y, 2.0, "vertical coordinate unchanged");
    }

    #[tokio::test]
    async fn session_ceiling_stops_all_goal_logic() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = Controller::with_seed(Duration::from_secs(30), 7);

        let mut state = base_state();
        add_mob(&mut state, "mob_1", 5, true);

        let out = ctrl
            .tick(&state, &client, &mut telemetry, Duration::from_secs(20))
            .await;
        assert!(matches!(out, TickOutcome::Dispatched(_)));

        let out = ctrl
            .tick(&state, &client, &mut telemetry, Duration::from_secs(20))
            .await;
        assert_eq!(out, TickOutcome::SessionExpired);
        // Only the first tick dispatched anything.
        assert_eq!(client.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn five_kills_complete_the_combat_goal_and_update_context() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        add_mob(&mut state, "mob_1", 5, true);
        ctrl.tick(&state, &client, &mut telemetry, DT).await;
        assert_eq!(ctrl.active_goal(), Some(GoalId::TrainCombat));

        for _ in 0..5 {
            ctrl.note_event(&GameEvent::DamageDealt {
                amount: 3,
                killed: true,
            });
        }
        ctrl.tick(&state, &client, &mut telemetry, DT).await;

        assert_eq!(telemetry.stats.goals_completed, 1);
        assert_eq!(ctrl.context().completion_count(GoalId::TrainCombat), 1);
        // Combat completed just now, so the recency timer was reset.
        assert!(ctrl.context().time_since_combat < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn dispatch_failure_does_not_halt_the_tick() {
        let client = FakeClient::default();
        client.fail_next.store(true, Ordering::SeqCst);
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        add_mob(&mut state, "mob_1", 5, true);

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        // The action still counts as dispatched; the transport error is
        // logged and swallowed.
        assert!(matches!(out, TickOutcome::Dispatched(Action::Attack(_))));
        assert_eq!(telemetry.thought_count(), 1);
    }

    #[tokio::test]
    async fn eat_food_goal_uses_the_first_food_item() {
        let client = FakeClient::default();
        let mut telemetry = SessionTelemetry::default();
        let mut ctrl = controller();

        let mut state = base_state();
        set_health_fraction(&mut state, 0.5);
        add_food(&mut state, "fish_1");

        let out = ctrl.tick(&state, &client, &mut telemetry, DT).await;
        let TickOutcome::Dispatched(Action::UseItem(args)) = out else {
            panic!("expected use_item, got {out:?}");
        };
        assert_eq!(args.item_id, "fish_1");
        assert_eq!(ctrl.active_goal(), Some(GoalId::EatFood));
    }
}
