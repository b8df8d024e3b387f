//! Autonomous agent core for a third-party MMORPG client.
//!
//! The network transport and tool registration live elsewhere; this crate owns
//! the game-state model, the goal/guardrail catalogs, the tick-based decision
//! loop, and session telemetry. The hosting process implements
//! [`agent::client::GameCommands`] and keeps the shared [`state::GameState`]
//! up to date from server events.

pub mod agent;
pub mod state;
