//! Autonomous decision engine: goal selection, guardrails, the tick loop,
//! and session telemetry.
//!
//! The decision path is deterministic and synchronous-testable; the session
//! runtime wraps it in a timer-driven tokio task and owns all mutation.

pub mod action;
pub mod client;
pub mod controller;
pub mod goal;
pub mod guardrail;
pub mod session;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testkit;

pub use action::Action;
pub use client::{GameCommands, GameEvent};
pub use controller::{Controller, TickOutcome};
pub use goal::{GoalCategory, GoalContext, GoalId, GoalProgress, select_goal};
pub use guardrail::{Severity, Verdict, check as check_guardrails};
pub use session::{AgentConfig, AgentSession, StartError};
pub use telemetry::{AgentStats, AgentThought, SessionTelemetry};
