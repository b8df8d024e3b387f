//! Session runtime: the timer-driven host for the decision controller.
//!
//! The loop runs on one spawned task. Each tick runs to completion before the
//! next sleep is armed (no overlap), and out-of-band game events are drained
//! on the same task, so every mutable piece (`GoalContext`, progress,
//! telemetry) has a single writer. Stats and thoughts sit behind an async
//! mutex so the hosting tool layer can read them at any time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::client::{GameCommands, GameEvent};
use super::controller::{Controller, TickOutcome};
use super::telemetry::{AgentStats, AgentThought, SessionTelemetry};
use crate::state::SharedState;

/// External log-line consumer (e.g. a chat bridge). Failures are contained.
pub type LogSink =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

#[derive(Clone)]
pub struct AgentConfig {
    pub tick_interval: Duration,
    pub max_session: Duration,
    pub verbose: bool,
    pub log_sink: Option<LogSink>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            max_session: Duration::from_secs(3600),
            verbose: false,
            log_sink: None,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("tick_interval", &self.tick_interval)
            .field("max_session", &self.max_session)
            .field("verbose", &self.verbose)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// The only unrecoverable condition in this core: starting against a client
/// that is not ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    NotConnected,
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::NotConnected => write!(f, "game client is not connected"),
        }
    }
}

impl std::error::Error for StartError {}

pub struct AgentSession {
    state: SharedState,
    client: Arc<dyn GameCommands>,
    telemetry: Arc<Mutex<SessionTelemetry>>,
    running: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<GameEvent>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl AgentSession {
    pub fn new(state: SharedState, client: Arc<dyn GameCommands>) -> Self {
        // Replaced with a live channel on start; this one only keeps
        // pre-start senders harmless.
        let (event_tx, _) = mpsc::unbounded_channel();
        Self {
            state,
            client,
            telemetry: Arc::new(Mutex::new(SessionTelemetry::default())),
            running: Arc::new(AtomicBool::new(false)),
            event_tx,
            stop_tx: None,
            task: None,
        }
    }

    /// Where the external client delivers state-change events.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<GameEvent> {
        self.event_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> AgentStats {
        self.telemetry.lock().await.stats.clone()
    }

    pub async fn thoughts(&self, limit: usize) -> Vec<AgentThought> {
        self.telemetry.lock().await.recent_thoughts(limit)
    }

    pub async fn start(&mut self, cfg: AgentConfig) -> Result<(), StartError> {
        if self.is_running() {
            tracing::warn!("agent.start.ignored: session already running");
            return Ok(());
        }
        if !self.state.read().await.connected {
            return Err(StartError::NotConnected);
        }

        *self.telemetry.lock().await = SessionTelemetry::default();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        self.event_tx = event_tx;
        self.stop_tx = Some(stop_tx);
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            interval_ms = cfg.tick_interval.as_millis() as u64,
            max_session_ms = cfg.max_session.as_millis() as u64,
            "agent.session.start"
        );

        let state = Arc::clone(&self.state);
        let client = Arc::clone(&self.client);
        let telemetry = Arc::clone(&self.telemetry);
        let running = Arc::clone(&self.running);
        self.task = Some(tokio::spawn(run_session(
            cfg, state, client, telemetry, running, stop_rx, event_rx,
        )));
        Ok(())
    }

    /// Cancels the pending tick and waits for finalization.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    cfg: AgentConfig,
    state: SharedState,
    client: Arc<dyn GameCommands>,
    telemetry: Arc<Mutex<SessionTelemetry>>,
    running: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
    mut event_rx: mpsc::UnboundedReceiver<GameEvent>,
) {
    let mut controller = Controller::new(cfg.max_session);

    'session: loop {
        // Re-armed after each completed tick, so ticks can never overlap.
        let sleep = tokio::time::sleep(cfg.tick_interval);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        tracing::info!("agent.session.stop_requested");
                        break 'session;
                    }
                }
                Some(event) = event_rx.recv() => {
                    controller.note_event(&event);
                    telemetry.lock().await.apply_event(&event);
                }
            }
        }

        let snapshot = state.read().await.clone();
        let outcome = {
            let mut tel = telemetry.lock().await;
            controller
                .tick(&snapshot, client.as_ref(), &mut tel, cfg.tick_interval)
                .await
        };
        if cfg.verbose {
            tracing::debug!(?outcome, "agent.tick");
        }
        emit(&cfg, tick_line(&controller, &outcome)).await;

        if outcome == TickOutcome::SessionExpired {
            break;
        }
    }

    let summary = {
        let tel = telemetry.lock().await;
        tel.summary(controller.session_duration())
    };
    tracing::info!("agent.session.summary {summary}");
    emit(&cfg, summary).await;
    running.store(false, Ordering::SeqCst);
}

fn tick_line(controller: &Controller, outcome: &TickOutcome) -> String {
    let goal = controller
        .active_goal()
        .map(|g| g.as_str())
        .unwrap_or("none");
    match outcome {
        TickOutcome::SessionExpired => "tick: session expired".to_string(),
        TickOutcome::RespawnDispatched => "tick: dead, respawning".to_string(),
        TickOutcome::Dispatched(action) => format!("tick: goal={goal} action={}", action.name()),
        TickOutcome::Blocked { proposed, fallback } => format!(
            "tick: goal={goal} blocked={} fallback={}",
            proposed.name(),
            fallback.as_ref().map(|a| a.name()).unwrap_or("none"),
        ),
        TickOutcome::Wandered(_) => "tick: no goal, wandering".to_string(),
        TickOutcome::Idle => format!("tick: goal={goal} idle"),
    }
}

/// Sink failures are logged locally and never interrupt the tick.
async fn emit(cfg: &AgentConfig, line: String) {
    let Some(sink) = cfg.log_sink.as_ref() else {
        return;
    };
    if let Err(err) = sink(line).await {
        tracing::warn!("agent.sink.failed: {err:#}");
    }
}
