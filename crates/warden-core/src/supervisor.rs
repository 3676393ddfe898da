//! The supervision engine: session lifecycle, interaction processing, and
//! the background drift monitor.
//!
//! A [`Supervisor`] owns the detectors, the intervention planner, and the
//! per-session histories. The host feeds it every user prompt and agent
//! output; it answers with verdicts the host is expected to act on. One
//! background task polls for context drift while the session runs.
//!
//! Locking discipline: session state lives behind a `std::sync::Mutex`
//! and is only ever locked to append or snapshot. No lock is held across
//! a backend call.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use warden_gateway::{GeminiClient, LlmGateway};
use warden_monitors::{
    format_pivot_message, DebugLoopDetector, DebugLoopStats, DriftStats, GoalTracker,
    InterventionPlanner, QualityGate, SycophancyDetector, SycophancyStats,
};
use warden_types::{
    BoundedHistory, DetectionResult, ErrorRecord, InteractionRecord, OutputVerdict, PromptVerdict,
    SessionEntry, SessionLog, SessionRecorder, SupervisorConfig, WardenError,
};

use crate::recorder::JsonFileRecorder;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Retained user inputs per session.
const USER_HISTORY_CAP: usize = 100;

/// Retained agent outputs per session.
const AGENT_HISTORY_CAP: usize = 100;

/// Retained error records per session.
const ERROR_HISTORY_CAP: usize = 50;

/// Goal learning is attempted only while the session has at most this many
/// user inputs.
const GOAL_LEARNING_MAX_INPUTS: usize = 5;

/// The background drift check skips sessions with fewer user inputs.
const MIN_INPUTS_FOR_DRIFT: usize = 5;

/// Agent outputs the background drift check hands to the goal tracker.
const DRIFT_ACTION_WINDOW: usize = 20;

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// Detector counters reported through [`Supervisor::status`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorStats {
    pub debug_loops: DebugLoopStats,
    pub context_drift: DriftStats,
    pub sycophancy: SycophancyStats,
}

/// A point-in-time snapshot of the running session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Short identifier of the current session.
    pub session_id: String,
    /// User inputs currently retained.
    pub user_inputs: usize,
    /// Agent outputs currently retained.
    pub agent_outputs: usize,
    /// Error records currently retained.
    pub errors_tracked: usize,
    /// Per-detector counters.
    pub monitors: MonitorStats,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle phases of a supervisor.
///
/// Strictly forward-moving: a stopped supervisor is never restarted, the
/// host constructs a fresh one for the next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

/// Mutable per-session state behind the session lock.
///
/// Kept in place after shutdown so status queries keep working.
struct SessionState {
    session_id: String,
    user_inputs: BoundedHistory<InteractionRecord>,
    agent_outputs: BoundedHistory<InteractionRecord>,
    error_history: BoundedHistory<ErrorRecord>,
    log: SessionLog,
}

impl SessionState {
    fn new(session_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            log: SessionLog::new(session_id.clone(), started_at),
            session_id,
            user_inputs: BoundedHistory::new(USER_HISTORY_CAP),
            agent_outputs: BoundedHistory::new(AGENT_HISTORY_CAP),
            error_history: BoundedHistory::new(ERROR_HISTORY_CAP),
        }
    }
}

/// First 8 hex characters of a fresh UUIDv4.
fn short_session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn no_session() -> WardenError {
    WardenError::Lifecycle("no active session".into())
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// The supervision engine for one coding-agent session.
///
/// Constructed, started once, fed interactions, and shut down once. All
/// methods take `&self`; the supervisor is safe to share behind an `Arc`
/// between the host's input and output paths.
pub struct Supervisor {
    config: SupervisorConfig,
    debug_loop: DebugLoopDetector,
    goal_tracker: Arc<GoalTracker>,
    sycophancy: SycophancyDetector,
    quality_gate: QualityGate,
    planner: InterventionPlanner,
    recorder: Arc<dyn SessionRecorder>,
    state: Mutex<Lifecycle>,
    session: Arc<Mutex<Option<SessionState>>>,
    shutdown_tx: watch::Sender<bool>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a supervisor backed by the real Gemini gateway and the
    /// filesystem recorder.
    ///
    /// Resolves the API key from the environment; fails when it is unset
    /// or the configuration is invalid.
    pub fn new(config: SupervisorConfig) -> Result<Self, WardenError> {
        let gateway = Arc::new(GeminiClient::new(config.gateway.clone())?);
        let recorder = Arc::new(JsonFileRecorder::new(config.log_dir.clone()));
        Self::with_parts(config, gateway, recorder)
    }

    /// Create a supervisor with explicit gateway and recorder implementations.
    pub fn with_parts(
        config: SupervisorConfig,
        gateway: Arc<dyn LlmGateway>,
        recorder: Arc<dyn SessionRecorder>,
    ) -> Result<Self, WardenError> {
        config.validate()?;

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            debug_loop: DebugLoopDetector::new(Arc::clone(&gateway), config.loop_window),
            goal_tracker: Arc::new(GoalTracker::new(
                Arc::clone(&gateway),
                config.drift_threshold,
            )),
            sycophancy: SycophancyDetector::new(Arc::clone(&gateway), config.sycophancy_threshold),
            quality_gate: QualityGate::new(Arc::clone(&gateway), config.gate_preset.thresholds()),
            planner: InterventionPlanner::new(gateway, config.enable_research),
            recorder,
            state: Mutex::new(Lifecycle::NotStarted),
            session: Arc::new(Mutex::new(None)),
            shutdown_tx,
            monitor_handle: Mutex::new(None),
            config,
        })
    }

    /// Begin a supervision session and spawn the background drift monitor.
    ///
    /// Returns the short session identifier. Fails if the supervisor was
    /// already started.
    pub async fn start(&self) -> Result<String, WardenError> {
        let mut state = self.lock_state();
        if *state != Lifecycle::NotStarted {
            return Err(WardenError::Lifecycle("supervisor already started".into()));
        }

        let session_id = short_session_id();
        *self.lock_session() = Some(SessionState::new(session_id.clone(), Utc::now()));

        let handle = tokio::spawn(drift_monitor_loop(
            Arc::clone(&self.session),
            Arc::clone(&self.goal_tracker),
            Duration::from_secs(self.config.drift_poll_secs),
            self.shutdown_tx.subscribe(),
        ));
        *self.lock_handle() = Some(handle);

        *state = Lifecycle::Running;
        info!(session_id = %session_id, "supervision session started");
        Ok(session_id)
    }

    /// Process one user prompt before it is forwarded to the agent.
    ///
    /// The prompt is appended to the history first, so rejected prompts
    /// still show up in counts and in goal learning material. A rejection
    /// from the quality gate short-circuits goal learning for this input.
    pub async fn submit_user_input(&self, content: &str) -> Result<PromptVerdict, WardenError> {
        self.ensure_running()?;

        let (input_count, early_prompts) = {
            let mut guard = self.lock_session();
            let session = guard.as_mut().ok_or_else(no_session)?;
            session.user_inputs.push(InteractionRecord::user(content));
            let prompts: Vec<String> = session
                .user_inputs
                .iter()
                .map(|record| record.content.clone())
                .collect();
            (session.user_inputs.len(), prompts)
        };

        if self.config.gate_prompts {
            let analysis = self.quality_gate.analyze(content).await;
            if !analysis.approved {
                return Ok(PromptVerdict::rejected(
                    analysis.feedback,
                    analysis.suggestions,
                ));
            }
        }

        // One-shot per session, but a failed attempt may retry on the next
        // input while the session is still young.
        if input_count <= GOAL_LEARNING_MAX_INPUTS && !self.goal_tracker.has_learned_goal() {
            self.goal_tracker.learn_initial_goal(&early_prompts).await;
        }

        Ok(PromptVerdict::approved())
    }

    /// Process one agent output and decide on interventions.
    ///
    /// Every output is checked for sycophancy; error outputs additionally
    /// feed the debug-loop detector. A confirmed loop under `auto_kill`
    /// produces a kill verdict with a formatted pivot plan attached.
    pub async fn submit_agent_output(
        &self,
        content: &str,
        is_error: bool,
    ) -> Result<OutputVerdict, WardenError> {
        self.ensure_running()?;

        let record = InteractionRecord::agent(content, is_error);
        let (errors, combined_history, last_user) = {
            let mut guard = self.lock_session();
            let session = guard.as_mut().ok_or_else(no_session)?;
            session.agent_outputs.push(record.clone());
            if is_error {
                session.error_history.push(ErrorRecord::new(content));
            }
            let errors = session.error_history.snapshot();
            let mut combined = session.user_inputs.snapshot();
            combined.extend(session.agent_outputs.snapshot());
            let last_user = session.user_inputs.last().cloned();
            (errors, combined, last_user)
        };

        let mut verdict = OutputVerdict::default();

        if let DetectionResult::SycophancyDetected { reason, confidence } =
            self.sycophancy.check(content).await
        {
            warn!(reason = %reason, confidence, "sycophancy detected");
            verdict
                .warnings
                .push(format!("[warden] sycophancy detected: {reason}"));
            verdict
                .suggestions
                .push("[warden] forcing alternative consideration".to_string());
        }

        if is_error {
            if let DetectionResult::LoopDetected {
                pattern,
                count,
                confidence,
            } = self.debug_loop.check(&errors).await
            {
                warn!(pattern = %pattern, count, confidence, "debug loop detected");
                verdict
                    .warnings
                    .push(format!("[warden] debug loop detected: {pattern}"));

                if self.config.auto_kill {
                    verdict.kill_agent = true;
                    let plan = self
                        .planner
                        .analyze_and_pivot(&combined_history, &errors, self.config.enable_research)
                        .await;
                    verdict.suggestions.push(format_pivot_message(&plan));
                }
            }
        }

        {
            let mut guard = self.lock_session();
            let session = guard.as_mut().ok_or_else(no_session)?;
            session.log.log_interaction(SessionEntry {
                timestamp: Utc::now(),
                user_input: last_user,
                agent_output: Some(record),
                interventions: verdict.clone(),
            });
        }

        Ok(verdict)
    }

    /// Stop the session: halt the drift monitor and persist the log.
    ///
    /// Returns the path of the saved log, or `None` when saving is
    /// disabled. A recorder failure still leaves the supervisor stopped.
    pub async fn shutdown(&self) -> Result<Option<PathBuf>, WardenError> {
        {
            let mut state = self.lock_state();
            if *state != Lifecycle::Running {
                return Err(WardenError::Lifecycle("supervisor not running".into()));
            }
            *state = Lifecycle::ShuttingDown;
        }

        // The receiver may already be gone if the task exited early.
        let _ = self.shutdown_tx.send(true);

        let handle = self.lock_handle().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "drift monitor task ended abnormally");
            }
        }

        let log = {
            let guard = self.lock_session();
            guard.as_ref().map(|session| session.log.clone())
        };

        let saved = if self.config.save_session_logs {
            match log {
                Some(log) => match self.recorder.record(&log) {
                    Ok(path) => {
                        info!(path = %path.display(), "session log saved");
                        Some(path)
                    }
                    Err(e) => {
                        *self.lock_state() = Lifecycle::Stopped;
                        return Err(e);
                    }
                },
                None => None,
            }
        } else {
            None
        };

        *self.lock_state() = Lifecycle::Stopped;
        info!("supervision session stopped");
        Ok(saved)
    }

    /// Snapshot session counters and detector statistics.
    ///
    /// Available from the first [`start`](Self::start) on, including after
    /// shutdown.
    pub fn status(&self) -> Result<SupervisorStatus, WardenError> {
        if *self.lock_state() == Lifecycle::NotStarted {
            return Err(WardenError::Lifecycle("supervisor not started".into()));
        }

        let guard = self.lock_session();
        let session = guard.as_ref().ok_or_else(no_session)?;
        Ok(SupervisorStatus {
            session_id: session.session_id.clone(),
            user_inputs: session.user_inputs.len(),
            agent_outputs: session.agent_outputs.len(),
            errors_tracked: session.error_history.len(),
            monitors: MonitorStats {
                debug_loops: self.debug_loop.stats(),
                context_drift: self.goal_tracker.stats(),
                sycophancy: self.sycophancy.stats(),
            },
        })
    }

    /// Whether the supervisor currently accepts interactions.
    pub fn is_running(&self) -> bool {
        *self.lock_state() == Lifecycle::Running
    }

    fn ensure_running(&self) -> Result<(), WardenError> {
        if *self.lock_state() == Lifecycle::Running {
            Ok(())
        } else {
            Err(WardenError::Lifecycle("supervisor not running".into()))
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.monitor_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Background drift monitor
// ---------------------------------------------------------------------------

/// Periodically compare recent agent activity against the learned goal.
///
/// Sessions with fewer than [`MIN_INPUTS_FOR_DRIFT`] user inputs are
/// skipped without a backend call. The task exits when the shutdown flag
/// flips, or when the supervisor is dropped and the channel closes.
async fn drift_monitor_loop(
    session: Arc<Mutex<Option<SessionState>>>,
    goal_tracker: Arc<GoalTracker>,
    poll: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let start = tokio::time::Instant::now() + poll;
    let mut ticker = tokio::time::interval_at(start, poll);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Snapshot under the lock, check without it.
                let actions = {
                    let guard = session.lock().unwrap_or_else(PoisonError::into_inner);
                    let Some(state) = guard.as_ref() else { continue };
                    if state.user_inputs.len() < MIN_INPUTS_FOR_DRIFT {
                        continue;
                    }
                    state
                        .agent_outputs
                        .recent(DRIFT_ACTION_WINDOW)
                        .into_iter()
                        .map(|record| record.content.clone())
                        .collect::<Vec<_>>()
                };

                if let DetectionResult::DriftDetected {
                    distance,
                    trajectory,
                    recommendation,
                } = goal_tracker.check(&actions).await
                {
                    warn!(
                        distance,
                        trajectory = %trajectory,
                        recommendation = %recommendation,
                        "context drift detected"
                    );
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use warden_harness::{MockGateway, MockRecorder};

    const GATE_KEY: &str = "Rate this coding prompt";
    const LEARN_KEY: &str = "extract their core goal";
    const DRIFT_KEY: &str = "recent agent actions";
    const PIVOT_KEY: &str = "stuck in a debug loop";

    fn quiet_config() -> SupervisorConfig {
        let mut config = SupervisorConfig::default();
        // Background checks stay out of the way unless a test opts in.
        config.drift_poll_secs = 3600;
        config.gate_prompts = false;
        config
    }

    fn supervisor(
        config: SupervisorConfig,
        gateway: &MockGateway,
        recorder: &MockRecorder,
    ) -> Supervisor {
        Supervisor::with_parts(config, Arc::new(gateway.clone()), Arc::new(recorder.clone()))
            .expect("test config should validate")
    }

    fn gate_approval() -> serde_json::Value {
        serde_json::json!({
            "specificity": 9, "completeness": 9, "ambiguity": 1, "approved": true
        })
    }

    fn learned_goal() -> serde_json::Value {
        serde_json::json!({
            "goal": "Build a REST API",
            "key_requirements": ["JWT auth"],
            "technical_stack": "Rust"
        })
    }

    fn pivot_plan() -> serde_json::Value {
        serde_json::json!({
            "root_cause": "stale lockfile",
            "failed_approaches": ["re-running install"],
            "pivot_strategy": "regenerate the lockfile",
            "specific_actions": ["delete the lockfile", "run a clean build"],
            "confidence": 80
        })
    }

    fn learn_calls(gateway: &MockGateway) -> usize {
        gateway
            .recorded_calls()
            .iter()
            .filter(|call| call.prompt.contains(LEARN_KEY))
            .count()
    }

    #[tokio::test]
    async fn lifecycle_requires_start() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);

        assert!(matches!(
            sup.submit_user_input("hello").await.unwrap_err(),
            WardenError::Lifecycle(_)
        ));
        assert!(matches!(
            sup.submit_agent_output("hi", false).await.unwrap_err(),
            WardenError::Lifecycle(_)
        ));
        assert!(matches!(
            sup.status().unwrap_err(),
            WardenError::Lifecycle(_)
        ));
        assert!(matches!(
            sup.shutdown().await.unwrap_err(),
            WardenError::Lifecycle(_)
        ));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn start_creates_session() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);

        let session_id = sup.start().await.unwrap();
        assert_eq!(session_id.len(), 8);
        assert!(sup.is_running());

        let status = sup.status().unwrap();
        assert_eq!(status.session_id, session_id);
        assert_eq!(status.user_inputs, 0);
        assert_eq!(status.agent_outputs, 0);
        assert_eq!(status.errors_tracked, 0);
        assert!(!status.monitors.context_drift.has_learned_goal);

        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, WardenError::Lifecycle(_)));
    }

    #[tokio::test]
    async fn invalid_config_rejected_at_construction() {
        let mut config = quiet_config();
        config.loop_window = 1;
        let result = Supervisor::with_parts(
            config,
            Arc::new(MockGateway::new()),
            Arc::new(MockRecorder::new()),
        );
        assert!(matches!(result.unwrap_err(), WardenError::ConfigError(_)));
    }

    #[tokio::test]
    async fn approved_prompt_passes_gate() {
        let gateway = MockGateway::new()
            .with_structured_response(GATE_KEY, gate_approval())
            .with_structured_response(LEARN_KEY, learned_goal());
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.gate_prompts = true;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        let verdict = sup.submit_user_input("add pagination to GET /users").await.unwrap();
        assert!(verdict.approved);
        assert!(verdict.feedback.is_none());

        let gate_call = gateway
            .recorded_calls()
            .into_iter()
            .find(|call| call.prompt.contains(GATE_KEY))
            .expect("gate call recorded");
        assert_eq!(gate_call.tier, warden_gateway::Tier::Deep);
        assert!(gate_call.prompt.contains("add pagination to GET /users"));
    }

    #[tokio::test]
    async fn rejected_prompt_reports_feedback_and_skips_goal_learning() {
        let gateway = MockGateway::new().with_structured_response(
            GATE_KEY,
            serde_json::json!({
                "specificity": 2, "completeness": 3, "ambiguity": 9,
                "approved": false,
                "feedback": "too vague",
                "suggestions": ["name the file to change"]
            }),
        );
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.gate_prompts = true;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        let verdict = sup.submit_user_input("fix it").await.unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.feedback.as_deref(), Some("too vague"));
        assert_eq!(verdict.suggestions, vec!["name the file to change"]);

        // Rejection short-circuits before goal learning, but the input was
        // still appended to the history.
        assert_eq!(learn_calls(&gateway), 0);
        assert_eq!(sup.status().unwrap().user_inputs, 1);
    }

    #[tokio::test]
    async fn gate_failure_fails_open() {
        let gateway = MockGateway::new().failing();
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.gate_prompts = true;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        let verdict = sup.submit_user_input("anything at all").await.unwrap();
        assert!(verdict.approved);
    }

    #[tokio::test]
    async fn goal_learning_happens_once() {
        let gateway = MockGateway::new().with_structured_response(LEARN_KEY, learned_goal());
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        sup.submit_user_input("build a REST API").await.unwrap();
        sup.submit_user_input("add JWT auth").await.unwrap();
        sup.submit_user_input("add rate limiting").await.unwrap();

        assert_eq!(learn_calls(&gateway), 1);
        assert!(sup.status().unwrap().monitors.context_drift.has_learned_goal);
    }

    #[tokio::test]
    async fn goal_learning_retries_until_success() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        // First attempt fails (nothing scripted), the goal stays unset.
        sup.submit_user_input("build a REST API").await.unwrap();
        assert!(!sup.status().unwrap().monitors.context_drift.has_learned_goal);

        // Second attempt succeeds from a queued plain-JSON reply.
        gateway.enqueue_text_response(learned_goal().to_string());
        sup.submit_user_input("add JWT auth").await.unwrap();
        assert!(sup.status().unwrap().monitors.context_drift.has_learned_goal);

        // Once learned, no further attempts.
        sup.submit_user_input("add rate limiting").await.unwrap();
        assert_eq!(learn_calls(&gateway), 2);
    }

    #[tokio::test]
    async fn goal_learning_stops_after_five_inputs() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        for i in 0..7 {
            sup.submit_user_input(&format!("prompt {i}")).await.unwrap();
        }

        // Attempts on inputs 1-5 only, all failing; inputs 6 and 7 no longer try.
        assert_eq!(learn_calls(&gateway), 5);
        assert_eq!(sup.status().unwrap().user_inputs, 7);
    }

    #[tokio::test]
    async fn clean_output_produces_empty_verdict() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        let verdict = sup
            .submit_agent_output("tests pass, moving on", false)
            .await
            .unwrap();
        assert!(!verdict.kill_agent);
        assert!(verdict.warnings.is_empty());
        assert!(verdict.suggestions.is_empty());
        assert!(!verdict.requires_attention());
        assert_eq!(sup.status().unwrap().agent_outputs, 1);
    }

    #[tokio::test]
    async fn sycophantic_output_warns_without_killing() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        let verdict = sup
            .submit_agent_output("You're absolutely right, that's a great idea. Perfect.", false)
            .await
            .unwrap();
        assert!(!verdict.kill_agent);
        assert_eq!(
            verdict.warnings,
            vec!["[warden] sycophancy detected: excessive agreement patterns (3 found)"]
        );
        assert_eq!(
            verdict.suggestions,
            vec!["[warden] forcing alternative consideration"]
        );
        assert_eq!(
            sup.status().unwrap().monitors.sycophancy.total_detections,
            1
        );
    }

    #[tokio::test]
    async fn repeated_errors_trigger_kill_and_pivot() {
        let gateway = MockGateway::new().with_structured_response(PIVOT_KEY, pivot_plan());
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        for _ in 0..4 {
            let verdict = sup
                .submit_agent_output("Error: connection refused", true)
                .await
                .unwrap();
            assert!(!verdict.requires_attention());
        }

        let verdict = sup
            .submit_agent_output("Error: connection refused", true)
            .await
            .unwrap();
        assert!(verdict.kill_agent);
        assert_eq!(
            verdict.warnings,
            vec!["[warden] debug loop detected: identical errors repeated"]
        );
        let plan = &verdict.suggestions[0];
        assert!(plan.contains("[warden] intervention #1"));
        assert!(plan.contains("ROOT CAUSE: stale lockfile"));
        assert!(plan.contains("PIVOT STRATEGY: regenerate the lockfile"));

        let status = sup.status().unwrap();
        assert_eq!(status.errors_tracked, 5);
        assert_eq!(status.monitors.debug_loops.total_detections, 1);
    }

    #[tokio::test]
    async fn auto_kill_disabled_keeps_agent_alive() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.auto_kill = false;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        for _ in 0..5 {
            sup.submit_agent_output("Error: connection refused", true)
                .await
                .unwrap();
        }
        let verdict = sup
            .submit_agent_output("Error: connection refused", true)
            .await
            .unwrap();
        assert!(!verdict.kill_agent);
        assert!(!verdict.warnings.is_empty());
        assert!(verdict.suggestions.is_empty());

        let pivot_called = gateway
            .recorded_calls()
            .iter()
            .any(|call| call.prompt.contains(PIVOT_KEY));
        assert!(!pivot_called);
    }

    #[tokio::test]
    async fn session_log_tracks_interactions_and_interventions() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        let session_id = sup.start().await.unwrap();

        sup.submit_user_input("refactor the parser").await.unwrap();
        sup.submit_agent_output("done, tests pass", false)
            .await
            .unwrap();
        sup.submit_agent_output("You're absolutely right, that's a great idea. Perfect.", false)
            .await
            .unwrap();

        let path = sup.shutdown().await.unwrap();
        assert_eq!(
            path,
            Some(PathBuf::from(format!("warden_{session_id}.json")))
        );

        let logs = recorder.recorded();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.session_id, session_id);
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.interventions.len(), 1);
        assert_eq!(
            log.entries[0].user_input.as_ref().unwrap().content,
            "refactor the parser"
        );
        assert!(log.entries[0].interventions.warnings.is_empty());
        assert!(!log.entries[1].interventions.warnings.is_empty());

        // Stopped: no further interactions, but status still answers.
        assert!(!sup.is_running());
        assert!(matches!(
            sup.submit_user_input("more").await.unwrap_err(),
            WardenError::Lifecycle(_)
        ));
        assert_eq!(sup.status().unwrap().agent_outputs, 2);
    }

    #[tokio::test]
    async fn shutdown_without_saving_returns_none() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.save_session_logs = false;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        assert_eq!(sup.shutdown().await.unwrap(), None);
        assert_eq!(recorder.record_count(), 0);
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn shutdown_surfaces_recorder_errors() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new().failing();
        let sup = supervisor(quiet_config(), &gateway, &recorder);
        sup.start().await.unwrap();

        let err = sup.shutdown().await.unwrap_err();
        assert!(matches!(err, WardenError::RecorderError(_)));

        // Still stopped afterwards; a second shutdown is a lifecycle error.
        assert!(!sup.is_running());
        assert!(matches!(
            sup.shutdown().await.unwrap_err(),
            WardenError::Lifecycle(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn background_drift_check_fires_after_poll_interval() {
        let gateway = MockGateway::new()
            .with_structured_response(LEARN_KEY, learned_goal())
            .with_structured_response(
                DRIFT_KEY,
                serde_json::json!({
                    "drifted": true,
                    "distance": 0.9,
                    "current_trajectory": "styling the landing page",
                    "recommendation": "return to the API endpoints"
                }),
            );
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.drift_poll_secs = 10;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        for i in 0..5 {
            sup.submit_user_input(&format!("prompt {i}")).await.unwrap();
        }
        sup.submit_agent_output("tweaking CSS colors", false)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;

        let drift_call = gateway
            .recorded_calls()
            .into_iter()
            .find(|call| call.prompt.contains(DRIFT_KEY))
            .expect("drift check should have fired");
        assert!(drift_call.prompt.contains("tweaking CSS colors"));
        assert_eq!(
            sup.status().unwrap().monitors.context_drift.drift_events,
            1
        );

        sup.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn background_drift_check_skips_sparse_sessions() {
        let gateway = MockGateway::new();
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.drift_poll_secs = 10;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        sup.submit_user_input("first").await.unwrap();
        sup.submit_user_input("second").await.unwrap();
        sup.submit_agent_output("working", false).await.unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;

        let drift_called = gateway
            .recorded_calls()
            .iter()
            .any(|call| call.prompt.contains(DRIFT_KEY));
        assert!(!drift_called);
        assert_eq!(
            sup.status().unwrap().monitors.context_drift.drift_events,
            0
        );

        sup.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn background_drift_check_stops_after_shutdown() {
        let gateway = MockGateway::new()
            .with_structured_response(LEARN_KEY, learned_goal())
            .with_structured_response(
                DRIFT_KEY,
                serde_json::json!({"drifted": false, "distance": 0.1}),
            );
        let recorder = MockRecorder::new();
        let mut config = quiet_config();
        config.drift_poll_secs = 10;
        let sup = supervisor(config, &gateway, &recorder);
        sup.start().await.unwrap();

        for i in 0..5 {
            sup.submit_user_input(&format!("prompt {i}")).await.unwrap();
        }
        sup.submit_agent_output("on track", false).await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        sup.shutdown().await.unwrap();

        let calls_after_shutdown = gateway.call_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gateway.call_count(), calls_after_shutdown);
    }
}
