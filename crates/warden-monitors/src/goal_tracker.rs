//! Goal learning and context-drift tracking.
//!
//! The tracker learns the session goal once from the earliest user prompts,
//! then compares it against recent agent activity on demand. Drift is
//! advisory; the numeric distance against the configured threshold decides,
//! not the backend's own verdict flag.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use warden_gateway::{is_sentinel, GenerationRequest, LlmGateway, Tier};
use warden_types::{clamp_distance, DetectionResult, GoalProfile};

use crate::text::truncate_chars;

/// Number of trailing actions included in a drift comparison.
const RECENT_ACTION_COUNT: usize = 20;

/// Per-action truncation in the drift prompt.
const PROMPT_ACTION_CHARS: usize = 200;

const LEARN_PROMPT_HEADER: &str =
    "Analyze these initial user prompts to extract their core goal:";

const LEARN_PROMPT_FOOTER: &str = r#"What is the user trying to build/achieve? Be concise but capture the essence.

Respond with JSON:
{
    "goal": "concise description of the core goal",
    "key_requirements": ["req1", "req2", ...],
    "technical_stack": "identified technologies if any"
}"#;

const DRIFT_PROMPT_HEADER: &str = "Compare the initial goal with recent agent actions:";

const DRIFT_PROMPT_FOOTER: &str = r#"Has the agent drifted from the core goal? Consider:
- Are recent actions aligned with the goal?
- Is the agent solving the right problem?
- Has scope crept significantly?

Respond with JSON:
{
    "drifted": true/false,
    "distance": 0.0-1.0,
    "current_trajectory": "what agent seems to be working on now",
    "recommendation": "how to get back on track if drifted"
}"#;

/// Counters reported through the supervisor status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriftStats {
    pub drift_events: usize,
    pub has_learned_goal: bool,
}

/// Tracks the learned session goal and measures drift away from it.
pub struct GoalTracker {
    gateway: Arc<dyn LlmGateway>,
    threshold: f64,
    goal: Mutex<Option<GoalProfile>>,
    drift_events: AtomicUsize,
}

impl GoalTracker {
    /// Create a tracker that flags drift once distance exceeds `threshold`.
    pub fn new(gateway: Arc<dyn LlmGateway>, threshold: f64) -> Self {
        Self {
            gateway,
            threshold,
            goal: Mutex::new(None),
            drift_events: AtomicUsize::new(0),
        }
    }

    /// Extract the session goal from the earliest user prompts.
    ///
    /// On backend failure or a malformed profile the goal stays unset so a
    /// later call can try again.
    pub async fn learn_initial_goal(&self, early_prompts: &[String]) {
        let request = GenerationRequest::new(learn_prompt(early_prompts));
        let value = match self.gateway.generate_structured(Tier::Deep, request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "goal learning failed; goal stays unset");
                return;
            }
        };
        if is_sentinel(&value) {
            tracing::warn!("goal learning returned malformed response; goal stays unset");
            return;
        }

        match serde_json::from_value::<GoalProfile>(value) {
            Ok(profile) => {
                tracing::info!(goal = %profile.goal, "learned initial session goal");
                *self.lock_goal() = Some(profile);
            }
            Err(e) => {
                tracing::warn!(error = %e, "goal profile missing required fields; goal stays unset");
            }
        }
    }

    /// Whether a goal profile has been learned for this session.
    pub fn has_learned_goal(&self) -> bool {
        self.lock_goal().is_some()
    }

    /// Clone of the learned profile, if any.
    pub fn goal_snapshot(&self) -> Option<GoalProfile> {
        self.lock_goal().clone()
    }

    /// Compare recent agent actions against the learned goal.
    ///
    /// Returns no issue when the goal is unset or `recent_actions` is empty,
    /// without touching the backend. The backend's `drifted` flag is
    /// ignored; only `distance > threshold` counts as drift.
    pub async fn check(&self, recent_actions: &[String]) -> DetectionResult {
        let profile = match self.goal_snapshot() {
            Some(profile) => profile,
            None => return DetectionResult::NoIssue,
        };
        if recent_actions.is_empty() {
            return DetectionResult::NoIssue;
        }

        let request = GenerationRequest::new(drift_prompt(&profile, recent_actions));
        let judgment = match self.gateway.generate_structured(Tier::Deep, request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "drift check failed; treating as no issue");
                return DetectionResult::NoIssue;
            }
        };
        if is_sentinel(&judgment) {
            tracing::warn!("drift check returned malformed response; treating as no issue");
            return DetectionResult::NoIssue;
        }

        let distance = judgment
            .get("distance")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        if distance > self.threshold {
            self.drift_events.fetch_add(1, Ordering::SeqCst);
            let trajectory = judgment
                .get("current_trajectory")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let recommendation = judgment
                .get("recommendation")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return DetectionResult::DriftDetected {
                distance: clamp_distance(distance),
                trajectory,
                recommendation,
            };
        }

        DetectionResult::NoIssue
    }

    /// Counters for status reporting.
    pub fn stats(&self) -> DriftStats {
        DriftStats {
            drift_events: self.drift_events.load(Ordering::SeqCst),
            has_learned_goal: self.has_learned_goal(),
        }
    }

    fn lock_goal(&self) -> std::sync::MutexGuard<'_, Option<GoalProfile>> {
        self.goal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn learn_prompt(early_prompts: &[String]) -> String {
    let listing = early_prompts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{LEARN_PROMPT_HEADER}\n\n{listing}\n\n{LEARN_PROMPT_FOOTER}")
}

fn drift_prompt(profile: &GoalProfile, recent_actions: &[String]) -> String {
    let start = recent_actions.len().saturating_sub(RECENT_ACTION_COUNT);
    let listing = recent_actions[start..]
        .iter()
        .map(|a| format!("- {}", truncate_chars(a, PROMPT_ACTION_CHARS)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{DRIFT_PROMPT_HEADER}\n\n{}\n\nRECENT ACTIONS (last 20):\n{listing}\n\n{DRIFT_PROMPT_FOOTER}",
        profile.describe()
    )
}
