//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::Arc;

use warden::{Supervisor, SupervisorConfig};
use warden_harness::{MockGateway, MockRecorder};

/// Prompt fragments that route a scripted response to exactly one
/// monitor. Each is unique to the prompt template of that monitor.
pub const GATE_KEY: &str = "Rate this coding prompt";
pub const GOAL_KEY: &str = "extract their core goal";
pub const DRIFT_KEY: &str = "recent agent actions";
pub const LOOP_KEY: &str = "repetitive patterns";
pub const SYCOPHANCY_KEY: &str = "sycophantic behavior";
pub const PIVOT_KEY: &str = "stuck in a debug loop";

/// Supervisor configuration with the background drift poll pushed out of
/// the way and the prompt gate off. Tests opt back in per field.
pub fn quiet_config() -> SupervisorConfig {
    let mut config = SupervisorConfig::default();
    config.drift_poll_secs = 3600;
    config.gate_prompts = false;
    config
}

/// Build a supervisor over the given mocks.
pub fn supervisor_with(
    config: SupervisorConfig,
    gateway: &MockGateway,
    recorder: &MockRecorder,
) -> Supervisor {
    Supervisor::with_parts(config, Arc::new(gateway.clone()), Arc::new(recorder.clone()))
        .expect("should build supervisor from test config")
}

/// Gate scores comfortably above the standard cutoffs.
pub fn gate_pass() -> serde_json::Value {
    serde_json::json!({
        "specificity": 9,
        "completeness": 8,
        "ambiguity": 1
    })
}

/// Gate scores below the standard cutoffs, with actionable feedback.
pub fn gate_fail(feedback: &str) -> serde_json::Value {
    serde_json::json!({
        "specificity": 3,
        "completeness": 4,
        "ambiguity": 8,
        "feedback": feedback,
        "suggestions": ["name the file or module to change", "state the expected behavior"]
    })
}

/// A learned goal profile about building a REST API.
pub fn rest_api_goal() -> serde_json::Value {
    serde_json::json!({
        "goal": "Build a REST API with JWT authentication",
        "key_requirements": ["JWT auth", "user endpoints"],
        "technical_stack": "Rust"
    })
}

/// A drift report clearly past the default threshold.
pub fn drift_report(distance: f64, trajectory: &str) -> serde_json::Value {
    serde_json::json!({
        "drifted": distance > 0.7,
        "distance": distance,
        "current_trajectory": trajectory,
        "recommendation": "return to the API endpoints before polishing anything else"
    })
}

/// A semantic loop judgment.
pub fn loop_judgment(in_loop: bool) -> serde_json::Value {
    serde_json::json!({
        "in_loop": in_loop,
        "pattern": "same failing approach with cosmetic changes",
        "confidence": 95
    })
}

/// A pivot analysis with every field populated.
pub fn pivot_plan() -> serde_json::Value {
    serde_json::json!({
        "root_cause": "the build cache is stale",
        "failed_approaches": ["re-running the same install command"],
        "pivot_strategy": "clear the cache and rebuild from a clean tree",
        "specific_actions": ["delete the cache directory", "rebuild"],
        "confidence": 85
    })
}
