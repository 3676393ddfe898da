//! Prompt quality gating before user input reaches the agent.
//!
//! The gate asks the deep tier to score a prompt against a fixed rubric.
//! An explicit backend approval is honored as-is; the threshold rule only
//! applies when the backend returns scores without a verdict. A gate that
//! cannot reach the backend approves, never blocks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_gateway::{is_sentinel, GenerationRequest, LlmGateway, Tier};
use warden_types::GateThresholds;

const GATE_PROMPT_HEADER: &str = "Rate this coding prompt for quality:";

const GATE_PROMPT_FOOTER: &str = r#"Evaluate:
1. Specificity (0-10): Are requirements clear and specific?
2. Completeness (0-10): Is all necessary context provided?
3. Ambiguity (0-10): How much is left to interpretation? (lower is better)

A good prompt scores 6+ on specificity and completeness, and below 5 on ambiguity.

Respond with JSON:
{
    "specificity": 0-10,
    "completeness": 0-10,
    "ambiguity": 0-10,
    "approved": true/false,
    "feedback": "constructive feedback if not approved",
    "suggestions": ["specific improvement 1", "improvement 2"]
}"#;

/// Rubric scores and verdict for one user prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptAnalysis {
    pub specificity: u8,
    pub completeness: u8,
    pub ambiguity: u8,
    pub approved: bool,
    pub feedback: Option<String>,
    pub suggestions: Vec<String>,
}

impl PromptAnalysis {
    /// Analysis used when the backend cannot be consulted.
    fn fail_open() -> Self {
        Self {
            specificity: 0,
            completeness: 0,
            ambiguity: 0,
            approved: true,
            feedback: None,
            suggestions: Vec::new(),
        }
    }
}

/// Scores user prompts for clarity before they reach the agent.
pub struct QualityGate {
    gateway: Arc<dyn LlmGateway>,
    thresholds: GateThresholds,
}

impl QualityGate {
    pub fn new(gateway: Arc<dyn LlmGateway>, thresholds: GateThresholds) -> Self {
        Self {
            gateway,
            thresholds,
        }
    }

    /// Score a user prompt against the rubric.
    ///
    /// Backend failure or a malformed response approves the prompt;
    /// supervision must not block the user when the backend is down.
    pub async fn analyze(&self, user_prompt: &str) -> PromptAnalysis {
        let request = GenerationRequest::new(gate_prompt(user_prompt));
        let judgment = match self.gateway.generate_structured(Tier::Deep, request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "prompt gate check failed; approving");
                return PromptAnalysis::fail_open();
            }
        };
        if is_sentinel(&judgment) {
            tracing::warn!("prompt gate returned malformed response; approving");
            return PromptAnalysis::fail_open();
        }

        let specificity = score(&judgment, "specificity", 0);
        let completeness = score(&judgment, "completeness", 0);
        let ambiguity = score(&judgment, "ambiguity", 10);

        let approved = match judgment.get("approved").and_then(|v| v.as_bool()) {
            Some(verdict) => verdict,
            None => self.thresholds.approves(specificity, completeness, ambiguity),
        };

        let feedback = judgment
            .get("feedback")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let suggestions = judgment
            .get("suggestions")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        PromptAnalysis {
            specificity,
            completeness,
            ambiguity,
            approved,
            feedback,
            suggestions,
        }
    }
}

fn score(judgment: &serde_json::Value, field: &str, missing: i64) -> u8 {
    judgment
        .get(field)
        .and_then(|v| v.as_i64())
        .unwrap_or(missing)
        .clamp(0, 10) as u8
}

fn gate_prompt(user_prompt: &str) -> String {
    format!("{GATE_PROMPT_HEADER}\n\n\"{user_prompt}\"\n\n{GATE_PROMPT_FOOTER}")
}
