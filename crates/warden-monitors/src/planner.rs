//! Intervention planning for confirmed debug loops.
//!
//! When the supervisor decides to step in, the planner asks the deep tier
//! for a root-cause analysis and a pivot strategy, optionally augmented
//! with backend-side research. Planning never fails the caller: malformed
//! or unreachable backends degrade to placeholder fields, and the
//! intervention sequence number advances exactly once per call regardless.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use warden_gateway::{is_sentinel, GenerationRequest, LlmGateway, Tier};
use warden_types::{
    clamp_confidence, AlternativeApproach, ErrorRecord, InteractionRecord, InterventionRecord,
};

use crate::text::truncate_chars;

/// Trailing session entries included in the pivot analysis.
const CONTEXT_ENTRY_COUNT: usize = 10;

/// Trailing errors included in the pivot analysis.
const CONTEXT_ERROR_COUNT: usize = 5;

/// Per-entry truncation in the pivot prompt.
const CONTEXT_ENTRY_CHARS: usize = 300;

/// Truncation applied to the agent response quoted in the critical-thinking prompt.
const RESPONSE_CHARS: usize = 500;

/// Temperature for the open-ended critical-thinking generation.
const CRITICAL_THINKING_TEMPERATURE: f64 = 0.8;

const PIVOT_PROMPT_HEADER: &str = "You are analyzing a coding agent stuck in a debug loop.";

const PIVOT_PROMPT_FOOTER: &str = r#"Tasks:
1. Identify the root cause of the loop
2. Determine what the agent has tried that failed
3. Suggest a completely different approach (not just tweaks)
4. If needed, search for similar solved problems

Provide:
{
    "root_cause": "why the agent is stuck",
    "failed_approaches": ["what has been tried"],
    "pivot_strategy": "fundamentally different approach to try",
    "specific_actions": ["step 1", "step 2", ...],
    "confidence": 0-100
}

Respond with JSON only."#;

const PLANNER_SYSTEM_INSTRUCTION: &str = r#"You are a senior debugging expert analyzing why coding agents get stuck.
You excel at identifying root causes and suggesting pivots that break patterns.
Always think: "What haven't they tried yet?"
When using grounding, search for: "how to solve [specific error]" or "alternative approaches to [problem]"."#;

const ALTERNATIVES_PROMPT_HEADER: &str = "Given this problem and current approach:";

const ALTERNATIVES_PROMPT_FOOTER: &str = r#"Generate 3 completely different approaches. Think outside the box.

Respond with JSON:
{
    "alternatives": [
        {"name": "approach name", "description": "how it works", "tradeoffs": "pros/cons"},
        ...
    ]
}"#;

const CRITICAL_THINKING_HEADER: &str = "The agent gave this response:";

const CRITICAL_THINKING_FOOTER: &str = r#"Generate a follow-up prompt that forces the agent to:
1. List 3 potential problems with their approach
2. Consider what could go wrong
3. Suggest one alternative

Respond with just the prompt text (no JSON)."#;

/// Prompt injected when the backend cannot generate a tailored one.
const CRITICAL_THINKING_FALLBACK: &str = "Before continuing: list 3 potential problems with \
your current approach, describe what could go wrong, and suggest one alternative.";

/// Plans pivots out of stuck states using the deep tier.
pub struct InterventionPlanner {
    gateway: Arc<dyn LlmGateway>,
    enable_research: bool,
    sequence: AtomicU32,
}

impl InterventionPlanner {
    pub fn new(gateway: Arc<dyn LlmGateway>, enable_research: bool) -> Self {
        Self {
            gateway,
            enable_research,
            sequence: AtomicU32::new(0),
        }
    }

    /// Analyze a stuck state and produce a pivot plan.
    ///
    /// The sequence number advances first so interventions stay strictly
    /// ordered even when the analysis itself degrades to placeholders.
    pub async fn analyze_and_pivot(
        &self,
        session_history: &[InteractionRecord],
        error_sequence: &[ErrorRecord],
        use_research: bool,
    ) -> InterventionRecord {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let request = GenerationRequest::new(pivot_prompt(session_history, error_sequence))
            .with_system_instruction(PLANNER_SYSTEM_INSTRUCTION)
            .with_research(use_research);

        let analysis = match self.gateway.generate_structured(Tier::Deep, request).await {
            Ok(value) if !is_sentinel(&value) => value,
            Ok(_) => {
                tracing::warn!(sequence, "pivot analysis returned malformed response");
                serde_json::Value::Null
            }
            Err(e) => {
                tracing::warn!(sequence, error = %e, "pivot analysis failed");
                serde_json::Value::Null
            }
        };

        InterventionRecord {
            sequence,
            root_cause: string_field(&analysis, "root_cause", "Unknown"),
            failed_approaches: string_list(&analysis, "failed_approaches"),
            pivot_strategy: string_field(&analysis, "pivot_strategy", "Try a different approach"),
            actions: string_list(&analysis, "specific_actions"),
            confidence: clamp_confidence(
                analysis
                    .get("confidence")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0),
            ),
        }
    }

    /// Generate materially different approaches to the same problem.
    ///
    /// Returns an empty list when the backend fails or the response does
    /// not carry a well-formed `alternatives` array.
    pub async fn suggest_alternative_approaches(
        &self,
        current_approach: &str,
        problem: &str,
    ) -> Vec<AlternativeApproach> {
        let prompt = format!(
            "{ALTERNATIVES_PROMPT_HEADER}\n\nPROBLEM: {problem}\n\nCURRENT APPROACH: {current_approach}\n\n{ALTERNATIVES_PROMPT_FOOTER}"
        );
        let request = GenerationRequest::new(prompt).with_research(self.enable_research);

        let value = match self.gateway.generate_structured(Tier::Deep, request).await {
            Ok(value) if !is_sentinel(&value) => value,
            Ok(_) => {
                tracing::warn!("alternative suggestion returned malformed response");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "alternative suggestion failed");
                return Vec::new();
            }
        };

        match value.get("alternatives") {
            Some(list) => serde_json::from_value(list.clone()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "alternatives list had unexpected shape");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Generate a follow-up prompt that pushes the agent to self-critique.
    ///
    /// Falls back to a fixed prompt when the backend is unreachable.
    pub async fn force_critical_thinking(&self, agent_response: &str) -> String {
        let quoted = truncate_chars(agent_response, RESPONSE_CHARS);
        let prompt =
            format!("{CRITICAL_THINKING_HEADER}\n\n\"{quoted}\"\n\n{CRITICAL_THINKING_FOOTER}");
        let request = GenerationRequest::new(prompt)
            .with_temperature(CRITICAL_THINKING_TEMPERATURE);

        match self.gateway.generate_text(Tier::Deep, request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "critical-thinking prompt generation failed; using fallback");
                CRITICAL_THINKING_FALLBACK.to_string()
            }
        }
    }
}

/// Render an intervention as the suggestion text handed back to the host.
pub fn format_pivot_message(record: &InterventionRecord) -> String {
    let failed = record
        .failed_approaches
        .iter()
        .map(|a| format!("  - {a}"))
        .collect::<Vec<_>>()
        .join("\n");
    let actions = record
        .actions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("  {}. {a}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "[warden] intervention #{}\n\nROOT CAUSE: {}\n\nFAILED APPROACHES:\n{failed}\n\nPIVOT STRATEGY: {}\n\nRECOMMENDED ACTIONS:\n{actions}\n\nConfidence: {}%",
        record.sequence, record.root_cause, record.pivot_strategy, record.confidence
    )
}

fn pivot_prompt(session_history: &[InteractionRecord], error_sequence: &[ErrorRecord]) -> String {
    let ctx_start = session_history.len().saturating_sub(CONTEXT_ENTRY_COUNT);
    let recent_context = session_history[ctx_start..]
        .iter()
        .map(|entry| {
            format!(
                "[{}] {}",
                entry.timestamp.to_rfc3339(),
                truncate_chars(&entry.content, CONTEXT_ENTRY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let err_start = error_sequence.len().saturating_sub(CONTEXT_ERROR_COUNT);
    let error_context = error_sequence[err_start..]
        .iter()
        .enumerate()
        .map(|(i, err)| {
            format!(
                "Error {}: {}",
                i + 1,
                truncate_chars(&err.message, CONTEXT_ENTRY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{PIVOT_PROMPT_HEADER}\n\nRECENT SESSION CONTEXT:\n{recent_context}\n\nERROR SEQUENCE (repeating pattern):\n{error_context}\n\n{PIVOT_PROMPT_FOOTER}"
    )
}

fn string_field(value: &serde_json::Value, field: &str, missing: &str) -> String {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or(missing)
        .to_string()
}

fn string_list(value: &serde_json::Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_harness::MockGateway;

    fn history(n: usize) -> Vec<InteractionRecord> {
        (0..n)
            .map(|i| InteractionRecord::agent(format!("entry {i}"), false))
            .collect()
    }

    fn errors(n: usize) -> Vec<ErrorRecord> {
        (0..n).map(|i| ErrorRecord::new(format!("failure {i}"))).collect()
    }

    #[tokio::test]
    async fn successful_pivot_parses_all_fields() {
        let gateway = Arc::new(MockGateway::new().with_structured_response(
            "stuck in a debug loop",
            serde_json::json!({
                "root_cause": "stale build cache",
                "failed_approaches": ["rerunning the same build", "editing unrelated files"],
                "pivot_strategy": "clean the cache and rebuild from scratch",
                "specific_actions": ["delete target/", "run a fresh build"],
                "confidence": 85
            }),
        ));
        let planner = InterventionPlanner::new(gateway, true);

        let record = planner
            .analyze_and_pivot(&history(3), &errors(3), true)
            .await;

        assert_eq!(record.sequence, 1);
        assert_eq!(record.root_cause, "stale build cache");
        assert_eq!(record.failed_approaches.len(), 2);
        assert_eq!(record.pivot_strategy, "clean the cache and rebuild from scratch");
        assert_eq!(record.actions.len(), 2);
        assert_eq!(record.confidence, 85);
    }

    #[tokio::test]
    async fn sequence_increases_across_malformed_responses() {
        let gateway = Arc::new(MockGateway::new().failing());
        let planner = InterventionPlanner::new(gateway, false);

        let first = planner.analyze_and_pivot(&history(2), &errors(2), false).await;
        let second = planner.analyze_and_pivot(&history(2), &errors(2), false).await;
        let third = planner.analyze_and_pivot(&history(2), &errors(2), false).await;

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(third.sequence, 3);
    }

    #[tokio::test]
    async fn malformed_analysis_degrades_to_placeholders() {
        let gateway = Arc::new(MockGateway::new().with_text_response("no idea"));
        let planner = InterventionPlanner::new(gateway, false);

        let record = planner.analyze_and_pivot(&history(2), &errors(2), false).await;

        assert_eq!(record.root_cause, "Unknown");
        assert!(record.failed_approaches.is_empty());
        assert_eq!(record.pivot_strategy, "Try a different approach");
        assert!(record.actions.is_empty());
        assert_eq!(record.confidence, 0);
    }

    #[tokio::test]
    async fn pivot_prompt_windows_context_and_errors() {
        let gateway = Arc::new(MockGateway::new().with_structured_response(
            "stuck in a debug loop",
            serde_json::json!({"root_cause": "x"}),
        ));
        let planner = InterventionPlanner::new(gateway.clone(), true);

        planner.analyze_and_pivot(&history(15), &errors(8), true).await;

        let calls = gateway.recorded_calls();
        let prompt = &calls[0].prompt;
        assert!(prompt.contains("RECENT SESSION CONTEXT:"));
        assert!(prompt.contains("entry 14"));
        assert!(prompt.contains("entry 5"));
        assert!(!prompt.contains("entry 4\n"));
        assert!(prompt.contains("Error 1: failure 3"));
        assert!(prompt.contains("Error 5: failure 7"));
        assert!(!prompt.contains("failure 2"));
    }

    #[tokio::test]
    async fn pivot_carries_system_instruction_and_research_flag() {
        let gateway = Arc::new(MockGateway::new().with_structured_response(
            "stuck in a debug loop",
            serde_json::json!({"root_cause": "x"}),
        ));
        let planner = InterventionPlanner::new(gateway.clone(), true);

        planner.analyze_and_pivot(&history(1), &errors(1), true).await;

        let calls = gateway.recorded_calls();
        assert_eq!(calls[0].tier, Tier::Deep);
        assert!(calls[0]
            .system_instruction
            .as_deref()
            .unwrap_or_default()
            .contains("senior debugging expert"));
        assert!(calls[0].research_augmented);
    }

    #[tokio::test]
    async fn research_flag_can_be_disabled_per_call() {
        let gateway = Arc::new(MockGateway::new().with_structured_response(
            "stuck in a debug loop",
            serde_json::json!({"root_cause": "x"}),
        ));
        let planner = InterventionPlanner::new(gateway.clone(), true);

        planner.analyze_and_pivot(&history(1), &errors(1), false).await;

        let calls = gateway.recorded_calls();
        assert!(!calls[0].research_augmented);
    }

    #[tokio::test]
    async fn format_pivot_message_renders_block() {
        let record = InterventionRecord {
            sequence: 2,
            root_cause: "wrong database URL".into(),
            failed_approaches: vec!["retrying the connection".into()],
            pivot_strategy: "read the URL from the environment".into(),
            actions: vec!["add dotenv loading".into(), "verify with psql".into()],
            confidence: 90,
        };

        let msg = format_pivot_message(&record);
        assert!(msg.starts_with("[warden] intervention #2"));
        assert!(msg.contains("ROOT CAUSE: wrong database URL"));
        assert!(msg.contains("  - retrying the connection"));
        assert!(msg.contains("PIVOT STRATEGY: read the URL from the environment"));
        assert!(msg.contains("  1. add dotenv loading"));
        assert!(msg.contains("  2. verify with psql"));
        assert!(msg.contains("Confidence: 90%"));
    }

    #[tokio::test]
    async fn alternatives_parse_into_typed_list() {
        let gateway = Arc::new(MockGateway::new().with_structured_response(
            "completely different approaches",
            serde_json::json!({
                "alternatives": [
                    {"name": "event sourcing", "description": "log every change", "tradeoffs": "replay cost"},
                    {"name": "polling", "description": "check on a timer", "tradeoffs": "latency"},
                ]
            }),
        ));
        let planner = InterventionPlanner::new(gateway, true);

        let alts = planner
            .suggest_alternative_approaches("direct writes", "state sync keeps corrupting")
            .await;

        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].name, "event sourcing");
        assert_eq!(alts[1].tradeoffs, "latency");
    }

    #[tokio::test]
    async fn alternatives_empty_on_backend_failure() {
        let gateway = Arc::new(MockGateway::new().failing());
        let planner = InterventionPlanner::new(gateway, true);

        let alts = planner
            .suggest_alternative_approaches("direct writes", "state sync keeps corrupting")
            .await;
        assert!(alts.is_empty());
    }

    #[tokio::test]
    async fn critical_thinking_uses_high_temperature_plain_text() {
        let gateway = Arc::new(
            MockGateway::new().with_text_response("What are three ways this could fail?"),
        );
        let planner = InterventionPlanner::new(gateway.clone(), false);

        let follow_up = planner
            .force_critical_thinking("I added the endpoint and everything works.")
            .await;

        assert_eq!(follow_up, "What are three ways this could fail?");
        let calls = gateway.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert!((calls[0].temperature - 0.8).abs() < f64::EPSILON);
        assert!(calls[0].prompt.contains("no JSON"));
    }

    #[tokio::test]
    async fn critical_thinking_falls_back_when_backend_fails() {
        let gateway = Arc::new(MockGateway::new().failing());
        let planner = InterventionPlanner::new(gateway, false);

        let follow_up = planner.force_critical_thinking("All done.").await;
        assert!(follow_up.contains("3 potential problems"));
    }
}
