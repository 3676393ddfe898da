//! Debug-loop detection over the error history.
//!
//! Two tiers: an exact-prefix heuristic that needs no backend, then a
//! fast-tier semantic judgment for errors that differ textually but may
//! still form a loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_gateway::{is_sentinel, GenerationRequest, LlmGateway, Tier};
use warden_types::{clamp_confidence, DetectionResult, ErrorRecord};

use crate::text::truncate_chars;

/// Prefix length compared by the exact-match heuristic.
const HEURISTIC_PREFIX_CHARS: usize = 200;

/// Per-error truncation in the semantic prompt.
const PROMPT_ERROR_CHARS: usize = 300;

/// Confidence above which a semantic judgment is accepted.
const CONFIDENCE_CUTOFF: i64 = 70;

const LOOP_PROMPT_HEADER: &str = "Analyze these recent errors for repetitive patterns:";

const LOOP_PROMPT_FOOTER: &str = r#"Are these errors indicating the agent is stuck in a debug loop?
Consider:
- Similar error messages
- Same failed approach repeated
- No progress between attempts

Respond with JSON:
{
    "in_loop": true/false,
    "pattern": "description of the loop pattern if detected",
    "confidence": 0-100
}"#;

/// Counters reported through the supervisor status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebugLoopStats {
    pub total_detections: usize,
}

/// Detects when the agent is stuck repeating a failing approach.
pub struct DebugLoopDetector {
    gateway: Arc<dyn LlmGateway>,
    window: usize,
    detections: AtomicUsize,
}

impl DebugLoopDetector {
    /// Create a detector examining the last `window` errors per check.
    pub fn new(gateway: Arc<dyn LlmGateway>, window: usize) -> Self {
        Self {
            gateway,
            window,
            detections: AtomicUsize::new(0),
        }
    }

    /// Check whether the recent errors form a repetitive loop.
    ///
    /// Histories shorter than the window return no issue without touching
    /// the backend, as does a window of identical error prefixes (in the
    /// positive direction). Backend failures degrade to no issue.
    pub async fn check(&self, error_history: &[ErrorRecord]) -> DetectionResult {
        if error_history.len() < self.window {
            return DetectionResult::NoIssue;
        }

        let recent = &error_history[error_history.len() - self.window..];

        // Exact-prefix heuristic: identical errors need no semantic check.
        let first = truncate_chars(&recent[0].message, HEURISTIC_PREFIX_CHARS);
        if recent
            .iter()
            .all(|e| truncate_chars(&e.message, HEURISTIC_PREFIX_CHARS) == first)
        {
            self.detections.fetch_add(1, Ordering::SeqCst);
            return DetectionResult::LoopDetected {
                pattern: "identical errors repeated".to_string(),
                count: self.window,
                confidence: 100,
            };
        }

        let request = GenerationRequest::new(loop_analysis_prompt(recent));
        let judgment = match self.gateway.generate_structured(Tier::Fast, request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "debug-loop check failed; treating as no issue");
                return DetectionResult::NoIssue;
            }
        };
        if is_sentinel(&judgment) {
            tracing::warn!("debug-loop check returned malformed response; treating as no issue");
            return DetectionResult::NoIssue;
        }

        let in_loop = judgment
            .get("in_loop")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let confidence = judgment
            .get("confidence")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        if in_loop && confidence > CONFIDENCE_CUTOFF {
            self.detections.fetch_add(1, Ordering::SeqCst);
            let pattern = judgment
                .get("pattern")
                .and_then(|v| v.as_str())
                .unwrap_or("repetitive error pattern")
                .to_string();
            return DetectionResult::LoopDetected {
                pattern,
                count: self.window,
                confidence: clamp_confidence(confidence),
            };
        }

        DetectionResult::NoIssue
    }

    /// Counters for status reporting.
    pub fn stats(&self) -> DebugLoopStats {
        DebugLoopStats {
            total_detections: self.detections.load(Ordering::SeqCst),
        }
    }
}

fn loop_analysis_prompt(recent: &[ErrorRecord]) -> String {
    let listing = recent
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, truncate_chars(&e.message, PROMPT_ERROR_CHARS)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{LOOP_PROMPT_HEADER}\n\n{listing}\n\n{LOOP_PROMPT_FOOTER}")
}
