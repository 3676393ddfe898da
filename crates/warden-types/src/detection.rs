use serde::{Deserialize, Serialize};

/// The outcome of a single detector check.
///
/// Produced by the debug-loop, drift, and sycophancy detectors and matched
/// exhaustively by the supervisor. Confidence and distance values are
/// clamped into their declared ranges before a variant is constructed, so
/// consumers can rely on the bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionResult {
    /// Nothing suspicious in the checked records.
    NoIssue,
    /// The agent is repeating a failing approach.
    LoopDetected {
        /// Description of the repeating pattern.
        pattern: String,
        /// Number of errors in the examined window.
        count: usize,
        /// Detection confidence, 0-100. The heuristic tier reports 100.
        confidence: u8,
    },
    /// Recent activity has diverged from the learned goal.
    DriftDetected {
        /// Semantic distance from the goal, 0.0 (aligned) to 1.0 (unrelated).
        distance: f64,
        /// What the agent currently appears to be working toward.
        trajectory: String,
        /// Suggested correction.
        recommendation: String,
    },
    /// The agent is agreeing without critical evaluation.
    SycophancyDetected {
        /// Why the output was judged sycophantic.
        reason: String,
        /// Detection confidence, 0-100.
        confidence: u8,
    },
}

impl DetectionResult {
    /// Whether this result represents a detected problem.
    pub fn is_issue(&self) -> bool {
        !matches!(self, DetectionResult::NoIssue)
    }
}

/// Clamp a backend-reported confidence value into 0-100.
pub fn clamp_confidence(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Clamp a backend-reported distance into [0.0, 1.0]. NaN maps to 0.0.
pub fn clamp_distance(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_serialization_roundtrip() {
        let result = DetectionResult::LoopDetected {
            pattern: "identical errors repeated".into(),
            count: 5,
            confidence: 100,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"kind\":\"loop_detected\""));
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn no_issue_is_not_an_issue() {
        assert!(!DetectionResult::NoIssue.is_issue());
        assert!(DetectionResult::SycophancyDetected {
            reason: "excessive agreement patterns (3 found)".into(),
            confidence: 90,
        }
        .is_issue());
    }

    #[test]
    fn confidence_clamped_to_range() {
        assert_eq!(clamp_confidence(-5), 0);
        assert_eq!(clamp_confidence(42), 42);
        assert_eq!(clamp_confidence(250), 100);
    }

    #[test]
    fn distance_clamped_to_unit_interval() {
        assert_eq!(clamp_distance(-0.3), 0.0);
        assert_eq!(clamp_distance(0.85), 0.85);
        assert_eq!(clamp_distance(7.0), 1.0);
        assert_eq!(clamp_distance(f64::NAN), 0.0);
    }
}
