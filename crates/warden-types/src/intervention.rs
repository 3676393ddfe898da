use serde::{Deserialize, Serialize};

/// A pivot plan produced after a confirmed debug loop.
///
/// Sequence numbers are monotonic per session starting at 1 and increment
/// exactly once per planner call, including calls where the backend
/// response was malformed and the remaining fields fell back to
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterventionRecord {
    /// Per-session sequence number, starting at 1.
    pub sequence: u32,
    /// Diagnosed root cause of the loop.
    pub root_cause: String,
    /// Approaches already attempted that did not work.
    pub failed_approaches: Vec<String>,
    /// The materially different strategy to try next.
    pub pivot_strategy: String,
    /// Concrete steps implementing the pivot, in order.
    pub actions: Vec<String>,
    /// Backend confidence in the plan, 0-100.
    pub confidence: u8,
}

/// One alternative approach proposed for a stuck problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlternativeApproach {
    /// Short label for the approach.
    pub name: String,
    /// What the approach involves.
    pub description: String,
    /// Costs and benefits relative to the current approach.
    pub tradeoffs: String,
}
