use serde::{Deserialize, Serialize};

/// The learned profile of what the user originally asked for.
///
/// Extracted once per session by the goal tracker from the first few user
/// prompts, then held immutable and compared against recent agent activity
/// to measure drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalProfile {
    /// One-sentence statement of the core goal.
    pub goal: String,
    /// Key requirements extracted from the prompts.
    #[serde(default)]
    pub key_requirements: Vec<String>,
    /// Technologies the user mentioned, if any.
    pub technical_stack: Option<String>,
}

impl GoalProfile {
    /// Render the profile for inclusion in a drift-comparison prompt.
    pub fn describe(&self) -> String {
        let mut out = format!("INITIAL GOAL:\n{}", self.goal);
        if !self.key_requirements.is_empty() {
            out.push_str(&format!(
                "\nKey requirements: {}",
                self.key_requirements.join(", ")
            ));
        }
        if let Some(stack) = &self.technical_stack {
            out.push_str(&format!("\nTechnical stack: {stack}"));
        }
        out
    }
}
