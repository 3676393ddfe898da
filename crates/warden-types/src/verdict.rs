use serde::{Deserialize, Serialize};

/// The supervisor's decision on a user prompt before it reaches the agent.
///
/// A rejected verdict is a value, not an error: the host relays the
/// feedback to the user and waits for a better prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptVerdict {
    /// Whether the prompt may be forwarded to the agent.
    pub approved: bool,
    /// Why the prompt was rejected, when it was.
    pub feedback: Option<String>,
    /// Concrete improvements for a rejected prompt.
    pub suggestions: Vec<String>,
}

impl PromptVerdict {
    /// A verdict that lets the prompt through unchanged.
    pub fn approved() -> Self {
        Self {
            approved: true,
            feedback: None,
            suggestions: Vec::new(),
        }
    }

    /// A verdict that blocks the prompt with feedback.
    pub fn rejected(feedback: Option<String>, suggestions: Vec<String>) -> Self {
        Self {
            approved: false,
            feedback,
            suggestions,
        }
    }
}

/// The supervisor's decisions after observing one agent output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputVerdict {
    /// Whether the host should terminate the agent.
    pub kill_agent: bool,
    /// Human-readable warnings about detected failure modes.
    pub warnings: Vec<String>,
    /// Corrective suggestions, including formatted pivot plans.
    pub suggestions: Vec<String>,
}

impl OutputVerdict {
    /// Whether this verdict carries anything the host must act on.
    pub fn requires_attention(&self) -> bool {
        self.kill_agent || !self.warnings.is_empty()
    }
}
