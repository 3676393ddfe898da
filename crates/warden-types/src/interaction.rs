use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the conversation produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// The human driving the session.
    User,
    /// The supervised coding agent.
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// A single message observed by the supervisor.
///
/// Immutable once created. Owned by the bounded history that stores it;
/// detectors and the session log only ever see clones or references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// When the message was submitted to the supervisor.
    pub timestamp: DateTime<Utc>,
    /// Raw message text.
    pub content: String,
    /// Who produced the message.
    pub role: Role,
    /// Whether the host flagged this agent output as an error.
    pub is_error: bool,
}

impl InteractionRecord {
    /// Record a user input at the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
            role: Role::User,
            is_error: false,
        }
    }

    /// Record an agent output at the current time.
    pub fn agent(content: impl Into<String>, is_error: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
            role: Role::Agent,
            is_error,
        }
    }
}

/// An agent error captured for debug-loop analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// When the error was observed.
    pub timestamp: DateTime<Utc>,
    /// The error text as emitted by the agent.
    pub message: String,
}

impl ErrorRecord {
    /// Record an error message at the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}
