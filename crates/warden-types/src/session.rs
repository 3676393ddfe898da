//! The session log and the recorder boundary.
//!
//! The supervisor appends one entry per observed agent output; entries
//! whose verdict carries warnings or a kill are also tracked in a separate
//! interventions list. On shutdown the whole log is handed to a
//! [`SessionRecorder`] for persistence.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::interaction::InteractionRecord;
use crate::verdict::OutputVerdict;

/// One supervised interaction: the output just observed, the user input
/// that preceded it, and what the supervisor decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    /// When the entry was logged.
    pub timestamp: DateTime<Utc>,
    /// The most recent user input at the time, if any.
    pub user_input: Option<InteractionRecord>,
    /// The agent output that triggered this entry.
    pub agent_output: Option<InteractionRecord>,
    /// The supervisor's decisions for this output.
    pub interventions: OutputVerdict,
}

/// Append-only record of everything the supervisor observed in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    /// Every logged interaction, in order.
    pub entries: Vec<SessionEntry>,
    /// The subset of entries whose verdict required attention.
    pub interventions: Vec<SessionEntry>,
}

impl SessionLog {
    pub fn new(session_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at,
            entries: Vec::new(),
            interventions: Vec::new(),
        }
    }

    /// Append an entry, tracking it separately when it required attention.
    pub fn log_interaction(&mut self, entry: SessionEntry) {
        if entry.interventions.requires_attention() {
            self.interventions.push(entry.clone());
        }
        self.entries.push(entry);
    }

    /// Build the document shape written to disk.
    pub fn document(&self, ended_at: DateTime<Utc>) -> SessionDocument {
        SessionDocument {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at,
            total_interactions: self.entries.len(),
            total_interventions: self.interventions.len(),
            interactions: self.entries.clone(),
            interventions: self.interventions.clone(),
        }
    }
}

/// The serialized form of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_interactions: usize,
    pub total_interventions: usize,
    pub interactions: Vec<SessionEntry>,
    pub interventions: Vec<SessionEntry>,
}

/// Sink for completed session logs.
///
/// Implementations return the location the log was written to.
pub trait SessionRecorder: Send + Sync {
    fn record(&self, log: &SessionLog) -> Result<PathBuf, WardenError>;
}
