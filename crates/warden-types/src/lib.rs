//! Core types shared across all Warden crates.
//!
//! Defines interaction records, bounded histories, detection results,
//! intervention records, configuration, and error types used by the
//! detectors, the gateway, and the supervisor.

pub mod config;
pub mod detection;
pub mod error;
pub mod goal;
pub mod history;
pub mod interaction;
pub mod intervention;
pub mod session;
pub mod verdict;

pub use config::{
    mask_sensitive, validate_endpoint_url, GatePreset, GateThresholds, GatewayConfig,
    SupervisorConfig, DEFAULT_API_KEY_ENV, DEFAULT_DEEP_MODEL, DEFAULT_FAST_MODEL,
    DEFAULT_GEMINI_ENDPOINT, FALLBACK_API_KEY_ENV,
};
pub use detection::{clamp_confidence, clamp_distance, DetectionResult};
pub use error::WardenError;
pub use goal::GoalProfile;
pub use history::BoundedHistory;
pub use interaction::{ErrorRecord, InteractionRecord, Role};
pub use intervention::{AlternativeApproach, InterventionRecord};
pub use session::{SessionDocument, SessionEntry, SessionLog, SessionRecorder};
pub use verdict::{OutputVerdict, PromptVerdict};
