//! Error types shared across all Warden crates.

/// Errors that can occur across the Warden supervision engine.
///
/// Each variant corresponds to a different subsystem: configuration,
/// the inference backend, structured-response parsing, the session
/// recorder, or supervisor lifecycle management.
///
/// Detector-level backend failures are recovered internally (the engine
/// degrades to "no detection") and never reach the host through these
/// variants; they exist so the recovery sites have something typed to
/// log and match on.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("invalid structured response: {raw}")]
    MalformedResponse { raw: String },

    #[error("session recorder error: {0}")]
    RecorderError(String),

    #[error("supervisor lifecycle error: {0}")]
    Lifecycle(String),
}
