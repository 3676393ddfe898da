//! Warden supervises coding-agent sessions.
//!
//! A host forwards each user prompt and each agent reply to a
//! [`Supervisor`]; Warden gates low-quality prompts, learns the user's
//! goal from the opening prompts, and watches the agent's output for
//! debug loops, sycophancy, and drift away from that goal. Confirmed
//! stuck states produce a pivot plan the host can inject back into the
//! conversation, and the whole session is written to a JSON log on
//! shutdown.
//!
//! Detection runs in two tiers. Cheap deterministic checks (repeated
//! error signatures, agreement-phrase counts) come first; only when they
//! are inconclusive does Warden ask the configured LLM backend for a
//! semantic judgement, on the fast tier for classification and the deep
//! tier for pivot planning.
//!
//! # Example
//!
//! ```no_run
//! use warden::{Supervisor, SupervisorConfig};
//!
//! # async fn run() -> Result<(), warden::WardenError> {
//! let supervisor = Supervisor::new(SupervisorConfig::default())?;
//! supervisor.start().await?;
//!
//! let verdict = supervisor.submit_user_input("Add JWT auth to the API").await?;
//! if verdict.approved {
//!     let check = supervisor
//!         .submit_agent_output("Added auth middleware in src/auth.rs", false)
//!         .await?;
//!     for warning in &check.warnings {
//!         eprintln!("{warning}");
//!     }
//! }
//!
//! supervisor.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The member crates are re-exported here so hosts depend on `warden`
//! alone: `warden-types` (configuration, verdicts, session log),
//! `warden-monitors` (the detectors and the planner), `warden-gateway`
//! (the Gemini backend), and `warden-core` (the engine).

pub use warden_core::{JsonFileRecorder, MonitorStats, Supervisor, SupervisorStatus};
pub use warden_gateway::{GeminiClient, GenerationRequest, LlmGateway, Tier};
pub use warden_monitors::{
    DebugLoopDetector, GoalTracker, InterventionPlanner, QualityGate, SycophancyDetector,
};
pub use warden_types::{
    DetectionResult, GatePreset, GatewayConfig, OutputVerdict, PromptVerdict, SessionDocument,
    SessionLog, SessionRecorder, SupervisorConfig, WardenError,
};

pub use warden_core as core;
pub use warden_gateway as gateway;
pub use warden_monitors as monitors;
pub use warden_types as types;
