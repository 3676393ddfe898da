//! The supervision engine for coding-agent sessions.
//!
//! Wires the detectors, the intervention planner, the quality gate, and
//! the session log into one [`Supervisor`] that the host drives through
//! four operations: start, submit user input, submit agent output, and
//! shutdown. A background task polls for context drift while the session
//! runs.
//!
//! - [`supervisor`]: the engine and its lifecycle
//! - [`recorder`]: the filesystem session recorder

pub mod recorder;
pub mod supervisor;

pub use recorder::JsonFileRecorder;
pub use supervisor::{MonitorStats, Supervisor, SupervisorStatus};
