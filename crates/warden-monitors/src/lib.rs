//! Failure-mode detectors and the intervention planner.
//!
//! Each monitor holds a shared gateway handle and runs a cheap heuristic
//! tier before any backend call. Backend failures degrade to no issue;
//! a detector never propagates an error to the interaction loop.

pub mod debug_loop;
pub mod goal_tracker;
pub mod planner;
pub mod quality_gate;
pub mod sycophancy;
mod text;

pub use debug_loop::{DebugLoopDetector, DebugLoopStats};
pub use goal_tracker::{DriftStats, GoalTracker};
pub use planner::{format_pivot_message, InterventionPlanner};
pub use quality_gate::{PromptAnalysis, QualityGate};
pub use sycophancy::{SycophancyDetector, SycophancyStats};
