//! Suggestions Module
//!
//! Ranked, explainable recommendations over autostart entries, services and
//! live processes, plus the executor that carries them out.
//!
//! ## Structure
//! - `types`: SuggestionRecord, RemediationCommand, ExecutionResult
//! - `engine`: startup + service suggestions (scored)
//! - `advisor`: security / performance / predictive / power / maintenance heuristics
//! - `trends`: decision and memory-trend history
//! - `executor`: dispatch of remediation commands
//! - `feedback`: append-only decision log
//!
//! ## Usage
//! ```ignore
//! use crate::logic::suggestions::{scan_for_suggestions, ScanInputs};
//!
//! let inputs = ScanInputs { entries: &entries, samples: &samples, services: &services, env: &env };
//! for s in scan_for_suggestions(&inputs, &prefs, &config.scoring) {
//!     println!("[{}] {} {}", s.score, s.name, s.suggestion);
//! }
//! ```

pub mod types;
pub mod engine;
pub mod advisor;
pub mod trends;
pub mod executor;
pub mod feedback;


pub use types::{Category, ExecutionResult, Priority, RemediationCommand, SuggestionRecord};
pub use engine::{scan_for_suggestions, sort_by_score, ScanInputs};
pub use advisor::{Advisor, AdvisorInputs};
pub use trends::{TrendHistory, TrendPoint};
pub use executor::{execute, RemediationTargets};
pub use feedback::{Decision, FeedbackLog};
