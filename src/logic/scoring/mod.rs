//! Scoring Module
//!
//! Turns resource signals and machine context into a 0-100 risk score and a tier.
//!
//! ## Structure
//! - `types`: Signals, Tier, Score
//! - `context`: EnvContext (battery, disk, fullscreen)
//! - `engine`: score / evaluate / heuristics
//!
//! ## Usage
//! ```ignore
//! use crate::logic::scoring::{evaluate, EnvContext, ListStatus, Signals};
//!
//! let signals = Signals::from_sample(&sample).with_startup(true);
//! if let Some(score) = evaluate(&signals, &EnvContext::default(), &config.scoring, ListStatus::Neutral) {
//!     println!("{} {:?}", score.value, score.tier);
//! }
//! ```

pub mod types;
pub mod context;
pub mod engine;

#[cfg(test)]
mod tests;

pub use types::{ListStatus, Score, Signals, Tier};
pub use context::EnvContext;
pub use engine::{evaluate, is_suspicious_path, is_suspicious_service, load_index, score, tier_for};
