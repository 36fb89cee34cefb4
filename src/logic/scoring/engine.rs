//! Scoring Engine
//!
//! Pure functions: signals + environment + weights in, bounded score out.

use super::context::EnvContext;
use super::types::{ListStatus, Score, Signals, Tier};
use crate::logic::collector::ProcessSample;
use crate::logic::config::ScoringConfig;

// ============================================================================
// SCORE
// ============================================================================

/// Unclamped score and the modifiers applied
fn raw_score(signals: &Signals, env: &EnvContext, config: &ScoringConfig) -> (f64, Vec<String>) {
    let mut reasons = Vec::new();

    let mut value = signals.cpu_percent.max(0.0) * config.cpu_weight
        + signals.memory_percent.max(0.0) * config.memory_weight
        + signals.disk_kb_per_sec.max(0.0) * config.disk_kb_weight
        + signals.net_ops_per_sec.max(0.0) * config.net_ops_weight;

    if signals.startup {
        value += config.startup_bonus;
        reasons.push("Launches at logon".to_string());
    }
    if signals.suspicious {
        value += config.suspicious_bonus;
        reasons.push("Runs from a suspicious location".to_string());
    }
    if env.low_battery(config.low_battery_percent) {
        value += config.low_battery_bonus;
        reasons.push("Low battery".to_string());
    }
    if env.low_disk(config.low_disk_free_percent) {
        value += config.low_disk_bonus;
        reasons.push("Low free disk space".to_string());
    }
    if env.fullscreen && value < config.fullscreen_ceiling {
        value -= config.fullscreen_penalty;
        reasons.push("Fullscreen app in focus".to_string());
    }

    (value, reasons)
}

/// Composite score in [0, 100]
pub fn score(signals: &Signals, env: &EnvContext, config: &ScoringConfig) -> u8 {
    clamp(raw_score(signals, env, config).0)
}

fn clamp(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}

pub fn tier_for(value: u8, denied: bool, threshold: u8) -> Tier {
    if denied || value >= threshold {
        Tier::Actionable
    } else {
        Tier::Informational
    }
}

/// Score and tier; None for allow-listed subjects
pub fn evaluate(signals: &Signals, env: &EnvContext, config: &ScoringConfig, list: ListStatus) -> Option<Score> {
    if list == ListStatus::Allowed {
        return None;
    }

    let (raw, mut reasons) = raw_score(signals, env, config);
    let value = clamp(raw);
    let denied = list == ListStatus::Denied;
    if denied {
        reasons.push("On the user's deny list".to_string());
    }

    Some(Score {
        value,
        tier: tier_for(value, denied, config.action_threshold),
        reasons,
    })
}

// ============================================================================
// HEURISTICS
// ============================================================================

/// Path contains one of the configured temp/appdata-like fragments
pub fn is_suspicious_path(path: &str, config: &ScoringConfig) -> bool {
    let lower = path.to_lowercase();
    !lower.is_empty() && config.suspicious_segments.iter().any(|seg| lower.contains(seg.as_str()))
}

/// Service with an unknown name or a temp-like binary
pub fn is_suspicious_service(name: &str, bin_path: &str, config: &ScoringConfig) -> bool {
    name.to_lowercase().contains("unknown") || is_suspicious_path(bin_path, config)
}

/// Dashboard ranking: cpu*2 + mem*1.5 + disk MB/s + (ops/50)*0.5
pub fn load_index(sample: &ProcessSample) -> f64 {
    sample.cpu_percent as f64 * 2.0
        + sample.memory_percent as f64 * 1.5
        + sample.disk_kb_per_sec / 1024.0
        + (sample.net_ops_per_sec / 50.0) * 0.5
}
