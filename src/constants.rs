//! Central Configuration Constants
//!
//! Single source of truth for file names and defaults.
//! Runtime-tunable values live in `logic::config::MonitorConfig`.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "EVO Performance Monitor";

/// Directory under the local data dir
pub const DATA_DIR_NAME: &str = "evo-monitor";

/// Allow/deny list document
pub const PREFERENCES_FILE: &str = "user_prefs.json";

/// Trend + decision history document
pub const HISTORY_FILE: &str = "ai_history.json";

/// Append-only suggestion feedback log (JSON lines)
pub const FEEDBACK_FILE: &str = "suggestion_feedback.jsonl";

/// Sidecar backups of removed registry values
pub const BACKUP_DIR: &str = "startup_backups";

/// Optional sha256 -> reputation map used by the advisor
pub const REPUTATION_FILE: &str = "reputation.json";

/// Fixed-name report export
pub const REPORT_FILE: &str = "performance_report.txt";

/// Default polling interval (seconds)
pub const DEFAULT_REFRESH_SECS: u64 = 5;

/// Default actionable threshold
pub const DEFAULT_ACTION_THRESHOLD: u8 = 60;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Config file path from environment
pub fn get_config_path() -> Option<std::path::PathBuf> {
    std::env::var("EVO_MONITOR_CONFIG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(std::path::PathBuf::from)
}

/// Data directory override from environment
pub fn get_data_dir_override() -> Option<std::path::PathBuf> {
    std::env::var("EVO_DATA_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(std::path::PathBuf::from)
}

/// Polling interval from environment or None
pub fn get_refresh_secs() -> Option<u64> {
    std::env::var("EVO_REFRESH_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
}

/// Actionable threshold from environment or None
pub fn get_action_threshold() -> Option<u8> {
    std::env::var("EVO_ACTION_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v <= 100)
}
