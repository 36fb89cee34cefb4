//! Monitor Configuration
//!
//! Defaults live in code; an optional JSON file overrides them, and a handful of
//! environment variables override the file.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants;
use super::error::{MonitorError, MonitorResult};

// ============================================================================
// SCORING
// ============================================================================

/// Weights and modifiers of the composite risk score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub cpu_weight: f64,
    pub memory_weight: f64,
    pub disk_kb_weight: f64,
    pub net_ops_weight: f64,

    pub startup_bonus: f64,
    pub suspicious_bonus: f64,

    /// Added when on battery, unplugged and below `low_battery_percent`
    pub low_battery_bonus: f64,
    pub low_battery_percent: f32,

    /// Added when free space of the system drive is below `low_disk_free_percent`
    pub low_disk_bonus: f64,
    pub low_disk_free_percent: f32,

    /// Subtracted from scores under `fullscreen_ceiling` while a fullscreen app has focus
    pub fullscreen_penalty: f64,
    pub fullscreen_ceiling: f64,

    /// Score at or above which a subject becomes actionable
    pub action_threshold: u8,

    /// Fixed score for autostart entries with no live process
    pub idle_startup_score: u8,

    /// Lower-case path fragments that mark an executable as suspicious
    pub suspicious_segments: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cpu_weight: 2.0,
            memory_weight: 0.5,
            disk_kb_weight: 0.3,
            net_ops_weight: 0.3,
            startup_bonus: 15.0,
            suspicious_bonus: 20.0,
            low_battery_bonus: 10.0,
            low_battery_percent: 20.0,
            low_disk_bonus: 10.0,
            low_disk_free_percent: 10.0,
            fullscreen_penalty: 15.0,
            fullscreen_ceiling: 70.0,
            action_threshold: constants::DEFAULT_ACTION_THRESHOLD,
            idle_startup_score: 20,
            suspicious_segments: vec![
                "\\temp\\".to_string(),
                "/tmp/".to_string(),
                "temp".to_string(),
                "appdata".to_string(),
            ],
        }
    }
}

// ============================================================================
// SAMPLER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Polling interval of the telemetry loop
    pub refresh_secs: u64,

    /// Rows written by the report export
    pub report_top_n: usize,

    /// Processes inspected by the advisor's memory pass
    pub advisor_top_processes: usize,

    /// Upper bound of processes hashed by the security pass
    pub max_hashed_executables: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            refresh_secs: constants::DEFAULT_REFRESH_SECS,
            report_top_n: 50,
            advisor_top_processes: 8,
            max_hashed_executables: 64,
        }
    }
}

// ============================================================================
// PATHS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,

    /// Overrides of the per-user / all-users Startup folders
    pub user_startup_dir: Option<PathBuf>,
    pub common_startup_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::DATA_DIR_NAME),
            user_startup_dir: None,
            common_startup_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn preferences_file(&self) -> PathBuf {
        self.data_dir.join(constants::PREFERENCES_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join(constants::HISTORY_FILE)
    }

    pub fn feedback_file(&self) -> PathBuf {
        self.data_dir.join(constants::FEEDBACK_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(constants::BACKUP_DIR)
    }

    pub fn reputation_file(&self) -> PathBuf {
        self.data_dir.join(constants::REPUTATION_FILE)
    }

    pub fn report_file(&self) -> PathBuf {
        self.data_dir.join(constants::REPORT_FILE)
    }

    /// Per-user Startup folder (`%APPDATA%\...\Startup`)
    pub fn user_startup(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.user_startup_dir {
            return Some(dir.clone());
        }
        if cfg!(windows) {
            dirs::data_dir().map(|d| d.join(STARTUP_SUBPATH))
        } else {
            None
        }
    }

    /// All-users Startup folder (`%ProgramData%\...\Startup`)
    pub fn common_startup(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.common_startup_dir {
            return Some(dir.clone());
        }
        if cfg!(windows) {
            std::env::var_os("ProgramData").map(|d| PathBuf::from(d).join(STARTUP_SUBPATH))
        } else {
            None
        }
    }
}

const STARTUP_SUBPATH: &str = r"Microsoft\Windows\Start Menu\Programs\Startup";

// ============================================================================
// ROOT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scoring: ScoringConfig,
    pub sampler: SamplerConfig,
    pub paths: PathsConfig,
}

impl MonitorConfig {
    /// Load from an explicit path, `EVO_MONITOR_CONFIG`, or defaults; then apply env overrides.
    pub fn load(path: Option<&Path>) -> MonitorResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(constants::get_config_path);

        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MonitorResult<Self> {
        let data = fs::read(path).map_err(|e| MonitorError::from_io(&path.display().to_string(), e))?;
        let config: MonitorConfig = serde_json::from_slice(&data)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = constants::get_data_dir_override() {
            self.paths.data_dir = dir;
        }
        if let Some(secs) = constants::get_refresh_secs() {
            self.sampler.refresh_secs = secs;
        }
        if let Some(threshold) = constants::get_action_threshold() {
            self.scoring.action_threshold = threshold;
        }
    }

    /// Config rooted in a single directory (tests, portable mode)
    pub fn with_data_dir(dir: &Path) -> Self {
        let mut config = Self::default();
        config.paths.data_dir = dir.to_path_buf();
        config
    }
}
