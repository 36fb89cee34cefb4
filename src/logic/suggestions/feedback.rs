//! Feedback Log - append-only record of the user's suggestion decisions (JSON lines)

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use super::types::SuggestionRecord;
use crate::logic::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackLine {
    pub timestamp: i64,
    pub decision: Decision,
    pub suggestion: SuggestionRecord,
}

pub struct FeedbackLog {
    path: PathBuf,
}

impl FeedbackLog {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn append(&self, decision: Decision, suggestion: &SuggestionRecord) -> MonitorResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MonitorError::from_io(&parent.display().to_string(), e))?;
        }

        let line = FeedbackLine {
            timestamp: chrono::Utc::now().timestamp(),
            decision,
            suggestion: suggestion.clone(),
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let ctx = self.path.display().to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MonitorError::from_io(&ctx, e))?;
        file.write_all(json.as_bytes()).map_err(|e| MonitorError::from_io(&ctx, e))?;

        log::debug!("Feedback {:?} recorded for {}", decision, suggestion.name);
        Ok(())
    }

    /// Every readable line; malformed lines are skipped
    pub fn read_all(&self) -> Vec<FeedbackLine> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };
        data.lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::scoring::Tier;
    use crate::logic::suggestions::types::{Category, RemediationCommand};

    #[test]
    fn test_append_only_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FeedbackLog::new(&dir.path().join("nested").join("suggestion_feedback.jsonl"));
        let record = SuggestionRecord::new(
            "OneDrive",
            Category::StartupApp,
            None,
            20,
            Tier::Informational,
            "[Score 20] Not running".to_string(),
            "Can disable from startup if not needed",
            RemediationCommand::no_action("idle"),
        );

        log.append(Decision::Ignored, &record).unwrap();
        log.append(Decision::Accepted, &record).unwrap();

        let lines = log.read_all();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].decision, Decision::Ignored);
        assert_eq!(lines[1].suggestion.name, "OneDrive");

        let raw = fs::read_to_string(dir.path().join("nested").join("suggestion_feedback.jsonl")).unwrap();
        assert!(raw.contains("\"decision\":\"ignored\""));
    }
}
