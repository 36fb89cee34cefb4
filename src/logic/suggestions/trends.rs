//! Trend History - decisions, exit counts and memory trends across sessions
//!
//! `{ "ignored": [..], "killed": [..], "seen": {name: n}, "trends": {pid: [{ts, rss}]} }`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::logic::error::MonitorResult;
use crate::logic::storage::{read_json, write_json_atomic};

/// Points kept per pid
pub const MAX_TREND_POINTS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub ts: f64,
    pub rss: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryDoc {
    /// Suggestion descriptions the user dismissed
    #[serde(default)]
    pub ignored: Vec<String>,
    /// Suggestion descriptions the user acted on
    #[serde(default)]
    pub killed: Vec<String>,
    /// Process name -> exits observed between scans
    #[serde(default)]
    pub seen: BTreeMap<String, u32>,
    #[serde(default)]
    pub trends: BTreeMap<String, Vec<TrendPoint>>,
}

pub struct TrendHistory {
    path: PathBuf,
    doc: HistoryDoc,
}

impl TrendHistory {
    /// Missing or unreadable history starts empty
    pub fn load(path: &Path) -> Self {
        let doc = match read_json::<HistoryDoc>(path) {
            Ok(Some(doc)) => doc,
            Ok(None) => HistoryDoc::default(),
            Err(e) => {
                log::warn!("History unusable, starting empty: {}", e);
                HistoryDoc::default()
            }
        };
        Self { path: path.to_path_buf(), doc }
    }

    pub fn doc(&self) -> &HistoryDoc {
        &self.doc
    }

    pub fn is_ignored(&self, description: &str) -> bool {
        self.doc.ignored.iter().any(|d| d == description)
    }

    pub fn is_killed(&self, description: &str) -> bool {
        self.doc.killed.iter().any(|d| d == description)
    }

    pub fn record_ignored(&mut self, description: &str) {
        if !self.is_ignored(description) {
            self.doc.ignored.push(description.to_string());
        }
    }

    pub fn record_killed(&mut self, description: &str) {
        if !self.is_killed(description) {
            self.doc.killed.push(description.to_string());
        }
    }

    pub fn record_exit(&mut self, name: &str) {
        *self.doc.seen.entry(name.to_lowercase()).or_insert(0) += 1;
    }

    pub fn exit_count(&self, name: &str) -> u32 {
        self.doc.seen.get(&name.to_lowercase()).copied().unwrap_or(0)
    }

    /// Append points newer than the last stored one, keeping the newest `MAX_TREND_POINTS`
    pub fn append_trend(&mut self, pid: u32, points: impl IntoIterator<Item = TrendPoint>) {
        let series = self.doc.trends.entry(pid.to_string()).or_default();
        let last = series.last().map(|p| p.ts).unwrap_or(f64::NEG_INFINITY);
        series.extend(points.into_iter().filter(|p| p.ts > last));

        if series.len() > MAX_TREND_POINTS {
            let excess = series.len() - MAX_TREND_POINTS;
            series.drain(..excess);
        }
    }

    pub fn save(&self) -> MonitorResult<()> {
        write_json_atomic(&self.path, &self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_cap_and_no_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TrendHistory::load(&dir.path().join("ai_history.json"));

        let points: Vec<TrendPoint> = (0..MAX_TREND_POINTS + 10)
            .map(|i| TrendPoint { ts: i as f64, rss: i as u64 })
            .collect();
        history.append_trend(7, points.clone());
        // Same window flushed again adds nothing
        history.append_trend(7, points);

        let series = &history.doc().trends["7"];
        assert_eq!(series.len(), MAX_TREND_POINTS);
        assert_eq!(series[0].ts, 10.0);
    }

    #[test]
    fn test_roundtrip_and_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai_history.json");

        let mut history = TrendHistory::load(&path);
        history.record_ignored("chrome.exe using 900.0 MB RAM");
        history.record_ignored("chrome.exe using 900.0 MB RAM");
        history.record_exit("Crashy.exe");
        history.save().unwrap();

        let back = TrendHistory::load(&path);
        assert_eq!(back.doc().ignored.len(), 1);
        assert_eq!(back.exit_count("crashy.exe"), 1);
    }

    #[test]
    fn test_corrupt_history_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai_history.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(TrendHistory::load(&path).doc().seen.is_empty());
    }
}
