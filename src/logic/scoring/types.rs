//! Scoring Types

use serde::{Deserialize, Serialize};

use crate::logic::collector::ProcessSample;

/// Raw resource signals of one subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_kb_per_sec: f64,
    pub net_ops_per_sec: f64,
    /// Subject launches at logon
    pub startup: bool,
    /// Executable lives somewhere malware likes to hide
    pub suspicious: bool,
}

impl Signals {
    pub fn from_sample(sample: &ProcessSample) -> Self {
        Self {
            cpu_percent: sample.cpu_percent as f64,
            memory_percent: sample.memory_percent as f64,
            disk_kb_per_sec: sample.disk_kb_per_sec,
            net_ops_per_sec: sample.net_ops_per_sec,
            startup: false,
            suspicious: false,
        }
    }

    pub fn with_startup(mut self, startup: bool) -> Self {
        self.startup = startup;
        self
    }

    pub fn with_suspicious(mut self, suspicious: bool) -> Self {
        self.suspicious = suspicious;
        self
    }
}

/// Recommendation strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Informational,
    Actionable,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Informational => "Informational",
            Tier::Actionable => "Actionable",
        }
    }
}

/// Allow/deny list membership of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStatus {
    #[default]
    Neutral,
    Allowed,
    Denied,
}

/// Final score with the modifiers that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: u8,
    pub tier: Tier,
    pub reasons: Vec<String>,
}
