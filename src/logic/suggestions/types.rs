//! Suggestion Types

use serde::{Deserialize, Serialize};

use crate::logic::scoring::Tier;

// ============================================================================
// REMEDIATION
// ============================================================================

/// What executing a suggestion does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RemediationCommand {
    /// Disable an autostart entry by identity
    DisableEntry { identity: String },

    /// Stop a service and disable its start type
    StopService { name: String },

    /// Kill a process
    TerminateProcess { pid: u32 },

    /// Advisory only
    NoAction { reason: String },
}

impl RemediationCommand {
    pub fn action_type(&self) -> &'static str {
        match self {
            RemediationCommand::DisableEntry { .. } => "disable_entry",
            RemediationCommand::StopService { .. } => "stop_service",
            RemediationCommand::TerminateProcess { .. } => "terminate_process",
            RemediationCommand::NoAction { .. } => "no_action",
        }
    }

    pub fn description(&self) -> String {
        match self {
            RemediationCommand::DisableEntry { identity } => format!("Disable autostart entry {}", identity),
            RemediationCommand::StopService { name } => format!("Stop and disable service {}", name),
            RemediationCommand::TerminateProcess { pid } => format!("Terminate process {}", pid),
            RemediationCommand::NoAction { reason } => format!("No action: {}", reason),
        }
    }

    pub fn no_action(reason: &str) -> Self {
        RemediationCommand::NoAction { reason: reason.to_string() }
    }
}

/// Result of executing one command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: RemediationCommand,
    pub ok: bool,
    pub message: String,
    pub timestamp: i64,
    pub duration_ms: u64,
}

// ============================================================================
// SUGGESTION RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    StartupApp,
    Service,
    Process,
    Security,
    Performance,
    Predictive,
    Power,
    Maintenance,
    Info,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::StartupApp => "Startup App",
            Category::Service => "Service",
            Category::Process => "Process",
            Category::Security => "Security",
            Category::Performance => "Performance",
            Category::Predictive => "Predictive",
            Category::Power => "Power",
            Category::Maintenance => "Maintenance",
            Category::Info => "Info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// >= 80 high, >= 50 medium
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Priority::High
        } else if score >= 50 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub pid: Option<u32>,
    pub score: u8,
    pub tier: Tier,
    pub description: String,
    pub suggestion: String,
    pub priority: Priority,
    pub command: RemediationCommand,
}

impl SuggestionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        category: Category,
        pid: Option<u32>,
        score: u8,
        tier: Tier,
        description: String,
        suggestion: &str,
        command: RemediationCommand,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            category,
            pid,
            score,
            tier,
            description,
            suggestion: suggestion.to_string(),
            priority: Priority::from_score(score),
            command,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.tier == Tier::Actionable && !matches!(self.command, RemediationCommand::NoAction { .. })
    }
}
