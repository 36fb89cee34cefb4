//! Commands - the operation surface used by the CLI
//!
//! Every command takes the shared `AppContext` and maps engine errors to `String`.

use serde::{Deserialize, Serialize};

use crate::logic::autostart::{TransitionReport, TransitionTarget};
use crate::logic::context::AppContext;
use crate::logic::scoring::load_index;
use crate::logic::suggestions::{ExecutionResult, RemediationCommand, SuggestionRecord};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One autostart entry as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupEntryInfo {
    pub identity: String,
    pub name: String,
    pub backend: String,
    pub location: String,
    pub command: String,
    pub state: String,
    /// Number of merged locations behind this entry
    pub locations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_mb: f64,
    pub disk_kb_per_sec: f64,
    pub net_ops_per_sec: f64,
    pub load_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub cpu_usage: f32,
    pub memory_usage: f32,
    pub disk_used: Option<f32>,
    pub process_count: usize,
    pub battery_percent: Option<f32>,
    pub on_ac_power: Option<bool>,
    pub fullscreen: bool,
    pub snapshot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceLists {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

// ============================================================================
// AUTOSTART COMMANDS
// ============================================================================

pub fn list_startup_entries(ctx: &AppContext) -> Result<Vec<StartupEntryInfo>, String> {
    Ok(ctx
        .list_entries()
        .into_iter()
        .map(|e| StartupEntryInfo {
            name: e.display_name,
            backend: format!("{:?}", e.backend),
            location: e.location.to_string(),
            command: e.command,
            state: e.approval_state.as_str().to_string(),
            locations: e.representations.len(),
            identity: e.identity,
        })
        .collect())
}

fn transition(ctx: &AppContext, key: &str, target: TransitionTarget) -> Result<TransitionReport, String> {
    ctx.transition(key, target).map_err(|e| e.to_string())
}

pub fn disable_startup_entry(ctx: &AppContext, key: &str) -> Result<TransitionReport, String> {
    transition(ctx, key, TransitionTarget::Disable)
}

pub fn enable_startup_entry(ctx: &AppContext, key: &str) -> Result<TransitionReport, String> {
    transition(ctx, key, TransitionTarget::Enable)
}

pub fn delete_startup_entry(ctx: &AppContext, key: &str) -> Result<TransitionReport, String> {
    transition(ctx, key, TransitionTarget::Delete)
}

/// Kill the running processes of a startup entry
pub fn kill_entry_processes(ctx: &AppContext, key: &str) -> Result<Vec<u32>, String> {
    ctx.kill_entry_processes(key).map_err(|e| e.to_string())
}

// ============================================================================
// TELEMETRY COMMANDS
// ============================================================================

pub fn get_running_processes(ctx: &AppContext, limit: Option<u32>) -> Result<Vec<ProcessInfo>, String> {
    let limit = limit.map(|l| l as usize).unwrap_or(ctx.config.sampler.report_top_n);

    Ok(ctx
        .top_processes(limit)
        .into_iter()
        .map(|s| ProcessInfo {
            load_index: load_index(&s),
            pid: s.pid,
            name: s.name,
            cpu_percent: s.cpu_percent,
            memory_percent: s.memory_percent,
            memory_mb: s.memory_mb,
            disk_kb_per_sec: s.disk_kb_per_sec,
            net_ops_per_sec: s.net_ops_per_sec,
        })
        .collect())
}

/// Fresh sample of machine-wide state
pub fn get_system_status(ctx: &AppContext) -> Result<SystemStatus, String> {
    let snapshot = ctx.refresh_telemetry();

    Ok(SystemStatus {
        cpu_usage: snapshot.load.cpu_percent,
        memory_usage: snapshot.load.memory_percent,
        disk_used: snapshot.load.disk_used_percent,
        process_count: snapshot.samples.len(),
        battery_percent: snapshot.env.battery.map(|b| b.percent),
        on_ac_power: snapshot.env.battery.map(|b| b.plugged),
        fullscreen: snapshot.env.fullscreen,
        snapshot_time: snapshot.taken_at.to_rfc3339(),
    })
}

/// Write the tab-delimited report; returns its path
pub fn export_report(ctx: &AppContext) -> Result<String, String> {
    let (path, rows) = ctx.export_report().map_err(|e| e.to_string())?;
    log::info!("Exported {} process rows", rows);
    Ok(path.display().to_string())
}

// ============================================================================
// SUGGESTION COMMANDS
// ============================================================================

pub fn scan_suggestions(ctx: &AppContext) -> Result<Vec<SuggestionRecord>, String> {
    ctx.scan().map_err(|e| e.to_string())
}

/// Accept a suggestion: run its command and log the decision
pub fn accept_suggestion(ctx: &AppContext, record: &SuggestionRecord) -> Result<ExecutionResult, String> {
    let result = ctx.accept(record);
    if result.ok {
        Ok(result)
    } else {
        Err(result.message)
    }
}

pub fn ignore_suggestion(ctx: &AppContext, record: &SuggestionRecord) -> Result<bool, String> {
    ctx.ignore(record).map_err(|e| e.to_string())?;
    Ok(true)
}

pub fn execute_command(ctx: &AppContext, command: &RemediationCommand) -> Result<ExecutionResult, String> {
    Ok(ctx.execute(command))
}

// ============================================================================
// PREFERENCE COMMANDS
// ============================================================================

pub fn add_to_whitelist(ctx: &AppContext, name: &str) -> Result<bool, String> {
    ctx.allow(name).map_err(|e| e.to_string())
}

pub fn add_to_blacklist(ctx: &AppContext, name: &str) -> Result<bool, String> {
    ctx.deny(name).map_err(|e| e.to_string())
}

pub fn remove_from_lists(ctx: &AppContext, name: &str) -> Result<bool, String> {
    ctx.forget(name).map_err(|e| e.to_string())
}

pub fn get_preference_lists(ctx: &AppContext) -> Result<PreferenceLists, String> {
    let (whitelist, blacklist) = ctx.lists();
    Ok(PreferenceLists { whitelist, blacklist })
}
