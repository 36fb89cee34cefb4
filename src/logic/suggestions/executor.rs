//! Remediation Executor - one dispatch point for every suggestion command

use std::time::Instant;
use chrono::Utc;

use super::types::{ExecutionResult, RemediationCommand};
use crate::logic::autostart::{AutostartStore, LifecycleManager, TransitionTarget};
use crate::logic::services::ServiceControl;

/// Everything a command may touch
pub struct RemediationTargets<'a> {
    pub store: &'a AutostartStore,
    pub lifecycle: &'a LifecycleManager,
    pub services: &'a dyn ServiceControl,
    /// Kill by pid; false when the process could not be terminated
    pub terminate: &'a dyn Fn(u32) -> bool,
}

pub fn execute(command: &RemediationCommand, targets: &RemediationTargets<'_>) -> ExecutionResult {
    let start = Instant::now();
    let (ok, message) = dispatch(command, targets);

    if ok {
        log::info!("{}: {}", command.action_type(), message);
    } else {
        log::warn!("{} failed: {}", command.action_type(), message);
    }

    ExecutionResult {
        command: command.clone(),
        ok,
        message,
        timestamp: Utc::now().timestamp(),
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn dispatch(command: &RemediationCommand, targets: &RemediationTargets<'_>) -> (bool, String) {
    match command {
        RemediationCommand::DisableEntry { identity } => match targets.store.find(identity) {
            Ok(entry) => {
                let report = targets.lifecycle.transition(&entry, TransitionTarget::Disable);
                (report.ok, report.detail)
            }
            Err(e) => (false, e.to_string()),
        },
        RemediationCommand::StopService { name } => match targets.services.stop_and_disable(name) {
            Ok(msg) => (true, msg),
            Err(e) => (false, e.to_string()),
        },
        RemediationCommand::TerminateProcess { pid } => {
            if (targets.terminate)(*pid) {
                (true, format!("Terminated process {}", pid))
            } else {
                (false, format!("Process {} could not be terminated", pid))
            }
        }
        RemediationCommand::NoAction { reason } => (false, format!("No action for this suggestion: {}", reason)),
    }
}
