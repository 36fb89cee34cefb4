//! Lifecycle Manager - Enable / Disable / Delete across every representation
//!
//! Each representation is moved independently (one registry value or one rename
//! at a time), then the StartupApproved flags are written in every view. The
//! entry state is re-derived afterwards and any mismatch is reported.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use super::backup::BackupWriter;
use super::registry::{
    RegValue, RegistryBackend, APPROVAL_DISABLED, APPROVAL_ENABLED, APPROVED_FOLDER_KEY,
    APPROVED_RUN_KEY, RUN_DISABLED_KEY, RUN_KEY,
};
use super::shortcut::{disabled_path, live_path};
use super::store::{aggregate_state, folder_approval_name, read_folder_rep, read_registry_rep};
use super::types::*;
use crate::logic::error::{MonitorError, MonitorResult};

/// What happened to one representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepResult {
    Updated,
    AlreadySatisfied,
}

#[derive(Default)]
struct Outcome {
    updated: usize,
    satisfied: usize,
    notes: Vec<String>,
    failures: Vec<String>,
}

impl Outcome {
    fn record(&mut self, what: &str, result: MonitorResult<StepResult>) {
        match result {
            Ok(StepResult::Updated) => self.updated += 1,
            Ok(StepResult::AlreadySatisfied) => self.satisfied += 1,
            Err(e) => {
                log::warn!("{} failed: {}", what, e);
                self.failures.push(format!("{}: {}", what, e));
            }
        }
    }
}

pub struct LifecycleManager {
    registry: Arc<dyn RegistryBackend>,
    backups: BackupWriter,
}

impl LifecycleManager {
    pub fn new(registry: Arc<dyn RegistryBackend>, backup_dir: &Path) -> Self {
        Self { registry, backups: BackupWriter::new(backup_dir) }
    }

    /// Apply `target` to every writable representation of `entry`
    pub fn transition(&self, entry: &AutostartEntry, target: TransitionTarget) -> TransitionReport {
        let reps: Vec<&Representation> = entry
            .representations
            .iter()
            .filter(|r| !r.location.is_inventory())
            .collect();

        if reps.is_empty() {
            return TransitionReport {
                identity: entry.identity.clone(),
                target,
                ok: false,
                status: TransitionStatus::Failed,
                detail: format!("'{}' is only known to the startup inventory and cannot be changed", entry.display_name),
            };
        }

        log::info!("Transition {} -> {} ({} representation(s))", entry.identity, target.as_str(), reps.len());

        let mut outcome = Outcome::default();
        let approvals = approval_targets(&reps);

        // Delete clears approvals before the values they describe
        if target == TransitionTarget::Delete {
            self.remove_approvals(&approvals, &mut outcome);
        }

        for rep in &reps {
            let label = rep.location.to_string();
            let result = match (&rep.location, target) {
                (LocationRef::Registry { hive, view, value_name }, TransitionTarget::Disable) => {
                    self.disable_value(*hive, *view, value_name, &mut outcome)
                }
                (LocationRef::Registry { hive, view, value_name }, TransitionTarget::Enable) => {
                    self.enable_value(*hive, *view, value_name, &rep.command, &mut outcome)
                }
                (LocationRef::Registry { hive, view, value_name }, TransitionTarget::Delete) => {
                    self.delete_value(*hive, *view, value_name)
                }
                (LocationRef::Folder { dir, stem, .. }, TransitionTarget::Disable) => {
                    disable_shortcut(dir, stem, &mut outcome)
                }
                (LocationRef::Folder { dir, stem, .. }, TransitionTarget::Enable) => {
                    enable_shortcut(dir, stem, &mut outcome)
                }
                (LocationRef::Folder { dir, stem, .. }, TransitionTarget::Delete) => delete_shortcut(dir, stem),
                (LocationRef::Inventory { .. }, _) => continue,
            };
            outcome.record(&label, result);
        }

        // Flags follow placement; nothing moved means nothing to approve
        if outcome.updated + outcome.satisfied > 0 {
            match target {
                TransitionTarget::Disable => self.write_approvals(&approvals, &APPROVAL_DISABLED, &mut outcome),
                TransitionTarget::Enable => self.write_approvals(&approvals, &APPROVAL_ENABLED, &mut outcome),
                TransitionTarget::Delete => {}
            }
        }

        let postcondition = self.verify(&reps, target);
        finish(entry, target, outcome, postcondition)
    }

    // ------------------------------------------------------------------------
    // Registry values
    // ------------------------------------------------------------------------

    fn backup(&self, hive: Hive, view: RegView, key: &str, name: &str, value: &RegValue) -> MonitorResult<()> {
        self.backups.backup_value(hive, view, key, name, value).map(|_| ())
    }

    fn disable_value(&self, hive: Hive, view: RegView, name: &str, outcome: &mut Outcome) -> MonitorResult<StepResult> {
        let reg = self.registry.as_ref();
        let primary = reg.get_value(hive, RUN_KEY, name, view)?;
        let shadow = reg.get_value(hive, RUN_DISABLED_KEY, name, view)?;

        let value = match primary {
            Some(v) => v,
            // Already in the shadow key, or gone entirely
            None => return Ok(StepResult::AlreadySatisfied),
        };

        // A different shadow is about to be overwritten: no backup, no move
        if let Some(old) = shadow.as_ref().filter(|old| **old != value) {
            self.backup(hive, view, RUN_DISABLED_KEY, name, old)?;
            outcome.notes.push(format!("previous RunDisabled copy of {} replaced (backed up)", name));
        }

        if let Err(e) = self.backup(hive, view, RUN_KEY, name, &value) {
            outcome.notes.push(format!("backup of {} skipped: {}", name, e));
        }

        reg.set_value(hive, RUN_DISABLED_KEY, name, &value, view)?;
        if let Err(e) = reg.delete_value(hive, RUN_KEY, name, view) {
            // Undo the copy so the value is not left in both places
            let undo = match &shadow {
                Some(old) => reg.set_value(hive, RUN_DISABLED_KEY, name, old, view),
                None => reg.delete_value(hive, RUN_DISABLED_KEY, name, view).map(|_| ()),
            };
            if let Err(undo_err) = undo {
                outcome.failures.push(format!(
                    "{} may now be in both Run and RunDisabled ({}): rollback failed: {}",
                    name,
                    view.as_str(),
                    undo_err
                ));
            }
            return Err(e);
        }

        log::info!("Moved {} to RunDisabled ({} {})", name, hive.as_str(), view.as_str());
        Ok(StepResult::Updated)
    }

    fn enable_value(
        &self,
        hive: Hive,
        view: RegView,
        name: &str,
        command: &str,
        outcome: &mut Outcome,
    ) -> MonitorResult<StepResult> {
        let reg = self.registry.as_ref();
        let primary = reg.get_value(hive, RUN_KEY, name, view)?;
        let shadow = reg.get_value(hive, RUN_DISABLED_KEY, name, view)?;

        match (primary, shadow) {
            (Some(_), None) => Ok(StepResult::AlreadySatisfied),
            (Some(_), Some(stale)) => {
                // Primary wins; drop the leftover shadow
                if let Err(e) = self.backup(hive, view, RUN_DISABLED_KEY, name, &stale) {
                    outcome.notes.push(format!("backup of {} skipped: {}", name, e));
                }
                reg.delete_value(hive, RUN_DISABLED_KEY, name, view)?;
                Ok(StepResult::Updated)
            }
            (None, Some(value)) => {
                reg.set_value(hive, RUN_KEY, name, &value, view)?;
                if let Err(e) = reg.delete_value(hive, RUN_DISABLED_KEY, name, view) {
                    if let Err(undo_err) = reg.delete_value(hive, RUN_KEY, name, view) {
                        outcome.failures.push(format!(
                            "{} may now be in both Run and RunDisabled ({}): rollback failed: {}",
                            name,
                            view.as_str(),
                            undo_err
                        ));
                    }
                    return Err(e);
                }
                log::info!("Restored {} from RunDisabled ({} {})", name, hive.as_str(), view.as_str());
                Ok(StepResult::Updated)
            }
            (None, None) if !command.trim().is_empty() => {
                reg.set_value(hive, RUN_KEY, name, &RegValue::string(command), view)?;
                outcome.notes.push(format!("{} recreated from its command", name));
                Ok(StepResult::Updated)
            }
            (None, None) => Err(MonitorError::NotFound(format!(
                "{}\\RunDisabled\\{} ({})",
                hive.as_str(),
                name,
                view.as_str()
            ))),
        }
    }

    fn delete_value(&self, hive: Hive, view: RegView, name: &str) -> MonitorResult<StepResult> {
        let reg = self.registry.as_ref();
        let mut removed = false;

        for key in [RUN_KEY, RUN_DISABLED_KEY] {
            if let Some(value) = reg.get_value(hive, key, name, view)? {
                // No backup, no delete
                self.backup(hive, view, key, name, &value)?;
                if reg.delete_value(hive, key, name, view)? {
                    log::warn!("Deleted {} from {}\\{} ({})", name, hive.as_str(), key, view.as_str());
                    removed = true;
                }
            }
        }

        Ok(if removed { StepResult::Updated } else { StepResult::AlreadySatisfied })
    }

    // ------------------------------------------------------------------------
    // Approval flags
    // ------------------------------------------------------------------------

    fn write_approvals(&self, targets: &BTreeSet<(Hive, &'static str, String)>, pattern: &[u8; 8], outcome: &mut Outcome) {
        let value = RegValue::binary(pattern);
        for (hive, key, name) in targets {
            for view in self.registry.views() {
                if let Err(e) = self.registry.set_value(*hive, key, name, &value, view) {
                    log::warn!("Approval flag {} not written in {}: {}", name, view.as_str(), e);
                    outcome
                        .failures
                        .push(format!("approval flag for {} in {} not written: {}", name, view.as_str(), e));
                }
            }
        }
    }

    fn remove_approvals(&self, targets: &BTreeSet<(Hive, &'static str, String)>, outcome: &mut Outcome) {
        for (hive, key, name) in targets {
            for view in self.registry.views() {
                if let Err(e) = self.registry.delete_value(*hive, key, name, view) {
                    outcome
                        .failures
                        .push(format!("approval flag for {} in {} not removed: {}", name, view.as_str(), e));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Post-condition
    // ------------------------------------------------------------------------

    fn verify(&self, reps: &[&Representation], target: TransitionTarget) -> Option<String> {
        let reg = self.registry.as_ref();
        let mut current = Vec::new();

        for rep in reps {
            let reread = match &rep.location {
                LocationRef::Registry { hive, view, value_name } => {
                    match read_registry_rep(reg, *hive, *view, value_name) {
                        Ok(r) => r,
                        Err(e) => return Some(format!("state could not be re-read: {}", e)),
                    }
                }
                LocationRef::Folder { scope, dir, stem } => read_folder_rep(reg, *scope, dir, stem),
                LocationRef::Inventory { .. } => continue,
            };
            if let Some(r) = reread {
                current.push(r);
            }
        }

        match target {
            TransitionTarget::Delete if current.is_empty() => None,
            TransitionTarget::Delete => Some(format!("{} representation(s) still present", current.len())),
            _ => {
                let expected = if target == TransitionTarget::Enable {
                    ApprovalState::Enabled
                } else {
                    ApprovalState::Disabled
                };
                let state = aggregate_state(&current);
                if current.is_empty() {
                    Some("entry no longer present".to_string())
                } else if state != expected {
                    Some(format!("state after {} is {}", target.as_str(), state.as_str()))
                } else {
                    None
                }
            }
        }
    }
}

fn approval_targets(reps: &[&Representation]) -> BTreeSet<(Hive, &'static str, String)> {
    reps.iter()
        .filter_map(|rep| match &rep.location {
            LocationRef::Registry { hive, value_name, .. } => Some((*hive, APPROVED_RUN_KEY, value_name.clone())),
            LocationRef::Folder { scope, stem, .. } => {
                Some((scope.approval_hive(), APPROVED_FOLDER_KEY, folder_approval_name(stem)))
            }
            LocationRef::Inventory { .. } => None,
        })
        .collect()
}

fn finish(entry: &AutostartEntry, target: TransitionTarget, mut outcome: Outcome, postcondition: Option<String>) -> TransitionReport {
    let touched = outcome.updated + outcome.satisfied;
    let ok = touched > 0;

    if let Some(mismatch) = postcondition {
        outcome.failures.push(mismatch);
    }

    let status = if !ok {
        TransitionStatus::Failed
    } else if outcome.failures.is_empty() {
        TransitionStatus::Success
    } else {
        TransitionStatus::Partial
    };

    let mut parts = vec![format!(
        "{}: {} updated, {} already {}",
        entry.display_name,
        outcome.updated,
        outcome.satisfied,
        match target {
            TransitionTarget::Enable => "enabled",
            TransitionTarget::Disable => "disabled",
            TransitionTarget::Delete => "absent",
        }
    )];
    parts.extend(outcome.notes);
    parts.extend(outcome.failures);

    TransitionReport {
        identity: entry.identity.clone(),
        target,
        ok,
        status,
        detail: parts.join("; "),
    }
}

// ============================================================================
// SHORTCUTS
// ============================================================================

/// Rename, falling back to copy + remove when the source is locked
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            fs::copy(from, to)?;
            if let Err(remove_err) = fs::remove_file(from) {
                if let Err(undo_err) = fs::remove_file(to) {
                    log::warn!("{} left next to {}: {}", to.display(), from.display(), undo_err);
                }
                return Err(remove_err);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn io_err(path: &Path, e: io::Error) -> MonitorError {
    MonitorError::from_io(&path.display().to_string(), e)
}

fn disable_shortcut(dir: &Path, stem: &str, outcome: &mut Outcome) -> MonitorResult<StepResult> {
    let live = live_path(dir, stem);
    let disabled = disabled_path(dir, stem);

    if !live.exists() {
        return Ok(StepResult::AlreadySatisfied);
    }
    if disabled.exists() {
        outcome.notes.push(format!("kept both {} and {}", live.display(), disabled.display()));
        return Err(MonitorError::PartialBackendFailure(format!(
            "{} already exists",
            disabled.display()
        )));
    }

    move_file(&live, &disabled).map_err(|e| io_err(&live, e))?;
    log::info!("Disabled shortcut {}", live.display());
    Ok(StepResult::Updated)
}

fn enable_shortcut(dir: &Path, stem: &str, outcome: &mut Outcome) -> MonitorResult<StepResult> {
    let live = live_path(dir, stem);
    let disabled = disabled_path(dir, stem);

    match (live.exists(), disabled.exists()) {
        (true, true) => {
            outcome.notes.push(format!("kept both {} and {}", live.display(), disabled.display()));
            Ok(StepResult::AlreadySatisfied)
        }
        (true, false) => Ok(StepResult::AlreadySatisfied),
        (false, true) => {
            move_file(&disabled, &live).map_err(|e| io_err(&disabled, e))?;
            log::info!("Enabled shortcut {}", live.display());
            Ok(StepResult::Updated)
        }
        (false, false) => Err(MonitorError::NotFound(disabled.display().to_string())),
    }
}

fn delete_shortcut(dir: &Path, stem: &str) -> MonitorResult<StepResult> {
    let mut removed = false;
    for path in [live_path(dir, stem), disabled_path(dir, stem)] {
        match fs::remove_file(&path) {
            Ok(()) => {
                log::warn!("Deleted shortcut {}", path.display());
                removed = true;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
    }
    Ok(if removed { StepResult::Updated } else { StepResult::AlreadySatisfied })
}
