//! Autostart Entry Store - enumeration, state derivation and deduplication
//!
//! Reads registry Run values (and RunDisabled shadows) in both hives and every
//! view, the startup-command inventory, and both Startup folders. Nothing here
//! writes; the lifecycle manager owns all mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::inventory::{classify_location, InventoryOrigin, InventorySource};
use super::normalize::identity_key;
use super::registry::{
    decode_approval, RegValue, RegistryBackend, APPROVED_FOLDER_KEY, APPROVED_RUN_KEY,
    RUN_DISABLED_KEY, RUN_KEY,
};
use super::shortcut::{probe_pair, scan_folder, ShortcutPair, LINK_EXT};
use super::types::*;
use crate::logic::error::{MonitorError, MonitorResult};

const HIVES: [Hive; 2] = [Hive::CurrentUser, Hive::LocalMachine];

// ============================================================================
// STATE DERIVATION
// ============================================================================

/// Where the value or file physically sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Live,
    Shadow,
    Both,
}

/// Approval state from placement plus the approval flags of every view.
///
/// No flags: placement decides. Some flag agreeing with placement: placement
/// decides. Otherwise, or when primary and shadow coexist: Unknown.
pub fn resolve_state(placement: Placement, flags: &[ApprovalState]) -> ApprovalState {
    let expected = match placement {
        Placement::Live => ApprovalState::Enabled,
        Placement::Shadow => ApprovalState::Disabled,
        Placement::Both => return ApprovalState::Unknown,
    };

    if flags.is_empty() || flags.contains(&expected) {
        expected
    } else {
        ApprovalState::Unknown
    }
}

/// Merge per-representation states; inventory records only count when nothing else exists
pub fn aggregate_state(reps: &[Representation]) -> ApprovalState {
    let writable: Vec<_> = reps.iter().filter(|r| !r.location.is_inventory()).collect();
    let pool: Vec<&Representation> = if writable.is_empty() { reps.iter().collect() } else { writable };

    let mut states = pool.iter().map(|r| r.state);
    match states.next() {
        Some(first) if states.all(|s| s == first) => first,
        _ => ApprovalState::Unknown,
    }
}

/// Approval flags of one name across every view; unreadable views are skipped
pub fn approval_flags(registry: &dyn RegistryBackend, hive: Hive, key: &str, name: &str) -> Vec<ApprovalState> {
    let mut flags = Vec::new();
    for view in registry.views() {
        match registry.get_value(hive, key, name, view) {
            Ok(Some(v)) => flags.push(decode_approval(&v.bytes).unwrap_or(ApprovalState::Unknown)),
            Ok(None) => {}
            Err(e) => log::debug!("Approval flag {} ({}) unreadable: {}", name, view.as_str(), e),
        }
    }
    flags
}

pub fn folder_approval_name(stem: &str) -> String {
    format!("{}{}", stem, LINK_EXT)
}

fn registry_rep(
    registry: &dyn RegistryBackend,
    hive: Hive,
    view: RegView,
    name: &str,
    primary: Option<&RegValue>,
    shadow: Option<&RegValue>,
) -> Option<Representation> {
    let (placement, value, backend) = match (primary, shadow) {
        (Some(p), Some(_)) => (Placement::Both, p, Backend::RegistryRun),
        (Some(p), None) => (Placement::Live, p, Backend::RegistryRun),
        (None, Some(s)) => (Placement::Shadow, s, Backend::RegistryRunDisabled),
        (None, None) => return None,
    };

    let flags = approval_flags(registry, hive, APPROVED_RUN_KEY, name);
    Some(Representation {
        backend,
        location: LocationRef::Registry { hive, view, value_name: name.to_string() },
        display_name: name.to_string(),
        command: value.to_display_string(),
        state: resolve_state(placement, &flags),
    })
}

/// Re-read one registry representation; None when neither primary nor shadow exists
pub fn read_registry_rep(
    registry: &dyn RegistryBackend,
    hive: Hive,
    view: RegView,
    name: &str,
) -> MonitorResult<Option<Representation>> {
    let primary = registry.get_value(hive, RUN_KEY, name, view)?;
    let shadow = registry.get_value(hive, RUN_DISABLED_KEY, name, view)?;
    Ok(registry_rep(registry, hive, view, name, primary.as_ref(), shadow.as_ref()))
}

fn folder_rep(registry: &dyn RegistryBackend, scope: FolderScope, dir: &Path, pair: &ShortcutPair) -> Option<Representation> {
    let (placement, backend) = match (&pair.live, &pair.disabled) {
        (Some(_), Some(_)) => (Placement::Both, Backend::StartupFolderShortcut),
        (Some(_), None) => (Placement::Live, Backend::StartupFolderShortcut),
        (None, Some(_)) => (Placement::Shadow, Backend::StartupFolderShortcutDisabled),
        (None, None) => return None,
    };

    let flags = approval_flags(
        registry,
        scope.approval_hive(),
        APPROVED_FOLDER_KEY,
        &folder_approval_name(&pair.stem),
    );

    Some(Representation {
        backend,
        location: LocationRef::Folder { scope, dir: dir.to_path_buf(), stem: pair.stem.clone() },
        display_name: pair.stem.clone(),
        command: pair.command(),
        state: resolve_state(placement, &flags),
    })
}

/// Re-read one shortcut representation
pub fn read_folder_rep(registry: &dyn RegistryBackend, scope: FolderScope, dir: &Path, stem: &str) -> Option<Representation> {
    folder_rep(registry, scope, dir, &probe_pair(dir, stem))
}

// ============================================================================
// STORE
// ============================================================================

pub struct AutostartStore {
    registry: Arc<dyn RegistryBackend>,
    inventory: Box<dyn InventorySource>,
    folders: Vec<(FolderScope, PathBuf)>,
}

impl AutostartStore {
    pub fn new(
        registry: Arc<dyn RegistryBackend>,
        inventory: Box<dyn InventorySource>,
        folders: Vec<(FolderScope, PathBuf)>,
    ) -> Self {
        Self { registry, inventory, folders }
    }

    pub fn registry(&self) -> Arc<dyn RegistryBackend> {
        self.registry.clone()
    }

    /// Every autostart entry, deduplicated by identity and sorted by it
    pub fn enumerate(&self) -> Vec<AutostartEntry> {
        let mut raw = self.registry_records();
        raw.extend(self.inventory_records());
        raw.extend(self.folder_records());
        let entries = merge(raw);
        log::debug!("Enumerated {} autostart entries", entries.len());
        entries
    }

    /// Look up by identity or display name (case-insensitive)
    pub fn find(&self, key: &str) -> MonitorResult<AutostartEntry> {
        let needle = key.trim().to_lowercase();
        let entries = self.enumerate();

        entries
            .iter()
            .find(|e| e.identity == needle)
            .or_else(|| entries.iter().find(|e| e.display_name.to_lowercase() == needle))
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(format!("autostart entry '{}'", key)))
    }

    fn list_or_skip(&self, hive: Hive, key: &str, view: RegView) -> Vec<(String, RegValue)> {
        match self.registry.list_values(hive, key, view) {
            Ok(values) => values,
            Err(e) => {
                log::debug!("Skipping {}\\{} ({}): {}", hive.as_str(), key, view.as_str(), e);
                Vec::new()
            }
        }
    }

    fn registry_records(&self) -> Vec<Representation> {
        let mut out = Vec::new();
        let registry = self.registry.as_ref();

        for hive in HIVES {
            for view in registry.views() {
                // name (lower) -> (name, primary, shadow)
                let mut names: BTreeMap<String, (String, Option<RegValue>, Option<RegValue>)> = BTreeMap::new();

                for (name, value) in self.list_or_skip(hive, RUN_KEY, view) {
                    names.entry(name.to_lowercase()).or_insert_with(|| (name.clone(), None, None)).1 = Some(value);
                }
                for (name, value) in self.list_or_skip(hive, RUN_DISABLED_KEY, view) {
                    names.entry(name.to_lowercase()).or_insert_with(|| (name.clone(), None, None)).2 = Some(value);
                }

                for (name, primary, shadow) in names.into_values() {
                    if let Some(rep) = registry_rep(registry, hive, view, &name, primary.as_ref(), shadow.as_ref()) {
                        out.push(rep);
                    }
                }
            }
        }
        out
    }

    fn inventory_records(&self) -> Vec<Representation> {
        let records = match self.inventory.startup_commands() {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Startup inventory skipped: {}", e);
                return Vec::new();
            }
        };

        let registry = self.registry.as_ref();
        records
            .into_iter()
            .filter(|r| !r.name.trim().is_empty() || !r.command.trim().is_empty())
            .map(|r| {
                let origin = classify_location(&r.location);
                let flags = match origin {
                    InventoryOrigin::UserRegistry => approval_flags(registry, Hive::CurrentUser, APPROVED_RUN_KEY, &r.name),
                    InventoryOrigin::MachineRegistry => approval_flags(registry, Hive::LocalMachine, APPROVED_RUN_KEY, &r.name),
                    InventoryOrigin::UserFolder => {
                        approval_flags(registry, Hive::CurrentUser, APPROVED_FOLDER_KEY, &folder_approval_name(&r.name))
                    }
                    InventoryOrigin::CommonFolder => {
                        approval_flags(registry, Hive::LocalMachine, APPROVED_FOLDER_KEY, &folder_approval_name(&r.name))
                    }
                    InventoryOrigin::Other => Vec::new(),
                };
                let backend = match origin {
                    InventoryOrigin::UserFolder | InventoryOrigin::CommonFolder => Backend::StartupFolderShortcut,
                    _ => Backend::RegistryRun,
                };

                Representation {
                    backend,
                    location: LocationRef::Inventory { location: r.location.clone(), name: r.name.clone() },
                    display_name: r.name,
                    command: r.command,
                    state: resolve_state(Placement::Live, &flags),
                }
            })
            .collect()
    }

    fn folder_records(&self) -> Vec<Representation> {
        let registry = self.registry.as_ref();
        self.folders
            .iter()
            .flat_map(|(scope, dir)| {
                scan_folder(dir)
                    .into_iter()
                    .filter_map(move |pair| folder_rep(registry, *scope, dir, &pair))
            })
            .collect()
    }
}

/// Group raw records by identity; the highest-precedence record becomes primary
pub fn merge(raw: Vec<Representation>) -> Vec<AutostartEntry> {
    let mut groups: BTreeMap<String, Vec<Representation>> = BTreeMap::new();
    for rep in raw {
        let key = identity_key(&rep.command, &rep.display_name);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(rep);
    }

    groups
        .into_iter()
        .filter_map(|(identity, mut reps)| {
            reps.sort_by(|a, b| {
                a.location
                    .rank()
                    .cmp(&b.location.rank())
                    .then_with(|| a.location.cmp(&b.location))
            });
            let primary = reps.first()?.clone();
            Some(AutostartEntry {
                identity,
                display_name: primary.display_name,
                backend: primary.backend,
                location: primary.location,
                command: primary.command,
                approval_state: aggregate_state(&reps),
                representations: reps,
            })
        })
        .collect()
}
