//! Autostart Types

use std::fmt;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

// ============================================================================
// LOCATIONS
// ============================================================================

/// Registry root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hive {
    CurrentUser,
    LocalMachine,
}

impl Hive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
        }
    }
}

/// Registry namespace on a 64-bit platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegView {
    /// KEY_WOW64_64KEY
    Native,
    /// KEY_WOW64_32KEY
    Wow32,
}

impl RegView {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegView::Native => "64-bit view",
            RegView::Wow32 => "32-bit view",
        }
    }
}

/// Which Startup folder a shortcut lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FolderScope {
    User,
    Common,
}

impl FolderScope {
    /// Hive holding the approval records of this folder
    pub fn approval_hive(&self) -> Hive {
        match self {
            FolderScope::User => Hive::CurrentUser,
            FolderScope::Common => Hive::LocalMachine,
        }
    }
}

/// Storage mechanism of one representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Backend {
    RegistryRun,
    RegistryRunDisabled,
    StartupFolderShortcut,
    StartupFolderShortcutDisabled,
}

impl Backend {
    pub fn is_folder(&self) -> bool {
        matches!(self, Backend::StartupFolderShortcut | Backend::StartupFolderShortcutDisabled)
    }
}

/// Backend-specific address; only the lifecycle manager interprets it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationRef {
    Registry {
        hive: Hive,
        view: RegView,
        value_name: String,
    },
    Folder {
        scope: FolderScope,
        dir: PathBuf,
        /// Shortcut file name without `.lnk`
        stem: String,
    },
    /// Reported by the startup-command inventory only; read-only
    Inventory {
        location: String,
        name: String,
    },
}

impl LocationRef {
    /// Precedence when merging duplicates (lower wins)
    pub fn rank(&self) -> u8 {
        match self {
            LocationRef::Folder { .. } => 0,
            LocationRef::Registry { .. } => 1,
            LocationRef::Inventory { .. } => 2,
        }
    }

    pub fn is_inventory(&self) -> bool {
        matches!(self, LocationRef::Inventory { .. })
    }
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationRef::Registry { hive, view, value_name } => {
                write!(f, "{}\\...\\Run [{}] {}", hive.as_str(), view.as_str(), value_name)
            }
            LocationRef::Folder { dir, stem, .. } => {
                write!(f, "{}\\{}.lnk", dir.display(), stem)
            }
            LocationRef::Inventory { location, name } => write!(f, "{} ({})", location, name),
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// Whether the shell honors the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalState {
    Enabled,
    Disabled,
    Unknown,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Enabled => "Enabled",
            ApprovalState::Disabled => "Disabled",
            ApprovalState::Unknown => "Unknown",
        }
    }
}

/// One raw record as found in one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub backend: Backend,
    pub location: LocationRef,
    pub display_name: String,
    pub command: String,
    pub state: ApprovalState,
}

/// Canonical autostart entry after deduplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutostartEntry {
    pub identity: String,
    pub display_name: String,
    pub backend: Backend,
    pub location: LocationRef,
    pub command: String,
    pub approval_state: ApprovalState,
    /// Every representation merged into this entry, primary first
    pub representations: Vec<Representation>,
}

// ============================================================================
// TRANSITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionTarget {
    Enable,
    Disable,
    Delete,
}

impl TransitionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionTarget::Enable => "enable",
            TransitionTarget::Disable => "disable",
            TransitionTarget::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionStatus {
    /// Every representation reached the target
    Success,
    /// At least one representation reached the target, with warnings
    Partial,
    /// Nothing was updated
    Failed,
}

/// Outcome handed back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionReport {
    pub identity: String,
    pub target: TransitionTarget,
    pub ok: bool,
    pub status: TransitionStatus,
    pub detail: String,
}
