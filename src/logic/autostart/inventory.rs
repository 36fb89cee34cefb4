//! Startup Command Inventory - `Win32_StartupCommand` via CIM
//!
//! Optional source: it sees entries the direct readers may miss (other users'
//! hives, policy keys) but offers no way to change them.

use serde::Deserialize;

use crate::logic::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventoryRecord {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Command", default)]
    pub command: String,
    #[serde(rename = "Location", default)]
    pub location: String,
}

pub trait InventorySource: Send + Sync {
    fn startup_commands(&self) -> MonitorResult<Vec<InventoryRecord>>;
}

/// CIM query through PowerShell
pub struct CimInventory;

impl InventorySource for CimInventory {
    #[cfg(windows)]
    fn startup_commands(&self) -> MonitorResult<Vec<InventoryRecord>> {
        let out = crate::logic::shell::run_powershell(
            "Get-CimInstance Win32_StartupCommand | Select-Object Name,Command,Location | ConvertTo-Json -Compress",
        )?;
        crate::logic::shell::parse_json_rows(&out)
    }

    #[cfg(not(windows))]
    fn startup_commands(&self) -> MonitorResult<Vec<InventoryRecord>> {
        Err(MonitorError::EnumerationBackendUnavailable(
            "Win32_StartupCommand".to_string(),
        ))
    }
}

/// Fixed list, for tests and for disabling the inventory
#[derive(Default)]
pub struct StaticInventory {
    pub records: Vec<InventoryRecord>,
    pub unavailable: bool,
}

impl InventorySource for StaticInventory {
    fn startup_commands(&self) -> MonitorResult<Vec<InventoryRecord>> {
        if self.unavailable {
            return Err(MonitorError::EnumerationBackendUnavailable("static".to_string()));
        }
        Ok(self.records.clone())
    }
}

/// Where an inventory location string points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOrigin {
    UserRegistry,
    MachineRegistry,
    UserFolder,
    CommonFolder,
    Other,
}

pub fn classify_location(location: &str) -> InventoryOrigin {
    let lower = location.to_lowercase();
    if lower == "startup" {
        InventoryOrigin::UserFolder
    } else if lower == "common startup" {
        InventoryOrigin::CommonFolder
    } else if lower.starts_with("hklm") {
        InventoryOrigin::MachineRegistry
    } else if lower.starts_with("hku") || lower.starts_with("hkcu") {
        InventoryOrigin::UserRegistry
    } else {
        InventoryOrigin::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_location() {
        assert_eq!(classify_location("Startup"), InventoryOrigin::UserFolder);
        assert_eq!(classify_location("Common Startup"), InventoryOrigin::CommonFolder);
        assert_eq!(
            classify_location(r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Run"),
            InventoryOrigin::MachineRegistry
        );
        assert_eq!(
            classify_location(r"HKU\S-1-5-21-1\SOFTWARE\Microsoft\Windows\CurrentVersion\Run"),
            InventoryOrigin::UserRegistry
        );
    }

    #[test]
    fn test_static_unavailable() {
        let inv = StaticInventory { records: vec![], unavailable: true };
        assert!(matches!(
            inv.startup_commands(),
            Err(MonitorError::EnumerationBackendUnavailable(_))
        ));
    }
}
