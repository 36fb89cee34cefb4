//! Services - `Win32_Service` inventory and stop/disable via `sc`

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::{MonitorError, MonitorResult};

/// `sc stop` on a service that is not running
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "ProcessId", default)]
    pub process_id: u32,
    #[serde(rename = "PathName", default)]
    pub bin_path: Option<String>,
    #[serde(rename = "StartMode", default)]
    pub start_mode: String,
}

impl ServiceInfo {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    /// 0 means no process
    pub fn pid(&self) -> Option<u32> {
        Some(self.process_id).filter(|p| *p != 0)
    }

    pub fn bin_path(&self) -> &str {
        self.bin_path.as_deref().unwrap_or("")
    }
}

pub trait ServiceControl: Send + Sync {
    fn list(&self) -> MonitorResult<Vec<ServiceInfo>>;

    /// Stop the service and set its start type to disabled
    fn stop_and_disable(&self, name: &str) -> MonitorResult<String>;
}

/// CIM inventory + `sc.exe`
pub struct ScServiceControl;

impl ServiceControl for ScServiceControl {
    #[cfg(windows)]
    fn list(&self) -> MonitorResult<Vec<ServiceInfo>> {
        let out = super::shell::run_powershell(
            "Get-CimInstance Win32_Service | Select-Object Name,DisplayName,State,ProcessId,PathName,StartMode | ConvertTo-Json -Compress",
        )?;
        super::shell::parse_json_rows(&out)
    }

    #[cfg(not(windows))]
    fn list(&self) -> MonitorResult<Vec<ServiceInfo>> {
        Err(MonitorError::EnumerationBackendUnavailable("Win32_Service".to_string()))
    }

    fn stop_and_disable(&self, name: &str) -> MonitorResult<String> {
        if cfg!(not(windows)) {
            return Err(MonitorError::EnumerationBackendUnavailable("sc.exe".to_string()));
        }

        match super::shell::run_command("sc", &["stop", name]) {
            Ok(_) => {}
            Err(MonitorError::CommandFailed { exit_code, .. }) if exit_code == ERROR_SERVICE_NOT_ACTIVE => {
                log::debug!("Service {} was not running", name);
            }
            Err(e) => return Err(e),
        }

        super::shell::run_command("sc", &["config", name, "start=", "disabled"])?;
        log::warn!("Service {} stopped and disabled", name);
        Ok(format!("Service {} stopped and disabled", name))
    }
}

/// Fixed inventory that records every stop request
#[derive(Default)]
pub struct StaticServices {
    pub services: Vec<ServiceInfo>,
    pub stopped: Mutex<Vec<String>>,
}

impl ServiceControl for StaticServices {
    fn list(&self) -> MonitorResult<Vec<ServiceInfo>> {
        Ok(self.services.clone())
    }

    fn stop_and_disable(&self, name: &str) -> MonitorResult<String> {
        if !self.services.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(MonitorError::NotFound(format!("service {}", name)));
        }
        self.stopped.lock().push(name.to_string());
        Ok(format!("Service {} stopped and disabled", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::shell::parse_json_rows;

    #[test]
    fn test_parse_cim_rows() {
        let json = r#"[
            {"Name":"Spooler","DisplayName":"Print Spooler","State":"Running","ProcessId":1234,
             "PathName":"C:\\Windows\\System32\\spoolsv.exe","StartMode":"Auto"},
            {"Name":"Fax","DisplayName":"Fax","State":"Stopped","ProcessId":0,"PathName":null,"StartMode":"Manual"}
        ]"#;
        let rows: Vec<ServiceInfo> = parse_json_rows(json).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_running());
        assert_eq!(rows[0].pid(), Some(1234));
        assert_eq!(rows[1].pid(), None);
        assert_eq!(rows[1].bin_path(), "");
    }

    #[test]
    fn test_static_stop_unknown_service() {
        let control = StaticServices::default();
        assert!(control.stop_and_disable("nope").unwrap_err().is_not_found());
    }
}
