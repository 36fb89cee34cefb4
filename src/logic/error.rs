//! Monitor Error - Error taxonomy shared by every engine
//!
//! Per-item failures (one process, one registry key) are logged and skipped by the
//! batch callers; only lifecycle transitions and remediation surface them to the user.

use thiserror::Error;

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Privilege failure on a single process or registry key
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Item vanished between enumeration and action
    #[error("Not found: {0}")]
    NotFound(String),

    /// One of several required writes failed
    #[error("Partial backend failure: {0}")]
    PartialBackendFailure(String),

    /// Preference or history document could not be parsed
    #[error("Corrupt preference data in {path}: {reason}")]
    CorruptPreferenceData { path: String, reason: String },

    /// Optional inventory source is absent on this platform
    #[error("Enumeration backend unavailable: {0}")]
    EnumerationBackendUnavailable(String),

    /// A suggestion scan is already running
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// External command returned a failure
    #[error("Command '{command}' failed ({exit_code}): {stderr}")]
    CommandFailed { command: String, exit_code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MonitorError {
    /// Classify an IO error coming from a registry or filesystem backend.
    pub fn from_io(context: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => MonitorError::NotFound(context.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                MonitorError::AccessDenied(format!("{}: {}", context, err))
            }
            _ => MonitorError::Io(std::io::Error::new(err.kind(), format!("{}: {}", context, err))),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let e = MonitorError::from_io("Run", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(e.is_not_found());

        let e = MonitorError::from_io(
            "Run",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(e, MonitorError::AccessDenied(_)));

        let e = MonitorError::from_io("Run", std::io::Error::other("boom"));
        assert!(e.to_string().contains("boom"));
    }
}
