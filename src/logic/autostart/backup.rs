//! Sidecar Backups - text dump of a registry value before it is moved or removed

use std::fs;
use std::path::{Path, PathBuf};
use chrono::Local;

use super::registry::RegValue;
use super::types::{Hive, RegView};
use crate::logic::error::{MonitorError, MonitorResult};

pub struct BackupWriter {
    dir: PathBuf,
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "value".to_string() } else { cleaned }
}

impl BackupWriter {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{name}_{timestamp}.reg`; returns the file written
    pub fn backup_value(
        &self,
        hive: Hive,
        view: RegView,
        key_path: &str,
        name: &str,
        value: &RegValue,
    ) -> MonitorResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| MonitorError::from_io(&self.dir.display().to_string(), e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("{}_{}", sanitize(name), stamp);
        let mut path = self.dir.join(format!("{}.reg", base));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.reg", base, n));
            n += 1;
        }

        let body = format!(
            "Name: {}\nValue: {}\nType: {}\nHive: {}\nView: {}\nPath: {}\nData: {}\n",
            name,
            value.to_display_string(),
            value.kind.name(),
            hive.as_str(),
            view.as_str(),
            key_path,
            hex::encode(&value.bytes),
        );

        fs::write(&path, body).map_err(|e| MonitorError::from_io(&path.display().to_string(), e))?;
        log::info!("Backed up {} to {}", name, path.display());
        Ok(path)
    }
}
