//! User Preferences - allow list and deny list
//!
//! `{ "whitelist": [..], "blacklist": [..] }`. Names are compared lower-cased and
//! a name lives in at most one list. Every change is flushed immediately.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use super::error::{MonitorError, MonitorResult};
use super::scoring::ListStatus;
use super::storage::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceDoc {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

pub struct PreferenceStore {
    path: PathBuf,
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    /// Set when the file on disk could not be parsed
    corrupt: bool,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl PreferenceStore {
    /// Load, treating a missing or corrupt file as empty. A corrupt file is left in place.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => store,
            Err(e) => {
                log::warn!("Preferences unusable, starting empty: {}", e);
                Self {
                    path: path.to_path_buf(),
                    whitelist: BTreeSet::new(),
                    blacklist: BTreeSet::new(),
                    corrupt: matches!(e, MonitorError::CorruptPreferenceData { .. }),
                }
            }
        }
    }

    pub fn try_load(path: &Path) -> MonitorResult<Self> {
        let doc: PreferenceDoc = read_json(path)?.unwrap_or_default();
        let mut store = Self {
            path: path.to_path_buf(),
            whitelist: doc.whitelist.iter().map(|n| key(n)).filter(|n| !n.is_empty()).collect(),
            blacklist: doc.blacklist.iter().map(|n| key(n)).filter(|n| !n.is_empty()).collect(),
            corrupt: false,
        };
        // Hand-edited files may list a name twice; the allow list wins
        let overlap: Vec<String> = store.whitelist.intersection(&store.blacklist).cloned().collect();
        for name in overlap {
            store.blacklist.remove(&name);
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.whitelist.iter().cloned().collect()
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.blacklist.iter().cloned().collect()
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.whitelist.contains(&key(name))
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.blacklist.contains(&key(name))
    }

    /// List status of a subject known under several names
    pub fn status(&self, names: &[&str]) -> ListStatus {
        if names.iter().any(|n| self.is_allowed(n)) {
            ListStatus::Allowed
        } else if names.iter().any(|n| self.is_denied(n)) {
            ListStatus::Denied
        } else {
            ListStatus::Neutral
        }
    }

    /// Add to the allow list; returns whether anything changed
    pub fn allow(&mut self, name: &str) -> MonitorResult<bool> {
        let k = key(name);
        if k.is_empty() {
            return Ok(false);
        }
        let changed = self.blacklist.remove(&k) | self.whitelist.insert(k);
        if changed {
            self.flush()?;
        }
        Ok(changed)
    }

    /// Add to the deny list; returns whether anything changed
    pub fn deny(&mut self, name: &str) -> MonitorResult<bool> {
        let k = key(name);
        if k.is_empty() {
            return Ok(false);
        }
        let changed = self.whitelist.remove(&k) | self.blacklist.insert(k);
        if changed {
            self.flush()?;
        }
        Ok(changed)
    }

    /// Drop a name from both lists
    pub fn forget(&mut self, name: &str) -> MonitorResult<bool> {
        let k = key(name);
        let changed = self.whitelist.remove(&k) | self.blacklist.remove(&k);
        if changed {
            self.flush()?;
        }
        Ok(changed)
    }

    pub fn flush(&mut self) -> MonitorResult<()> {
        if self.corrupt && self.path.exists() {
            let aside = self.path.with_extension("json.corrupt");
            fs::rename(&self.path, &aside).map_err(|e| MonitorError::from_io(&aside.display().to_string(), e))?;
            log::warn!("Moved unreadable preferences to {}", aside.display());
        }
        self.corrupt = false;

        let doc = PreferenceDoc {
            whitelist: self.whitelist(),
            blacklist: self.blacklist(),
        };
        write_json_atomic(&self.path, &doc)?;
        log::debug!("Preferences saved to {}", self.path.display());
        Ok(())
    }
}
