//! JSON document storage shared by preferences and trend history

use std::fs;
use std::io::Write;
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{MonitorError, MonitorResult};

/// Read a JSON document; Ok(None) when the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> MonitorResult<Option<T>> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MonitorError::from_io(&path.display().to_string(), e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| MonitorError::CorruptPreferenceData {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Write through a temp file in the same directory, then rename over the target
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> MonitorResult<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| MonitorError::from_io(&parent.display().to_string(), e))?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MonitorError::from_io(&path.display().to_string(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_is_none_and_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let missing: Option<BTreeMap<String, u32>> = read_json(&path).unwrap();
        assert!(missing.is_none());

        fs::write(&path, "{ not json").unwrap();
        let err = read_json::<BTreeMap<String, u32>>(&path).unwrap_err();
        assert!(matches!(err, MonitorError::CorruptPreferenceData { .. }));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1u32);
        write_json_atomic(&path, &doc).unwrap();
        doc.insert("b".to_string(), 2);
        write_json_atomic(&path, &doc).unwrap();

        let back: BTreeMap<String, u32> = read_json(&path).unwrap().unwrap();
        assert_eq!(back, doc);
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
