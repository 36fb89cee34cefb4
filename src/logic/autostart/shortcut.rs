//! Startup Folder Shortcuts
//!
//! Reads `.lnk` / `.lnk.disabled` files and extracts the LocalBasePath of the
//! shell-link binary (MS-SHLLINK). Parsing is best-effort: any malformed field
//! yields None and the shortcut stem is used instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const LINK_EXT: &str = ".lnk";
pub const DISABLED_SUFFIX: &str = ".disabled";

// ============================================================================
// SHELL LINK PARSER
// ============================================================================

const HEADER_SIZE: u32 = 0x4C;
const HAS_LINK_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;
const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x01;

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let b = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_ansi_z(data: &[u8], at: usize) -> Option<String> {
    let tail = data.get(at..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

fn read_utf16_z(data: &[u8], at: usize) -> Option<String> {
    let tail = data.get(at..)?;
    let units: Vec<u16> = tail
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// Target path of a shell link, when it carries a local base path
pub fn read_link_target(data: &[u8]) -> Option<String> {
    if read_u32(data, 0)? != HEADER_SIZE {
        return None;
    }
    let flags = read_u32(data, 0x14)?;
    let mut offset = HEADER_SIZE as usize;

    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        let id_list_size = read_u16(data, offset)? as usize;
        offset += 2 + id_list_size;
    }

    if flags & HAS_LINK_INFO == 0 {
        return None;
    }

    let info = offset;
    let info_header_size = read_u32(data, info + 4)?;
    let info_flags = read_u32(data, info + 8)?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return None;
    }

    // Unicode offsets exist when the LinkInfo header is at least 0x24 bytes
    if info_header_size >= 0x24 {
        let unicode_offset = read_u32(data, info + 0x1C)? as usize;
        if unicode_offset != 0 {
            let path = read_utf16_z(data, info + unicode_offset)?;
            if !path.is_empty() {
                return Some(path);
            }
        }
    }

    let base_offset = read_u32(data, info + 0x10)? as usize;
    read_ansi_z(data, info + base_offset).filter(|p| !p.is_empty())
}

// ============================================================================
// FOLDER SCAN
// ============================================================================

/// One shortcut name in a Startup folder, live and/or disabled
#[derive(Debug, Clone, PartialEq)]
pub struct ShortcutPair {
    pub stem: String,
    pub live: Option<PathBuf>,
    pub disabled: Option<PathBuf>,
    pub target: Option<String>,
}

impl ShortcutPair {
    /// Target path when parsed, else empty; identity then comes from the stem,
    /// which is the same for the live and the disabled file
    pub fn command(&self) -> String {
        self.target.clone().unwrap_or_default()
    }
}

pub fn live_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}{}", stem, LINK_EXT))
}

pub fn disabled_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}{}{}", stem, LINK_EXT, DISABLED_SUFFIX))
}

fn split_name(file_name: &str) -> Option<(String, bool)> {
    let lower = file_name.to_ascii_lowercase();
    let disabled_ext = format!("{}{}", LINK_EXT, DISABLED_SUFFIX);
    if lower.ends_with(&disabled_ext) {
        let stem = &file_name[..file_name.len() - disabled_ext.len()];
        return Some((stem.to_string(), true));
    }
    if lower.ends_with(LINK_EXT) {
        let stem = &file_name[..file_name.len() - LINK_EXT.len()];
        return Some((stem.to_string(), false));
    }
    None
}

/// Read one pair directly, without listing the folder
pub fn probe_pair(dir: &Path, stem: &str) -> ShortcutPair {
    let live = Some(live_path(dir, stem)).filter(|p| p.is_file());
    let disabled = Some(disabled_path(dir, stem)).filter(|p| p.is_file());
    let target = live
        .as_ref()
        .or(disabled.as_ref())
        .and_then(|p| fs::read(p).ok())
        .and_then(|data| read_link_target(&data));

    ShortcutPair { stem: stem.to_string(), live, disabled, target }
}

/// All shortcuts in a folder, grouped by stem. A missing folder is empty.
pub fn scan_folder(dir: &Path) -> Vec<ShortcutPair> {
    let read = match fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("Startup folder {} not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut stems: BTreeMap<String, String> = BTreeMap::new();
    for item in read.flatten() {
        let name = item.file_name().to_string_lossy().into_owned();
        if let Some((stem, _)) = split_name(&name) {
            stems.entry(stem.to_lowercase()).or_insert(stem);
        }
    }

    stems.into_values().map(|stem| probe_pair(dir, &stem)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal link: header + LinkInfo with ANSI and optional Unicode base path
    pub(crate) fn build_link(target: &str, unicode: bool) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE as usize];
        data[0..4].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        data[0x14..0x18].copy_from_slice(&HAS_LINK_INFO.to_le_bytes());

        let header_size: u32 = if unicode { 0x24 } else { 0x1C };
        let ansi: Vec<u8> = target.bytes().chain(std::iter::once(0)).collect();
        let wide: Vec<u8> = target
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect();

        let ansi_offset = header_size;
        let wide_offset = ansi_offset + ansi.len() as u32;
        let total = wide_offset + if unicode { wide.len() as u32 } else { 0 };

        let mut info = vec![0u8; header_size as usize];
        info[0..4].copy_from_slice(&total.to_le_bytes());
        info[4..8].copy_from_slice(&header_size.to_le_bytes());
        info[8..12].copy_from_slice(&VOLUME_ID_AND_LOCAL_BASE_PATH.to_le_bytes());
        info[0x10..0x14].copy_from_slice(&ansi_offset.to_le_bytes());
        if unicode {
            info[0x1C..0x20].copy_from_slice(&wide_offset.to_le_bytes());
        }
        info.extend_from_slice(&ansi);
        if unicode {
            info.extend_from_slice(&wide);
        }

        data.extend_from_slice(&info);
        data
    }

    #[test]
    fn test_read_ansi_target() {
        let data = build_link(r"C:\Tools\sync.exe", false);
        assert_eq!(read_link_target(&data).as_deref(), Some(r"C:\Tools\sync.exe"));
    }

    #[test]
    fn test_read_unicode_target() {
        let data = build_link(r"C:\Programme\Über\app.exe", true);
        assert_eq!(read_link_target(&data).as_deref(), Some(r"C:\Programme\Über\app.exe"));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(read_link_target(b"not a link"), None);
        assert_eq!(read_link_target(&[]), None);
    }

    #[test]
    fn test_scan_groups_live_and_disabled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(live_path(dir.path(), "Sync"), build_link(r"C:\Tools\sync.exe", false)).unwrap();
        fs::write(disabled_path(dir.path(), "Sync"), b"x").unwrap();
        fs::write(disabled_path(dir.path(), "Old"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let pairs = scan_folder(dir.path());
        assert_eq!(pairs.len(), 2);

        let old = pairs.iter().find(|p| p.stem == "Old").unwrap();
        assert!(old.live.is_none());
        assert!(old.disabled.is_some());
        assert_eq!(old.command(), "");

        let sync = pairs.iter().find(|p| p.stem == "Sync").unwrap();
        assert!(sync.live.is_some() && sync.disabled.is_some());
        assert_eq!(sync.command(), r"C:\Tools\sync.exe");
    }

    #[test]
    fn test_missing_folder_is_empty() {
        assert!(scan_folder(Path::new("/definitely/not/here")).is_empty());
    }
}
