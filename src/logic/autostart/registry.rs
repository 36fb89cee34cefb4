//! Registry Backend
//!
//! Run values, their RunDisabled shadows and the StartupApproved flags all go through
//! `RegistryBackend`. Windows uses winreg; `MemoryRegistry` serves tests and platforms
//! without a registry.

use std::collections::BTreeMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::types::{ApprovalState, Hive, RegView};
use crate::logic::error::{MonitorError, MonitorResult};

// ============================================================================
// KEYS
// ============================================================================

pub const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
pub const RUN_DISABLED_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\RunDisabled";
pub const APPROVED_RUN_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\StartupApproved\Run";
pub const APPROVED_FOLDER_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\StartupApproved\StartupFolder";

/// Approval record: first byte is the flag, the remaining 7 bytes are zero
pub const APPROVAL_ENABLED: [u8; 8] = [0x02, 0, 0, 0, 0, 0, 0, 0];
pub const APPROVAL_DISABLED: [u8; 8] = [0x03, 0, 0, 0, 0, 0, 0, 0];

/// Decode an approval record; None when the flag byte is not recognised
pub fn decode_approval(bytes: &[u8]) -> Option<ApprovalState> {
    match bytes.first()? {
        0x02 | 0x06 => Some(ApprovalState::Enabled),
        0x01 | 0x03 | 0x07 => Some(ApprovalState::Disabled),
        _ => None,
    }
}

// ============================================================================
// VALUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegKind {
    None,
    Sz,
    ExpandSz,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiSz,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
}

impl RegKind {
    pub fn code(&self) -> u32 {
        match self {
            RegKind::None => 0,
            RegKind::Sz => 1,
            RegKind::ExpandSz => 2,
            RegKind::Binary => 3,
            RegKind::Dword => 4,
            RegKind::DwordBigEndian => 5,
            RegKind::Link => 6,
            RegKind::MultiSz => 7,
            RegKind::ResourceList => 8,
            RegKind::FullResourceDescriptor => 9,
            RegKind::ResourceRequirementsList => 10,
            RegKind::Qword => 11,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => RegKind::Sz,
            2 => RegKind::ExpandSz,
            3 => RegKind::Binary,
            4 => RegKind::Dword,
            5 => RegKind::DwordBigEndian,
            6 => RegKind::Link,
            7 => RegKind::MultiSz,
            8 => RegKind::ResourceList,
            9 => RegKind::FullResourceDescriptor,
            10 => RegKind::ResourceRequirementsList,
            11 => RegKind::Qword,
            _ => RegKind::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegKind::None => "REG_NONE",
            RegKind::Sz => "REG_SZ",
            RegKind::ExpandSz => "REG_EXPAND_SZ",
            RegKind::Binary => "REG_BINARY",
            RegKind::Dword => "REG_DWORD",
            RegKind::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            RegKind::Link => "REG_LINK",
            RegKind::MultiSz => "REG_MULTI_SZ",
            RegKind::ResourceList => "REG_RESOURCE_LIST",
            RegKind::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            RegKind::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            RegKind::Qword => "REG_QWORD",
        }
    }
}

/// Raw registry value: type tag plus the exact stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegValue {
    pub kind: RegKind,
    pub bytes: Vec<u8>,
}

impl RegValue {
    /// REG_SZ encoded as NUL-terminated UTF-16LE
    pub fn string(s: &str) -> Self {
        let bytes = s
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect();
        Self { kind: RegKind::Sz, bytes }
    }

    pub fn binary(bytes: &[u8]) -> Self {
        Self { kind: RegKind::Binary, bytes: bytes.to_vec() }
    }

    /// Text of a string value; other kinds render as hex
    pub fn to_display_string(&self) -> String {
        match self.kind {
            RegKind::Sz | RegKind::ExpandSz | RegKind::MultiSz | RegKind::Link => {
                let units: Vec<u16> = self
                    .bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                let text = String::from_utf16_lossy(&units);
                text.trim_end_matches('\0').replace('\0', " ")
            }
            _ => hex::encode(&self.bytes),
        }
    }
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

pub trait RegistryBackend: Send + Sync {
    /// Views present on this platform, native first
    fn views(&self) -> Vec<RegView>;

    /// All values of a key; a missing key yields an empty list
    fn list_values(&self, hive: Hive, path: &str, view: RegView) -> MonitorResult<Vec<(String, RegValue)>>;

    fn get_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<Option<RegValue>>;

    /// Write one value, creating the key when needed
    fn set_value(&self, hive: Hive, path: &str, name: &str, value: &RegValue, view: RegView) -> MonitorResult<()>;

    /// Remove one value; Ok(false) when it did not exist
    fn delete_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<bool>;
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Which operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Read,
    Write,
    Delete,
}

#[derive(Debug, Clone)]
struct Fault {
    op: FaultOp,
    view: Option<RegView>,
    path_contains: String,
}

type KeyId = (Hive, RegView, String);

/// Registry kept in memory, with per-view namespaces and injectable faults
#[derive(Default)]
pub struct MemoryRegistry {
    keys: Mutex<BTreeMap<KeyId, BTreeMap<String, (String, RegValue)>>>,
    faults: Mutex<Vec<Fault>>,
    mutations: Mutex<u64>,
    single_view: bool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of a 32-bit platform: only the native view exists
    pub fn single_view() -> Self {
        Self { single_view: true, ..Self::default() }
    }

    /// Make every matching operation fail with AccessDenied
    pub fn inject_fault(&self, op: FaultOp, view: Option<RegView>, path_contains: &str) {
        self.faults.lock().push(Fault {
            op,
            view,
            path_contains: path_contains.to_lowercase(),
        });
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of successful writes and deletes so far
    pub fn mutation_count(&self) -> u64 {
        *self.mutations.lock()
    }

    fn check_fault(&self, op: FaultOp, path: &str, view: RegView) -> MonitorResult<()> {
        let path = path.to_lowercase();
        let hit = self.faults.lock().iter().any(|f| {
            f.op == op && f.view.map_or(true, |v| v == view) && path.contains(&f.path_contains)
        });
        if hit {
            return Err(MonitorError::AccessDenied(format!("{} ({})", path, view.as_str())));
        }
        Ok(())
    }

    fn key_id(hive: Hive, path: &str, view: RegView) -> KeyId {
        (hive, view, path.to_lowercase())
    }
}

impl RegistryBackend for MemoryRegistry {
    fn views(&self) -> Vec<RegView> {
        if self.single_view {
            vec![RegView::Native]
        } else {
            vec![RegView::Native, RegView::Wow32]
        }
    }

    fn list_values(&self, hive: Hive, path: &str, view: RegView) -> MonitorResult<Vec<(String, RegValue)>> {
        self.check_fault(FaultOp::Read, path, view)?;
        let keys = self.keys.lock();
        Ok(keys
            .get(&Self::key_id(hive, path, view))
            .map(|values| values.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<Option<RegValue>> {
        self.check_fault(FaultOp::Read, path, view)?;
        let keys = self.keys.lock();
        Ok(keys
            .get(&Self::key_id(hive, path, view))
            .and_then(|values| values.get(&name.to_lowercase()))
            .map(|(_, v)| v.clone()))
    }

    fn set_value(&self, hive: Hive, path: &str, name: &str, value: &RegValue, view: RegView) -> MonitorResult<()> {
        self.check_fault(FaultOp::Write, path, view)?;
        self.keys
            .lock()
            .entry(Self::key_id(hive, path, view))
            .or_default()
            .insert(name.to_lowercase(), (name.to_string(), value.clone()));
        *self.mutations.lock() += 1;
        Ok(())
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<bool> {
        self.check_fault(FaultOp::Delete, path, view)?;
        let removed = self
            .keys
            .lock()
            .get_mut(&Self::key_id(hive, path, view))
            .and_then(|values| values.remove(&name.to_lowercase()))
            .is_some();
        if removed {
            *self.mutations.lock() += 1;
        }
        Ok(removed)
    }
}

// ============================================================================
// WINDOWS BACKEND
// ============================================================================

#[cfg(windows)]
pub use win::WinRegistry;

#[cfg(windows)]
mod win {
    use std::io;
    use winreg::enums::*;
    use winreg::RegKey;

    use super::{Hive, RegKind, RegValue, RegView, RegistryBackend};
    use crate::logic::error::{MonitorError, MonitorResult};

    pub struct WinRegistry {
        wow64: bool,
    }

    impl WinRegistry {
        pub fn new() -> Self {
            let wow64 = cfg!(target_pointer_width = "64")
                || std::env::var_os("PROCESSOR_ARCHITEW6432").is_some();
            Self { wow64 }
        }

        fn root(hive: Hive) -> RegKey {
            match hive {
                Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
                Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            }
        }

        fn view_flag(view: RegView) -> u32 {
            match view {
                RegView::Native => KEY_WOW64_64KEY,
                RegView::Wow32 => KEY_WOW64_32KEY,
            }
        }

        fn open(hive: Hive, path: &str, view: RegView, access: u32) -> io::Result<RegKey> {
            Self::root(hive).open_subkey_with_flags(path, access | Self::view_flag(view))
        }

        fn context(hive: Hive, path: &str, view: RegView) -> String {
            format!("{}\\{} ({})", hive.as_str(), path, view.as_str())
        }
    }

    impl Default for WinRegistry {
        fn default() -> Self {
            Self::new()
        }
    }

    fn kind_of(vtype: &RegType) -> RegKind {
        RegKind::from_code(vtype.clone() as u32)
    }

    fn vtype_of(kind: RegKind) -> RegType {
        match kind {
            RegKind::None => REG_NONE,
            RegKind::Sz => REG_SZ,
            RegKind::ExpandSz => REG_EXPAND_SZ,
            RegKind::Binary => REG_BINARY,
            RegKind::Dword => REG_DWORD,
            RegKind::DwordBigEndian => REG_DWORD_BIG_ENDIAN,
            RegKind::Link => REG_LINK,
            RegKind::MultiSz => REG_MULTI_SZ,
            RegKind::ResourceList => REG_RESOURCE_LIST,
            RegKind::FullResourceDescriptor => REG_FULL_RESOURCE_DESCRIPTOR,
            RegKind::ResourceRequirementsList => REG_RESOURCE_REQUIREMENTS_LIST,
            RegKind::Qword => REG_QWORD,
        }
    }

    impl RegistryBackend for WinRegistry {
        fn views(&self) -> Vec<RegView> {
            if self.wow64 {
                vec![RegView::Native, RegView::Wow32]
            } else {
                vec![RegView::Native]
            }
        }

        fn list_values(&self, hive: Hive, path: &str, view: RegView) -> MonitorResult<Vec<(String, RegValue)>> {
            let key = match Self::open(hive, path, view, KEY_READ) {
                Ok(k) => k,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(MonitorError::from_io(&Self::context(hive, path, view), e)),
            };

            Ok(key
                .enum_values()
                .filter_map(|r| r.ok())
                .map(|(name, v)| (name, RegValue { kind: kind_of(&v.vtype), bytes: v.bytes }))
                .collect())
        }

        fn get_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<Option<RegValue>> {
            let key = match Self::open(hive, path, view, KEY_READ) {
                Ok(k) => k,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(MonitorError::from_io(&Self::context(hive, path, view), e)),
            };

            match key.get_raw_value(name) {
                Ok(v) => Ok(Some(RegValue { kind: kind_of(&v.vtype), bytes: v.bytes })),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(MonitorError::from_io(&Self::context(hive, path, view), e)),
            }
        }

        fn set_value(&self, hive: Hive, path: &str, name: &str, value: &RegValue, view: RegView) -> MonitorResult<()> {
            let (key, _) = Self::root(hive)
                .create_subkey_with_flags(path, KEY_ALL_ACCESS | Self::view_flag(view))
                .map_err(|e| MonitorError::from_io(&Self::context(hive, path, view), e))?;

            let raw = winreg::RegValue {
                bytes: value.bytes.clone(),
                vtype: vtype_of(value.kind),
            };
            key.set_raw_value(name, &raw)
                .map_err(|e| MonitorError::from_io(&Self::context(hive, path, view), e))
        }

        fn delete_value(&self, hive: Hive, path: &str, name: &str, view: RegView) -> MonitorResult<bool> {
            let key = match Self::open(hive, path, view, KEY_SET_VALUE) {
                Ok(k) => k,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(MonitorError::from_io(&Self::context(hive, path, view), e)),
            };

            match key.delete_value(name) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(MonitorError::from_io(&Self::context(hive, path, view), e)),
            }
        }
    }
}
