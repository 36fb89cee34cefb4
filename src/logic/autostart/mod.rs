//! Autostart Module - Discover and manage programs launched at logon
//!
//! Covers registry Run keys (per-user and machine, native and 32-bit views),
//! their RunDisabled shadows, StartupApproved flags, and Startup folder shortcuts.

pub mod types;
pub mod registry;
pub mod normalize;
pub mod shortcut;
pub mod inventory;
pub mod backup;
pub mod store;
pub mod lifecycle;


pub use types::*;
pub use registry::{MemoryRegistry, RegistryBackend};
pub use inventory::{CimInventory, InventorySource, StaticInventory};
pub use store::AutostartStore;
pub use lifecycle::LifecycleManager;

use std::sync::Arc;

/// Registry backend of the running platform
#[cfg(windows)]
pub fn platform_registry() -> Arc<dyn RegistryBackend> {
    Arc::new(registry::WinRegistry::new())
}

/// No registry outside Windows; an empty in-memory one keeps the engines usable
#[cfg(not(windows))]
pub fn platform_registry() -> Arc<dyn RegistryBackend> {
    log::debug!("No system registry on this platform, using an empty in-memory registry");
    Arc::new(MemoryRegistry::new())
}
