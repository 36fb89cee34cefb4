//! API Module
//!
//! Structure:
//! - commands.rs: operations over the shared `AppContext`, errors as `String`
//!
//! Usage:
//! - `api::commands::list_startup_entries(&ctx)`
//! - `api::disable_startup_entry(&ctx, "onedrive")`

pub mod commands;

pub use commands::*;
