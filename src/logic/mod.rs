//! Logic Module - Business Logic & Engines
//!
//! Autostart lifecycle, telemetry sampling, risk scoring and suggestions.
//!
//! ## Layout
//! - `autostart/` - registry + Startup folder entries, enable/disable/delete
//! - `collector` / `platform` - process telemetry and Windows-only probes
//! - `scoring/` - composite risk score and tiers
//! - `suggestions/` - suggestion engine, advisor, remediation
//! - `context` / `scan` - owned application state and scheduling

// Foundations
pub mod error;
pub mod config;
pub mod storage;
pub mod shell;
pub mod platform;

// Engines
pub mod autostart;
pub mod collector;
pub mod correlator;
pub mod scoring;
pub mod services;
pub mod prefs;
pub mod suggestions;
pub mod report;

// Orchestration
pub mod context;
pub mod scan;
