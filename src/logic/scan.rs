//! Scan Scheduling - telemetry polling loop and single-flight background scans
//!
//! The polling loop refreshes the sampler on a fixed interval and publishes an
//! immutable snapshot. Suggestion scans run on the blocking pool; a second request
//! while one is running is rejected with `ScanInProgress`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::collector::{ProcessSample, SystemLoad};
use super::context::AppContext;
use super::error::{MonitorError, MonitorResult};
use super::scoring::EnvContext;
use super::suggestions::SuggestionRecord;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One published view of the machine; readers hold it by `Arc`
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub samples: BTreeMap<u32, ProcessSample>,
    pub load: SystemLoad,
    pub env: EnvContext,
}

impl TelemetrySnapshot {
    pub fn empty() -> Self {
        Self {
            taken_at: Utc::now(),
            samples: BTreeMap::new(),
            load: SystemLoad::default(),
            env: EnvContext::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ============================================================================
// SCAN GUARD
// ============================================================================

/// Held for the duration of one scan; dropping it frees the slot
pub struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl ScanGuard {
    pub fn acquire(flag: &Arc<AtomicBool>) -> MonitorResult<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MonitorError::ScanInProgress);
        }
        Ok(Self { flag: Arc::clone(flag) })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// ASYNC ENTRY POINTS
// ============================================================================

/// Refresh telemetry every `refresh_secs` until the task is aborted
pub fn spawn_telemetry_loop(ctx: Arc<AppContext>) -> JoinHandle<()> {
    let period = Duration::from_secs(ctx.config.sampler.refresh_secs.max(1));

    tokio::spawn(async move {
        log::info!("Telemetry loop started (every {}s)", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let ctx = Arc::clone(&ctx);
            match tokio::task::spawn_blocking(move || ctx.refresh_telemetry()).await {
                Ok(snapshot) => log::debug!("Published snapshot with {} processes", snapshot.samples.len()),
                Err(e) => log::error!("Telemetry refresh panicked: {}", e),
            }
        }
    })
}

/// Run a suggestion scan on the blocking pool
pub async fn scan_in_background(ctx: Arc<AppContext>) -> MonitorResult<Vec<SuggestionRecord>> {
    // Claimed before scheduling so a concurrent request fails immediately
    let guard = ctx.begin_scan()?;

    let worker = Arc::clone(&ctx);
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        worker.scan_locked()
    })
    .await;

    match result {
        Ok(out) => out,
        Err(e) => Err(MonitorError::Io(std::io::Error::other(format!("scan task failed: {}", e)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_single_flight() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = ScanGuard::acquire(&flag).unwrap();
        assert!(matches!(ScanGuard::acquire(&flag), Err(MonitorError::ScanInProgress)));

        drop(first);
        assert!(ScanGuard::acquire(&flag).is_ok());
    }
}
