//! Environment Context
//!
//! Machine-wide conditions that shift every score: battery, free disk, fullscreen.

use serde::{Deserialize, Serialize};

use crate::logic::collector::SystemLoad;
use crate::logic::platform::{self, BatteryState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvContext {
    /// None when the machine has no battery
    pub battery: Option<BatteryState>,
    /// Free space of the system drive, None when unknown
    pub disk_free_percent: Option<f32>,
    /// Foreground window covers its monitor
    pub fullscreen: bool,
}

impl EnvContext {
    /// Read the live machine state
    pub fn probe(load: &SystemLoad) -> Self {
        Self {
            battery: platform::battery(),
            disk_free_percent: load.disk_free_percent(),
            fullscreen: platform::fullscreen_foreground(),
        }
    }

    pub fn with_battery(mut self, percent: f32, plugged: bool) -> Self {
        self.battery = Some(BatteryState { percent, plugged });
        self
    }

    pub fn with_disk_free(mut self, percent: f32) -> Self {
        self.disk_free_percent = Some(percent);
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// On battery, unplugged, below `threshold` percent
    pub fn low_battery(&self, threshold: f32) -> bool {
        matches!(self.battery, Some(b) if !b.plugged && b.percent < threshold)
    }

    pub fn low_disk(&self, threshold: f32) -> bool {
        matches!(self.disk_free_percent, Some(free) if free < threshold)
    }
}
