//! Platform Probes - Native counters not covered by sysinfo
//!
//! IO operation counters, battery status and fullscreen detection come from Win32.
//! Other platforms report "not available" and callers fall back to neutral values.

use serde::{Deserialize, Serialize};

/// Cumulative IO operation counters of one process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoOps {
    pub read: u64,
    pub write: u64,
    pub other: u64,
}

/// Battery snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub percent: f32,
    pub plugged: bool,
}

#[cfg(windows)]
mod imp {
    use super::{BatteryState, IoOps};
    use windows::Win32::Foundation::{CloseHandle, HWND, RECT};
    use windows::Win32::Graphics::Gdi::{GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST};
    use windows::Win32::System::Power::{GetSystemPowerStatus, SYSTEM_POWER_STATUS};
    use windows::Win32::System::Threading::{
        GetProcessIoCounters, OpenProcess, IO_COUNTERS, PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetDesktopWindow, GetForegroundWindow, GetShellWindow, GetWindowRect,
    };

    pub fn io_counters(pid: u32) -> Option<IoOps> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
            let mut counters = IO_COUNTERS::default();
            let result = GetProcessIoCounters(handle, &mut counters);
            let _ = CloseHandle(handle);
            result.ok()?;

            Some(IoOps {
                read: counters.ReadOperationCount,
                write: counters.WriteOperationCount,
                other: counters.OtherOperationCount,
            })
        }
    }

    pub fn battery() -> Option<BatteryState> {
        let mut status = SYSTEM_POWER_STATUS::default();
        unsafe { GetSystemPowerStatus(&mut status).ok()? };

        // 128 = no system battery, 255 = unknown
        if status.BatteryFlag == 128 || status.BatteryFlag == 255 || status.BatteryLifePercent == 255 {
            return None;
        }

        Some(BatteryState {
            percent: status.BatteryLifePercent as f32,
            plugged: status.ACLineStatus == 1,
        })
    }

    pub fn fullscreen_foreground() -> bool {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd == HWND::default() || hwnd == GetDesktopWindow() || hwnd == GetShellWindow() {
                return false;
            }

            let mut rect = RECT::default();
            if GetWindowRect(hwnd, &mut rect).is_err() {
                return false;
            }

            let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
            let mut info = MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if !GetMonitorInfoW(monitor, &mut info).as_bool() {
                return false;
            }

            let screen = info.rcMonitor;
            rect.left <= screen.left
                && rect.top <= screen.top
                && rect.right >= screen.right
                && rect.bottom >= screen.bottom
        }
    }
}

#[cfg(not(windows))]
mod imp {
    use super::{BatteryState, IoOps};

    pub fn io_counters(_pid: u32) -> Option<IoOps> {
        None
    }

    pub fn battery() -> Option<BatteryState> {
        None
    }

    pub fn fullscreen_foreground() -> bool {
        false
    }
}

/// IO op counters of a live process, None under access restriction
pub fn io_counters(pid: u32) -> Option<IoOps> {
    imp::io_counters(pid)
}

/// Battery status, None when the machine has no battery
pub fn battery() -> Option<BatteryState> {
    imp::battery()
}

/// Whether the foreground window covers its whole monitor
pub fn fullscreen_foreground() -> bool {
    imp::fullscreen_foreground()
}
