//! Collector Engine - Telemetry Sampler
//!
//! Polls per-process CPU, memory, disk and IO-op counters and turns the cumulative
//! counters into per-interval deltas and rates. The previous-counter cache is pruned
//! to live pids on every sample, so pid churn never grows it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Pid, System};

use super::platform::{self, IoOps};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Names matched exactly (lower-case)
const SYSTEM_PROCESS_NAMES: &[&str] = &["system", "system idle process", "ntoskrnl.exe"];

/// Smallest interval used as rate divisor (seconds)
const MIN_ELAPSED_SECS: f64 = 0.001;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One raw reading from the process source
#[derive(Debug, Clone, Default)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_bytes: u64,
    pub disk_read_total: u64,
    pub disk_write_total: u64,
    pub io_ops: Option<IoOps>,
    pub exe_path: Option<String>,
    pub command_line: Option<String>,
}

/// One polling snapshot of one live process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_mb: f64,

    // Cumulative counters
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub io_ops: Option<IoOps>,

    // Best-effort identity
    pub exe_path: Option<String>,
    pub command_line: Option<String>,

    // Deltas against the previous sample of this pid
    pub disk_delta_bytes: u64,
    pub net_ops_delta: u64,
    pub disk_kb_per_sec: f64,
    pub net_ops_per_sec: f64,
}

/// Machine-wide load
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemLoad {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_used_percent: Option<f32>,
}

impl SystemLoad {
    pub fn disk_free_percent(&self) -> Option<f32> {
        self.disk_used_percent.map(|used| (100.0 - used).max(0.0))
    }
}

#[derive(Debug, Clone, Copy)]
struct PreviousCounters {
    disk_read: u64,
    disk_write: u64,
    read_ops: u64,
    other_ops: u64,
    at: Instant,
}

// ============================================================================
// PROCESS SOURCE
// ============================================================================

/// Where raw process readings come from
pub trait ProcessSource: Send {
    /// Current process list; processes that cannot be read are left out
    fn processes(&mut self) -> Vec<RawProcess>;

    /// Machine-wide CPU, memory and system-drive usage
    fn system_load(&mut self) -> SystemLoad;

    /// Terminate a process by pid
    fn terminate(&mut self, pid: u32) -> bool;
}

/// sysinfo-backed source used in production
pub struct SysinfoSource {
    system: System,
    disks: Disks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoSource {
    fn processes(&mut self) -> Vec<RawProcess> {
        self.system.refresh_memory();
        self.system.refresh_processes();

        let total_memory = self.system.total_memory() as f64;

        self.system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let memory_bytes = process.memory();
                let disk = process.disk_usage();
                let cmd = process.cmd().join(" ");

                RawProcess {
                    pid: pid.as_u32(),
                    name: process.name().to_string(),
                    cpu_percent: process.cpu_usage(),
                    memory_percent: if total_memory > 0.0 {
                        (memory_bytes as f64 / total_memory * 100.0) as f32
                    } else {
                        0.0
                    },
                    memory_bytes,
                    disk_read_total: disk.total_read_bytes,
                    disk_write_total: disk.total_written_bytes,
                    io_ops: platform::io_counters(pid.as_u32()),
                    exe_path: process.exe().map(|p| p.to_string_lossy().to_string()),
                    command_line: if cmd.is_empty() { None } else { Some(cmd) },
                }
            })
            .collect()
    }

    fn system_load(&mut self) -> SystemLoad {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.disks.refresh();

        let cpus = self.system.cpus();
        let cpu_percent = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let total = self.system.total_memory() as f64;
        let memory_percent = if total > 0.0 {
            (self.system.used_memory() as f64 / total * 100.0) as f32
        } else {
            0.0
        };

        let root = if cfg!(windows) { "C:\\" } else { "/" };
        let disk_used_percent = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new(root))
            .or_else(|| self.disks.list().iter().max_by_key(|d| d.total_space()))
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space().saturating_sub(d.available_space());
                (used as f64 / d.total_space() as f64 * 100.0) as f32
            });

        SystemLoad {
            cpu_percent,
            memory_percent,
            disk_used_percent,
        }
    }

    fn terminate(&mut self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        self.system.refresh_process(pid);
        match self.system.process(pid) {
            Some(process) => process.kill(),
            None => false,
        }
    }
}

// ============================================================================
// SAMPLER
// ============================================================================

/// Whether a process name is a kernel / idle pseudo-process
pub fn is_system_process_name(name: &str) -> bool {
    let low = name.trim().to_lowercase();
    if low.is_empty() {
        return true;
    }
    low.contains("idle") || SYSTEM_PROCESS_NAMES.contains(&low.as_str())
}

pub struct TelemetrySampler {
    source: Box<dyn ProcessSource>,
    previous: HashMap<u32, PreviousCounters>,
}

impl TelemetrySampler {
    pub fn new(source: Box<dyn ProcessSource>) -> Self {
        Self {
            source,
            previous: HashMap::new(),
        }
    }

    /// Take one snapshot of all non-system processes
    pub fn sample(&mut self) -> BTreeMap<u32, ProcessSample> {
        self.sample_at(Instant::now())
    }

    pub(crate) fn sample_at(&mut self, now: Instant) -> BTreeMap<u32, ProcessSample> {
        let mut samples = BTreeMap::new();
        let mut seen = HashSet::new();

        for raw in self.source.processes() {
            if is_system_process_name(&raw.name) {
                continue;
            }
            seen.insert(raw.pid);

            let ops = raw.io_ops.unwrap_or_default();
            let current = PreviousCounters {
                disk_read: raw.disk_read_total,
                disk_write: raw.disk_write_total,
                read_ops: ops.read,
                other_ops: ops.other,
                at: now,
            };

            // First sighting of a pid has no baseline, so its deltas are zero.
            let (disk_delta, net_delta, elapsed) = match self.previous.get(&raw.pid) {
                Some(prev) => (
                    current.disk_read.saturating_sub(prev.disk_read)
                        + current.disk_write.saturating_sub(prev.disk_write),
                    current.other_ops.saturating_sub(prev.other_ops)
                        + current.read_ops.saturating_sub(prev.read_ops),
                    now.saturating_duration_since(prev.at).as_secs_f64(),
                ),
                None => (0, 0, 0.0),
            };
            self.previous.insert(raw.pid, current);

            let elapsed = elapsed.max(MIN_ELAPSED_SECS);
            let (disk_rate, net_rate) = if disk_delta == 0 && net_delta == 0 {
                (0.0, 0.0)
            } else {
                (disk_delta as f64 / 1024.0 / elapsed, net_delta as f64 / elapsed)
            };

            samples.insert(
                raw.pid,
                ProcessSample {
                    pid: raw.pid,
                    name: raw.name,
                    cpu_percent: raw.cpu_percent.max(0.0),
                    memory_percent: raw.memory_percent.max(0.0),
                    memory_mb: raw.memory_bytes as f64 / 1024.0 / 1024.0,
                    disk_read_bytes: raw.disk_read_total,
                    disk_write_bytes: raw.disk_write_total,
                    io_ops: raw.io_ops,
                    exe_path: raw.exe_path.filter(|p| !p.is_empty()),
                    command_line: raw.command_line,
                    disk_delta_bytes: disk_delta,
                    net_ops_delta: net_delta,
                    disk_kb_per_sec: disk_rate,
                    net_ops_per_sec: net_rate,
                },
            );
        }

        self.previous.retain(|pid, _| seen.contains(pid));

        log::debug!("Sampled {} processes, tracking {} pids", samples.len(), self.previous.len());
        samples
    }

    pub fn system_load(&mut self) -> SystemLoad {
        self.source.system_load()
    }

    pub fn terminate(&mut self, pid: u32) -> bool {
        self.source.terminate(pid)
    }

    pub fn tracked_pids(&self) -> usize {
        self.previous.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use parking_lot::Mutex;

    /// Replays whatever the test puts into the shared list
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedSource {
        pub(crate) procs: Arc<Mutex<Vec<RawProcess>>>,
        pub(crate) load: Arc<Mutex<SystemLoad>>,
        pub(crate) killed: Arc<Mutex<Vec<u32>>>,
    }

    impl ProcessSource for ScriptedSource {
        fn processes(&mut self) -> Vec<RawProcess> {
            self.procs.lock().clone()
        }

        fn system_load(&mut self) -> SystemLoad {
            *self.load.lock()
        }

        fn terminate(&mut self, pid: u32) -> bool {
            let mut procs = self.procs.lock();
            let before = procs.len();
            procs.retain(|p| p.pid != pid);
            if procs.len() < before {
                self.killed.lock().push(pid);
                true
            } else {
                false
            }
        }
    }

    pub(crate) fn proc(pid: u32, name: &str, read: u64, write: u64, other_ops: u64) -> RawProcess {
        RawProcess {
            pid,
            name: name.to_string(),
            cpu_percent: 1.0,
            memory_percent: 0.5,
            disk_read_total: read,
            disk_write_total: write,
            io_ops: Some(IoOps { read: 0, write: 0, other: other_ops }),
            ..Default::default()
        }
    }

    #[test]
    fn test_system_process_filter() {
        assert!(is_system_process_name("System"));
        assert!(is_system_process_name("System Idle Process"));
        assert!(is_system_process_name("IdleWorker"));
        assert!(is_system_process_name(""));
        assert!(!is_system_process_name("systemsettings.exe"));
        assert!(!is_system_process_name("chrome.exe"));
    }

    #[test]
    fn test_deltas_and_rates() {
        let source = ScriptedSource::default();
        let mut sampler = TelemetrySampler::new(Box::new(source.clone()));
        let t0 = Instant::now();

        *source.procs.lock() = vec![proc(10, "app.exe", 1000, 0, 5)];
        let first = sampler.sample_at(t0);
        assert_eq!(first[&10].disk_delta_bytes, 0);

        *source.procs.lock() = vec![proc(10, "app.exe", 1000 + 4096, 1024, 25)];
        let second = sampler.sample_at(t0 + Duration::from_secs(2));
        let s = &second[&10];
        assert_eq!(s.disk_delta_bytes, 5120);
        assert_eq!(s.net_ops_delta, 20);
        assert!((s.disk_kb_per_sec - 2.5).abs() < 1e-9);
        assert!((s.net_ops_per_sec - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_reset_never_negative() {
        let source = ScriptedSource::default();
        let mut sampler = TelemetrySampler::new(Box::new(source.clone()));
        let t0 = Instant::now();

        *source.procs.lock() = vec![proc(7, "a.exe", 50_000, 50_000, 100)];
        sampler.sample_at(t0);

        // pid reused by a fresh process with smaller counters
        *source.procs.lock() = vec![proc(7, "b.exe", 10, 10, 1)];
        let s = sampler.sample_at(t0 + Duration::from_secs(1));
        assert_eq!(s[&7].disk_delta_bytes, 0);
        assert_eq!(s[&7].net_ops_delta, 0);
    }

    #[test]
    fn test_vanished_pids_are_pruned() {
        let source = ScriptedSource::default();
        let mut sampler = TelemetrySampler::new(Box::new(source.clone()));
        let t0 = Instant::now();

        *source.procs.lock() = (1..=50).map(|p| proc(p, "worker.exe", 0, 0, 0)).collect();
        sampler.sample_at(t0);
        assert_eq!(sampler.tracked_pids(), 50);

        *source.procs.lock() = vec![proc(3, "worker.exe", 0, 0, 0)];
        sampler.sample_at(t0 + Duration::from_secs(1));
        assert_eq!(sampler.tracked_pids(), 1);
    }

    #[test]
    fn test_system_processes_excluded() {
        let source = ScriptedSource::default();
        let mut sampler = TelemetrySampler::new(Box::new(source.clone()));

        *source.procs.lock() = vec![
            proc(0, "System Idle Process", 0, 0, 0),
            proc(4, "System", 0, 0, 0),
            proc(100, "explorer.exe", 0, 0, 0),
        ];
        let s = sampler.sample();
        assert_eq!(s.len(), 1);
        assert!(s.contains_key(&100));
    }
}
