//! Report Export - tab-delimited dump of the heaviest processes

use std::fs;
use std::path::Path;

use super::collector::ProcessSample;
use super::error::{MonitorError, MonitorResult};
use super::scan::TelemetrySnapshot;
use super::scoring::load_index;
use crate::constants;

const HEADER: &str = "PID\tName\tCPU%\tMEM%\tMEM_MB\tDisk_KB/s\tNet_ops/s\tLoad";

/// Processes of a snapshot ranked by load index, heaviest first
pub fn top_by_load(snapshot: &TelemetrySnapshot, top_n: usize) -> Vec<&ProcessSample> {
    let mut rows: Vec<&ProcessSample> = snapshot.samples.values().collect();
    rows.sort_by(|a, b| load_index(b).total_cmp(&load_index(a)).then(a.pid.cmp(&b.pid)));
    rows.truncate(top_n);
    rows
}

pub fn render_report(snapshot: &TelemetrySnapshot, top_n: usize) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut out = String::new();
    out.push_str(&format!("# {} {}\n", constants::APP_NAME, constants::APP_VERSION));
    out.push_str(&format!("# Host: {}\n", host));
    out.push_str(&format!("# Snapshot: {}\n", snapshot.taken_at.to_rfc3339()));
    out.push_str(&format!(
        "# System: CPU {:.1}% | RAM {:.1}%\n",
        snapshot.load.cpu_percent, snapshot.load.memory_percent
    ));
    out.push_str(HEADER);
    out.push('\n');

    for s in top_by_load(snapshot, top_n) {
        // Tabs inside names would shift columns
        let name = s.name.replace('\t', " ");
        out.push_str(&format!(
            "{}\t{}\t{:.1}\t{:.1}\t{:.1}\t{:.1}\t{:.1}\t{:.1}\n",
            s.pid,
            name,
            s.cpu_percent,
            s.memory_percent,
            s.memory_mb,
            s.disk_kb_per_sec,
            s.net_ops_per_sec,
            load_index(s)
        ));
    }
    out
}

/// Write the report; returns the number of process rows
pub fn write_report(snapshot: &TelemetrySnapshot, path: &Path, top_n: usize) -> MonitorResult<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MonitorError::from_io(&parent.display().to_string(), e))?;
    }
    let body = render_report(snapshot, top_n);
    fs::write(path, &body).map_err(|e| MonitorError::from_io(&path.display().to_string(), e))?;

    let rows = snapshot.samples.len().min(top_n);
    log::info!("Report with {} rows written to {}", rows, path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, name: &str, cpu: f32, mem: f32) -> ProcessSample {
        ProcessSample {
            pid,
            name: name.to_string(),
            cpu_percent: cpu,
            memory_percent: mem,
            memory_mb: 10.0,
            disk_read_bytes: 0,
            disk_write_bytes: 0,
            io_ops: None,
            exe_path: None,
            command_line: None,
            disk_delta_bytes: 0,
            net_ops_delta: 0,
            disk_kb_per_sec: 0.0,
            net_ops_per_sec: 0.0,
        }
    }

    fn snapshot() -> TelemetrySnapshot {
        let mut snap = TelemetrySnapshot::empty();
        for (pid, name, cpu, mem) in [(1, "idle.exe", 0.0, 0.1), (2, "busy.exe", 30.0, 5.0), (3, "mid.exe", 5.0, 1.0)] {
            snap.samples.insert(pid, sample(pid, name, cpu, mem));
        }
        snap
    }

    #[test]
    fn test_rows_ranked_and_truncated() {
        let snap = snapshot();
        let top: Vec<u32> = top_by_load(&snap, 2).iter().map(|s| s.pid).collect();
        assert_eq!(top, vec![2, 3]);
    }

    #[test]
    fn test_report_is_tab_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("performance_report.txt");

        let rows = write_report(&snapshot(), &path, 50).unwrap();
        assert_eq!(rows, 3);

        let body = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2\tbusy.exe\t30.0\t5.0"));
        assert!(lines.iter().all(|l| l.split('\t').count() == 8));
    }
}
