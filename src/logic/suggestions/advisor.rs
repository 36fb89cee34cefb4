//! Advisor - lighter heuristic checks over the live process table
//!
//! Security (suspicious paths, file reputation), resource bottlenecks, memory-growth
//! prediction, power and disk maintenance. Each check is independent; a failing
//! check contributes nothing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use sha2::{Digest, Sha256};

use super::trends::{TrendHistory, TrendPoint};
use super::types::{Category, Priority, RemediationCommand, SuggestionRecord};
use crate::logic::collector::{ProcessSample, SystemLoad};
use crate::logic::config::{SamplerConfig, ScoringConfig};
use crate::logic::prefs::PreferenceStore;
use crate::logic::scoring::{self, EnvContext};
use crate::logic::storage::read_json;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Samples kept per pid for growth detection
const TREND_WINDOW: usize = 12;
const MIN_TREND_SAMPLES: usize = 4;
/// 1 MB per minute, in bytes per second
const GROWTH_BYTES_PER_SEC: f64 = 1024.0 * 1024.0 / 60.0;
const EXITS_BEFORE_WARNING: u32 = 3;
const REPUTATION_ALERT: u8 = 85;

const SUSPICIOUS_PATH_SCORE: u8 = 95;
const HIGH_CPU_SCORE: u8 = 80;
const HIGH_MEMORY_SCORE: u8 = 85;
const FULL_DISK_SCORE: u8 = 75;
const MEMORY_GROWTH_SCORE: u8 = 80;
const FREQUENT_EXIT_SCORE: u8 = 85;
const LOW_BATTERY_SCORE: u8 = 90;
const LOW_DISK_SCORE: u8 = 80;
const PROCESS_MEMORY_CAP: u8 = 90;

/// Everything one advisor pass reads
pub struct AdvisorInputs<'a> {
    pub samples: &'a BTreeMap<u32, ProcessSample>,
    pub load: &'a SystemLoad,
    pub env: &'a EnvContext,
    /// Seconds since the epoch
    pub now: f64,
}

// ============================================================================
// ADVISOR
// ============================================================================

#[derive(Default)]
pub struct Advisor {
    /// sha256 hex -> reputation score (0-100)
    reputation: HashMap<String, u8>,
    /// exe path -> digest, None when unreadable
    digests: HashMap<String, Option<String>>,
    windows: HashMap<u32, VecDeque<TrendPoint>>,
    names: HashMap<u32, String>,
}

impl Advisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reputation(reputation: HashMap<String, u8>) -> Self {
        Self { reputation, ..Self::default() }
    }

    /// Reputation map from `{ "<sha256 hex>": score }`; missing or unreadable means none
    pub fn load(reputation_file: &Path) -> Self {
        match read_json::<HashMap<String, u8>>(reputation_file) {
            Ok(Some(map)) => {
                log::info!("Loaded {} reputation entries", map.len());
                let map = map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
                Self::with_reputation(map)
            }
            Ok(None) => Self::new(),
            Err(e) => {
                log::warn!("Reputation file ignored: {}", e);
                Self::new()
            }
        }
    }

    /// Run every check, apply priorities, and flush trends into `history`
    pub fn run_all_checks(
        &mut self,
        inputs: &AdvisorInputs<'_>,
        prefs: &PreferenceStore,
        history: &mut TrendHistory,
        scoring_config: &ScoringConfig,
        sampler_config: &SamplerConfig,
    ) -> Vec<SuggestionRecord> {
        let samples: BTreeMap<u32, &ProcessSample> = inputs
            .samples
            .iter()
            .filter(|(_, s)| !prefs.is_allowed(&s.name))
            .map(|(pid, s)| (*pid, s))
            .collect();

        let mut out = Vec::new();
        out.extend(self.security_scan(&samples, scoring_config, sampler_config.max_hashed_executables));
        out.extend(resource_bottlenecks(inputs.load, &samples, sampler_config.advisor_top_processes, scoring_config));
        out.extend(self.predictive(inputs.samples, &samples, inputs.now, history, scoring_config));
        out.extend(power(inputs.env, scoring_config));
        out.extend(maintenance(inputs.load, scoring_config));

        apply_priorities(&mut out, history);

        for (pid, window) in &self.windows {
            history.append_trend(*pid, window.iter().copied());
        }

        log::info!("Advisor produced {} suggestion(s)", out.len());
        out
    }

    // ------------------------------------------------------------------------
    // Security
    // ------------------------------------------------------------------------

    fn digest(&mut self, path: &str) -> Option<String> {
        if let Some(cached) = self.digests.get(path) {
            return cached.clone();
        }
        let digest = sha256_file(Path::new(path));
        self.digests.insert(path.to_string(), digest.clone());
        digest
    }

    fn security_scan(
        &mut self,
        samples: &BTreeMap<u32, &ProcessSample>,
        config: &ScoringConfig,
        max_hashed: usize,
    ) -> Vec<SuggestionRecord> {
        let mut out = Vec::new();
        let mut hashed = 0;

        for sample in samples.values() {
            let exe = match sample.exe_path.as_deref() {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };

            if scoring::is_suspicious_path(exe, config) {
                out.push(SuggestionRecord::new(
                    &sample.name,
                    Category::Security,
                    Some(sample.pid),
                    SUSPICIOUS_PATH_SCORE,
                    scoring::tier_for(SUSPICIOUS_PATH_SCORE, false, config.action_threshold),
                    format!("Unknown exe in suspicious path: {}", exe),
                    "Terminate and inspect the file",
                    RemediationCommand::TerminateProcess { pid: sample.pid },
                ));
            }

            if self.reputation.is_empty() || hashed >= max_hashed || !exe.to_lowercase().ends_with(".exe") {
                continue;
            }
            hashed += 1;

            let rep = self.digest(exe).and_then(|d| self.reputation.get(&d).copied());
            if let Some(score) = rep.filter(|s| *s > REPUTATION_ALERT) {
                let score = score.min(100);
                out.push(SuggestionRecord::new(
                    &sample.name,
                    Category::Security,
                    Some(sample.pid),
                    score,
                    scoring::tier_for(score, false, config.action_threshold),
                    format!("File reputation unfavorable: {}", exe),
                    "Terminate and quarantine the file",
                    RemediationCommand::TerminateProcess { pid: sample.pid },
                ));
            }
        }
        out
    }

    // ------------------------------------------------------------------------
    // Predictive
    // ------------------------------------------------------------------------

    fn predictive(
        &mut self,
        all: &BTreeMap<u32, ProcessSample>,
        samples: &BTreeMap<u32, &ProcessSample>,
        now: f64,
        history: &mut TrendHistory,
        config: &ScoringConfig,
    ) -> Vec<SuggestionRecord> {
        // Pids that disappeared since the last pass count as exits
        let vanished: Vec<u32> = self.windows.keys().filter(|pid| !all.contains_key(pid)).copied().collect();
        for pid in vanished {
            self.windows.remove(&pid);
            if let Some(name) = self.names.remove(&pid) {
                history.record_exit(&name);
            }
        }

        let mut out = Vec::new();
        let mut warned: HashSet<String> = HashSet::new();

        for sample in all.values() {
            let rss = (sample.memory_mb * 1024.0 * 1024.0) as u64;
            let window = self.windows.entry(sample.pid).or_default();
            window.push_back(TrendPoint { ts: now, rss });
            while window.len() > TREND_WINDOW {
                window.pop_front();
            }
            self.names.insert(sample.pid, sample.name.clone());

            if !samples.contains_key(&sample.pid) {
                continue;
            }

            if let Some(mb_per_min) = growth_mb_per_min(window) {
                out.push(SuggestionRecord::new(
                    &sample.name,
                    Category::Predictive,
                    Some(sample.pid),
                    MEMORY_GROWTH_SCORE,
                    scoring::tier_for(MEMORY_GROWTH_SCORE, false, config.action_threshold),
                    format!("{} shows memory growth {:.1} MB/min", sample.name, mb_per_min),
                    "Restart to prevent a crash",
                    RemediationCommand::no_action("Restart the application when convenient"),
                ));
            }

            let exits = history.exit_count(&sample.name);
            if exits >= EXITS_BEFORE_WARNING && warned.insert(sample.name.to_lowercase()) {
                out.push(SuggestionRecord::new(
                    &sample.name,
                    Category::Predictive,
                    Some(sample.pid),
                    FREQUENT_EXIT_SCORE,
                    scoring::tier_for(FREQUENT_EXIT_SCORE, false, config.action_threshold),
                    format!("{} has exited {} times recently", sample.name, exits),
                    "Consider reinstalling or updating",
                    RemediationCommand::no_action("Reinstall or update the application"),
                ));
            }
        }
        out
    }
}

fn sha256_file(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Some(hex::encode(hasher.finalize()))
}

/// Growth rate from oldest to newest point, when above 1 MB/min
fn growth_mb_per_min(window: &VecDeque<TrendPoint>) -> Option<f64> {
    if window.len() < MIN_TREND_SAMPLES {
        return None;
    }
    let first = window.front()?;
    let last = window.back()?;
    if last.ts <= first.ts || last.rss <= first.rss {
        return None;
    }
    let rate = (last.rss - first.rss) as f64 / (last.ts - first.ts);
    if rate > GROWTH_BYTES_PER_SEC {
        Some(rate * 60.0 / (1024.0 * 1024.0))
    } else {
        None
    }
}

// ============================================================================
// STATELESS CHECKS
// ============================================================================

fn system_record(category: Category, name: &str, score: u8, description: String, suggestion: &str, config: &ScoringConfig) -> SuggestionRecord {
    SuggestionRecord::new(
        name,
        category,
        None,
        score,
        scoring::tier_for(score, false, config.action_threshold),
        description,
        suggestion,
        RemediationCommand::no_action(suggestion),
    )
}

fn resource_bottlenecks(
    load: &SystemLoad,
    samples: &BTreeMap<u32, &ProcessSample>,
    top_n: usize,
    config: &ScoringConfig,
) -> Vec<SuggestionRecord> {
    let mut out = Vec::new();

    if load.cpu_percent > 80.0 {
        out.push(system_record(
            Category::Performance,
            "System",
            HIGH_CPU_SCORE,
            format!("CPU sustained >80% ({:.0}%)", load.cpu_percent),
            "Close CPU-heavy apps",
            config,
        ));
    }
    if load.memory_percent > 90.0 {
        out.push(system_record(
            Category::Performance,
            "System",
            HIGH_MEMORY_SCORE,
            format!("RAM >90% ({:.0}%)", load.memory_percent),
            "Disable background services",
            config,
        ));
    }
    if let Some(used) = load.disk_used_percent.filter(|u| *u > 90.0) {
        out.push(system_record(
            Category::Performance,
            "System",
            FULL_DISK_SCORE,
            format!("Disk usage >90% ({:.0}%)", used),
            "Clean temp files / disable indexing",
            config,
        ));
    }

    let mut by_memory: Vec<&&ProcessSample> = samples.values().collect();
    by_memory.sort_by(|a, b| b.memory_mb.total_cmp(&a.memory_mb).then(a.pid.cmp(&b.pid)));

    for sample in by_memory.into_iter().take(top_n) {
        let score = ((sample.memory_mb / 200.0) * 100.0).clamp(0.0, PROCESS_MEMORY_CAP as f64) as u8;
        out.push(SuggestionRecord::new(
            &sample.name,
            Category::Process,
            Some(sample.pid),
            score,
            scoring::tier_for(score, false, config.action_threshold),
            format!("{} using {:.1} MB RAM", sample.name, sample.memory_mb),
            "Consider restarting or reducing workload",
            RemediationCommand::no_action("Restart or reduce workload"),
        ));
    }
    out
}

fn power(env: &EnvContext, config: &ScoringConfig) -> Vec<SuggestionRecord> {
    match env.battery {
        Some(b) if env.low_battery(config.low_battery_percent) => vec![system_record(
            Category::Power,
            "Battery",
            LOW_BATTERY_SCORE,
            format!("Battery low: {:.0}%", b.percent),
            "Switch to Battery Saver / close heavy apps",
            config,
        )],
        _ => Vec::new(),
    }
}

fn maintenance(load: &SystemLoad, config: &ScoringConfig) -> Vec<SuggestionRecord> {
    match load.disk_free_percent() {
        Some(free) if free < config.low_disk_free_percent => vec![system_record(
            Category::Maintenance,
            "Drive",
            LOW_DISK_SCORE,
            format!("Free space low on system drive: {:.1}%", free),
            "Run Disk Cleanup / delete temp files",
            config,
        )],
        _ => Vec::new(),
    }
}

/// Score bands, then the user's past decisions override them
pub fn apply_priorities(records: &mut [SuggestionRecord], history: &TrendHistory) {
    for record in records.iter_mut() {
        record.priority = Priority::from_score(record.score);
        if history.is_ignored(&record.description) {
            record.priority = Priority::Low;
        }
        if history.is_killed(&record.description) {
            record.priority = Priority::High;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample(pid: u32, name: &str, mb: f64, exe: Option<&str>) -> ProcessSample {
        ProcessSample {
            pid,
            name: name.to_string(),
            cpu_percent: 0.0,
            memory_percent: 0.0,
            memory_mb: mb,
            disk_read_bytes: 0,
            disk_write_bytes: 0,
            io_ops: None,
            exe_path: exe.map(String::from),
            command_line: None,
            disk_delta_bytes: 0,
            net_ops_delta: 0,
            disk_kb_per_sec: 0.0,
            net_ops_per_sec: 0.0,
        }
    }

    struct Harness {
        advisor: Advisor,
        prefs: PreferenceStore,
        history: TrendHistory,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        Harness {
            advisor: Advisor::new(),
            prefs: PreferenceStore::load(&dir.path().join("prefs.json")),
            history: TrendHistory::load(&dir.path().join("history.json")),
            _dir: dir,
        }
    }

    fn run(h: &mut Harness, samples: &BTreeMap<u32, ProcessSample>, load: SystemLoad, env: EnvContext, now: f64) -> Vec<SuggestionRecord> {
        let inputs = AdvisorInputs { samples, load: &load, env: &env, now };
        h.advisor.run_all_checks(&inputs, &h.prefs, &mut h.history, &ScoringConfig::default(), &SamplerConfig::default())
    }

    fn table(samples: Vec<ProcessSample>) -> BTreeMap<u32, ProcessSample> {
        samples.into_iter().map(|s| (s.pid, s)).collect()
    }

    #[test]
    fn test_suspicious_path_flagged() {
        let mut h = harness();
        let samples = table(vec![sample(4, "miner.exe", 10.0, Some(r"C:\Users\a\AppData\Local\Temp\miner.exe"))]);
        let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), 0.0);

        let sec: Vec<_> = out.iter().filter(|r| r.category == Category::Security).collect();
        assert_eq!(sec.len(), 1);
        assert_eq!(sec[0].score, 95);
        assert_eq!(sec[0].priority, Priority::High);
        assert_eq!(sec[0].command, RemediationCommand::TerminateProcess { pid: 4 });
    }

    #[test]
    fn test_reputation_hit() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool.exe");
        let mut f = File::create(&exe).unwrap();
        f.write_all(b"MZ payload").unwrap();
        drop(f);

        let digest = sha256_file(&exe).unwrap();
        let mut h = harness();
        h.advisor = Advisor::with_reputation(HashMap::from([(digest, 92)]));

        let path = exe.display().to_string();
        let samples = table(vec![sample(9, "tool.exe", 1.0, Some(&path))]);
        let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), 0.0);

        assert!(out.iter().any(|r| r.category == Category::Security && r.score == 92));
    }

    #[test]
    fn test_reputation_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reputation.json");
        assert!(Advisor::load(&path).reputation.is_empty());

        std::fs::write(&path, r#"{"ABCDEF": 90}"#).unwrap();
        assert_eq!(Advisor::load(&path).reputation.get("abcdef"), Some(&90));

        std::fs::write(&path, "not json").unwrap();
        assert!(Advisor::load(&path).reputation.is_empty());
    }

    #[test]
    fn test_system_thresholds() {
        let mut h = harness();
        let load = SystemLoad { cpu_percent: 85.0, memory_percent: 95.0, disk_used_percent: Some(95.0) };
        let env = EnvContext::default().with_battery(10.0, false);
        let out = run(&mut h, &BTreeMap::new(), load, env, 0.0);

        let scores: Vec<(Category, u8)> = out.iter().map(|r| (r.category, r.score)).collect();
        assert!(scores.contains(&(Category::Performance, 80)));
        assert!(scores.contains(&(Category::Performance, 85)));
        assert!(scores.contains(&(Category::Performance, 75)));
        assert!(scores.contains(&(Category::Power, 90)));
        assert!(scores.contains(&(Category::Maintenance, 80)));
    }

    #[test]
    fn test_top_memory_processes_capped() {
        let mut h = harness();
        let samples = table((1..=10).map(|i| sample(i, "p.exe", i as f64 * 100.0, None)).collect());
        let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), 0.0);

        let procs: Vec<_> = out.iter().filter(|r| r.category == Category::Process).collect();
        assert_eq!(procs.len(), 8);
        assert_eq!(procs[0].pid, Some(10));
        assert_eq!(procs[0].score, 90);
        // 300 MB -> 150, capped
        assert!(procs.iter().all(|r| r.score <= 90));
    }

    #[test]
    fn test_memory_growth_detected() {
        let mut h = harness();
        let mut found = false;
        for step in 0..4u32 {
            // +10 MB every 60 s
            let samples = table(vec![sample(50, "leaky.exe", 100.0 + step as f64 * 10.0, None)]);
            let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), step as f64 * 60.0);
            found = out.iter().any(|r| r.category == Category::Predictive && r.score == 80);
        }
        assert!(found);
        assert_eq!(h.history.doc().trends["50"].len(), 4);
    }

    #[test]
    fn test_repeated_exits_warn() {
        let mut h = harness();
        for i in 0..3u32 {
            let live = table(vec![sample(100 + i, "crashy.exe", 5.0, None)]);
            run(&mut h, &live, SystemLoad::default(), EnvContext::default(), i as f64);
            run(&mut h, &BTreeMap::new(), SystemLoad::default(), EnvContext::default(), i as f64 + 0.5);
        }
        assert_eq!(h.history.exit_count("crashy.exe"), 3);

        let live = table(vec![sample(200, "crashy.exe", 5.0, None)]);
        let out = run(&mut h, &live, SystemLoad::default(), EnvContext::default(), 10.0);
        assert!(out.iter().any(|r| r.category == Category::Predictive && r.score == 85));
    }

    #[test]
    fn test_history_overrides_priority() {
        let mut h = harness();
        h.history.record_ignored("big.exe using 1000.0 MB RAM");
        let samples = table(vec![sample(1, "big.exe", 1000.0, None)]);
        let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), 0.0);

        let rec = out.iter().find(|r| r.category == Category::Process).unwrap();
        assert_eq!(rec.score, 90);
        assert_eq!(rec.priority, Priority::Low);
    }

    #[test]
    fn test_allow_listed_processes_skipped() {
        let mut h = harness();
        h.prefs.allow("miner.exe").unwrap();
        let samples = table(vec![sample(4, "miner.exe", 10.0, Some(r"C:\Temp\miner.exe"))]);
        let out = run(&mut h, &samples, SystemLoad::default(), EnvContext::default(), 0.0);
        assert!(out.is_empty());
    }
}
