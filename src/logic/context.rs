//! App Context - owns every engine and the mutable state they share
//!
//! Preferences and trend history are loaded once here and flushed on change.
//! Lock order when more than one is needed: prefs, history, advisor, sampler.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::autostart::{
    self, AutostartEntry, AutostartStore, CimInventory, FolderScope, InventorySource, LifecycleManager,
    RegistryBackend, TransitionReport, TransitionTarget,
};
use super::collector::{ProcessSample, ProcessSource, SysinfoSource, TelemetrySampler};
use super::config::MonitorConfig;
use super::correlator;
use super::error::MonitorResult;
use super::prefs::PreferenceStore;
use super::report;
use super::scan::{ScanGuard, TelemetrySnapshot};
use super::scoring::EnvContext;
use super::services::{ScServiceControl, ServiceControl};
use super::suggestions::{
    advisor, engine, executor, Advisor, AdvisorInputs, Category, Decision, ExecutionResult, FeedbackLog,
    RemediationCommand, RemediationTargets, ScanInputs, SuggestionRecord, TrendHistory,
};

/// Swappable backends; production uses the platform ones
pub struct ContextParts {
    pub registry: Arc<dyn RegistryBackend>,
    pub inventory: Box<dyn InventorySource>,
    pub folders: Vec<(FolderScope, PathBuf)>,
    pub source: Box<dyn ProcessSource>,
    pub services: Box<dyn ServiceControl>,
}

impl ContextParts {
    pub fn platform(config: &MonitorConfig) -> Self {
        let mut folders = Vec::new();
        if let Some(dir) = config.paths.user_startup() {
            folders.push((FolderScope::User, dir));
        }
        if let Some(dir) = config.paths.common_startup() {
            folders.push((FolderScope::Common, dir));
        }

        Self {
            registry: autostart::platform_registry(),
            inventory: Box::new(CimInventory),
            folders,
            source: Box::new(SysinfoSource::new()),
            services: Box::new(ScServiceControl),
        }
    }
}

pub struct AppContext {
    pub config: MonitorConfig,
    pub store: AutostartStore,
    pub lifecycle: LifecycleManager,
    services: Box<dyn ServiceControl>,
    feedback: FeedbackLog,
    prefs: Mutex<PreferenceStore>,
    history: Mutex<TrendHistory>,
    advisor: Mutex<Advisor>,
    sampler: Mutex<TelemetrySampler>,
    snapshot: RwLock<Arc<TelemetrySnapshot>>,
    scanning: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(config: MonitorConfig) -> Self {
        let parts = ContextParts::platform(&config);
        Self::from_parts(config, parts)
    }

    pub fn from_parts(config: MonitorConfig, parts: ContextParts) -> Self {
        let paths = &config.paths;
        let prefs = PreferenceStore::load(&paths.preferences_file());
        let history = TrendHistory::load(&paths.history_file());
        let advisor = Advisor::load(&paths.reputation_file());
        let feedback = FeedbackLog::new(&paths.feedback_file());
        let lifecycle = LifecycleManager::new(Arc::clone(&parts.registry), &paths.backup_dir());
        let store = AutostartStore::new(parts.registry, parts.inventory, parts.folders);

        log::info!("App context ready (data dir {})", paths.data_dir.display());

        Self {
            store,
            lifecycle,
            services: parts.services,
            feedback,
            prefs: Mutex::new(prefs),
            history: Mutex::new(history),
            advisor: Mutex::new(advisor),
            sampler: Mutex::new(TelemetrySampler::new(parts.source)),
            snapshot: RwLock::new(Arc::new(TelemetrySnapshot::empty())),
            scanning: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    // ========================================================================
    // AUTOSTART
    // ========================================================================

    pub fn list_entries(&self) -> Vec<AutostartEntry> {
        self.store.enumerate()
    }

    /// Resolve `key` (identity or display name) and apply `target`
    pub fn transition(&self, key: &str, target: TransitionTarget) -> MonitorResult<TransitionReport> {
        let entry = self.store.find(key)?;
        Ok(self.lifecycle.transition(&entry, target))
    }

    /// Terminate every live process of an entry; returns the pids actually killed
    pub fn kill_entry_processes(&self, key: &str) -> MonitorResult<Vec<u32>> {
        let entry = self.store.find(key)?;
        let snapshot = self.refresh_telemetry();
        let pids = correlator::pids_of_entry(&entry, &snapshot.samples);

        let mut sampler = self.sampler.lock();
        let killed: Vec<u32> = pids.into_iter().filter(|pid| sampler.terminate(*pid)).collect();
        log::warn!("Killed {} process(es) of {}: {:?}", killed.len(), entry.display_name, killed);
        Ok(killed)
    }

    // ========================================================================
    // TELEMETRY
    // ========================================================================

    /// Sample now and publish the result
    pub fn refresh_telemetry(&self) -> Arc<TelemetrySnapshot> {
        let (samples, load) = {
            let mut sampler = self.sampler.lock();
            (sampler.sample(), sampler.system_load())
        };
        let env = EnvContext::probe(&load);

        let snapshot = Arc::new(TelemetrySnapshot { taken_at: Utc::now(), samples, load, env });
        *self.snapshot.write() = Arc::clone(&snapshot);
        snapshot
    }

    pub fn latest_snapshot(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Last published snapshot, sampling first when nothing was published yet
    fn current_snapshot(&self) -> Arc<TelemetrySnapshot> {
        let snapshot = self.latest_snapshot();
        if snapshot.is_empty() {
            self.refresh_telemetry()
        } else {
            snapshot
        }
    }

    /// Heaviest processes of the current snapshot
    pub fn top_processes(&self, top_n: usize) -> Vec<ProcessSample> {
        let snapshot = self.current_snapshot();
        report::top_by_load(&snapshot, top_n).into_iter().cloned().collect()
    }

    pub fn export_report(&self) -> MonitorResult<(PathBuf, usize)> {
        let snapshot = self.current_snapshot();
        let path = self.config.paths.report_file();
        let rows = report::write_report(&snapshot, &path, self.config.sampler.report_top_n)?;
        Ok((path, rows))
    }

    // ========================================================================
    // SUGGESTIONS
    // ========================================================================

    pub fn begin_scan(&self) -> MonitorResult<ScanGuard> {
        ScanGuard::acquire(&self.scanning)
    }

    /// Full scan on the calling thread
    pub fn scan(&self) -> MonitorResult<Vec<SuggestionRecord>> {
        let _guard = self.begin_scan()?;
        self.scan_locked()
    }

    /// Scan body; the caller holds the scan guard
    pub(crate) fn scan_locked(&self) -> MonitorResult<Vec<SuggestionRecord>> {
        let snapshot = self.refresh_telemetry();
        let entries = self.store.enumerate();
        let services = match self.services.list() {
            Ok(list) => list,
            Err(e) => {
                log::debug!("Service inventory skipped: {}", e);
                Vec::new()
            }
        };

        let prefs = self.prefs.lock();
        let inputs = ScanInputs {
            entries: &entries,
            samples: &snapshot.samples,
            services: &services,
            env: &snapshot.env,
        };
        let mut out: Vec<SuggestionRecord> = engine::scan_for_suggestions(&inputs, &prefs, &self.config.scoring)
            .into_iter()
            .filter(|r| r.category != Category::Info)
            .collect();

        let mut history = self.history.lock();
        let advisor_inputs = AdvisorInputs {
            samples: &snapshot.samples,
            load: &snapshot.load,
            env: &snapshot.env,
            now: Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        out.extend(self.advisor.lock().run_all_checks(
            &advisor_inputs,
            &prefs,
            &mut history,
            &self.config.scoring,
            &self.config.sampler,
        ));

        advisor::apply_priorities(&mut out, &history);
        engine::sort_by_score(&mut out);
        if out.is_empty() {
            out.push(engine::system_ok());
        }

        if let Err(e) = history.save() {
            log::warn!("Trend history not saved: {}", e);
        }

        log::info!("Scan finished: {} suggestion(s), {} actionable", out.len(), out.iter().filter(|r| r.is_actionable()).count());
        Ok(out)
    }

    pub fn execute(&self, command: &RemediationCommand) -> ExecutionResult {
        let terminate = |pid: u32| self.sampler.lock().terminate(pid);
        let targets = RemediationTargets {
            store: &self.store,
            lifecycle: &self.lifecycle,
            services: self.services.as_ref(),
            terminate: &terminate,
        };
        executor::execute(command, &targets)
    }

    /// Execute a suggestion's command and remember the decision
    pub fn accept(&self, record: &SuggestionRecord) -> ExecutionResult {
        let result = self.execute(&record.command);

        if let Err(e) = self.feedback.append(Decision::Accepted, record) {
            log::warn!("Feedback not recorded: {}", e);
        }
        if result.ok {
            let mut history = self.history.lock();
            history.record_killed(&record.description);
            if let Err(e) = history.save() {
                log::warn!("Trend history not saved: {}", e);
            }
        }
        result
    }

    /// Dismiss a suggestion: its subject joins the allow list
    pub fn ignore(&self, record: &SuggestionRecord) -> MonitorResult<()> {
        self.feedback.append(Decision::Ignored, record)?;
        self.prefs.lock().allow(&record.name)?;

        let mut history = self.history.lock();
        history.record_ignored(&record.description);
        history.save()
    }

    // ========================================================================
    // PREFERENCES
    // ========================================================================

    pub fn allow(&self, name: &str) -> MonitorResult<bool> {
        self.prefs.lock().allow(name)
    }

    pub fn deny(&self, name: &str) -> MonitorResult<bool> {
        self.prefs.lock().deny(name)
    }

    pub fn forget(&self, name: &str) -> MonitorResult<bool> {
        self.prefs.lock().forget(name)
    }

    /// (allow list, deny list)
    pub fn lists(&self) -> (Vec<String>, Vec<String>) {
        let prefs = self.prefs.lock();
        (prefs.whitelist(), prefs.blacklist())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::autostart::registry::{RegValue, RUN_KEY};
    use crate::logic::autostart::{ApprovalState, Hive, MemoryRegistry, RegView, StaticInventory};
    use crate::logic::collector::tests::ScriptedSource;
    use crate::logic::collector::RawProcess;
    use crate::logic::error::MonitorError;
    use crate::logic::scoring::Tier;
    use crate::logic::services::StaticServices;

    struct Harness {
        ctx: Arc<AppContext>,
        registry: Arc<MemoryRegistry>,
        source: ScriptedSource,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let source = ScriptedSource::default();
        let parts = ContextParts {
            registry: registry.clone(),
            inventory: Box::new(StaticInventory::default()),
            folders: Vec::new(),
            source: Box::new(source.clone()),
            services: Box::new(StaticServices::default()),
        };
        let ctx = Arc::new(AppContext::from_parts(MonitorConfig::with_data_dir(dir.path()), parts));
        Harness { ctx, registry, source, _dir: dir }
    }

    fn raw(pid: u32, name: &str, exe: &str, cpu: f32) -> RawProcess {
        RawProcess {
            pid,
            name: name.to_string(),
            cpu_percent: cpu,
            memory_percent: 1.0,
            memory_bytes: 20 * 1024 * 1024,
            exe_path: Some(exe.to_string()),
            ..Default::default()
        }
    }

    fn run_value(h: &Harness, name: &str, command: &str) {
        h.registry
            .set_value(Hive::CurrentUser, RUN_KEY, name, &RegValue::string(command), RegView::Native)
            .unwrap();
    }

    #[test]
    fn test_scan_rejected_while_running() {
        let h = harness();
        let guard = h.ctx.begin_scan().unwrap();
        assert!(matches!(h.ctx.scan(), Err(MonitorError::ScanInProgress)));
        drop(guard);
        assert!(h.ctx.scan().is_ok());
    }

    #[test]
    fn test_scan_scores_running_entry_and_saves_history() {
        let h = harness();
        run_value(&h, "Syncer", r"C:\Apps\Syncer\syncer.exe");
        *h.source.procs.lock() = vec![raw(700, "syncer.exe", r"C:\Apps\Syncer\syncer.exe", 40.0)];

        let out = h.ctx.scan().unwrap();
        let rec = out.iter().find(|r| r.name == "Syncer").unwrap();
        assert_eq!(rec.pid, Some(700));
        assert_eq!(rec.tier, Tier::Actionable);
        assert!(matches!(rec.command, RemediationCommand::DisableEntry { .. }));
        assert!(h.ctx.config.paths.history_file().exists());
    }

    #[test]
    fn test_empty_machine_reports_system_ok() {
        let h = harness();
        let out = h.ctx.scan().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, Category::Info);
    }

    #[test]
    fn test_accept_disables_entry() {
        let h = harness();
        run_value(&h, "Syncer", r"C:\Apps\Syncer\syncer.exe");
        *h.source.procs.lock() = vec![raw(700, "syncer.exe", r"C:\Apps\Syncer\syncer.exe", 40.0)];

        let out = h.ctx.scan().unwrap();
        let rec = out.iter().find(|r| r.name == "Syncer").unwrap().clone();
        let result = h.ctx.accept(&rec);

        assert!(result.ok, "{}", result.message);
        assert_eq!(h.ctx.list_entries()[0].approval_state, ApprovalState::Disabled);
        assert_eq!(FeedbackLog::new(&h.ctx.config.paths.feedback_file()).read_all().len(), 1);
    }

    #[test]
    fn test_ignore_allow_lists_subject() {
        let h = harness();
        run_value(&h, "OneDrive", r"C:\Apps\OneDrive.exe");

        let out = h.ctx.scan().unwrap();
        h.ctx.ignore(&out[0]).unwrap();

        assert_eq!(h.ctx.lists().0, vec!["onedrive".to_string()]);
        assert_eq!(h.ctx.scan().unwrap()[0].category, Category::Info);
    }

    #[test]
    fn test_kill_entry_processes() {
        let h = harness();
        run_value(&h, "Syncer", r"C:\Apps\Syncer\syncer.exe --tray");
        *h.source.procs.lock() = vec![
            raw(700, "syncer.exe", r"C:\Apps\Syncer\syncer.exe", 1.0),
            raw(701, "syncer.exe", r"C:\Apps\Syncer\syncer.exe", 1.0),
            raw(800, "notepad.exe", r"C:\Windows\notepad.exe", 1.0),
        ];

        let killed = h.ctx.kill_entry_processes("syncer").unwrap();
        assert_eq!(killed, vec![700, 701]);
        assert_eq!(h.source.killed.lock().len(), 2);
        assert!(h.ctx.kill_entry_processes("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_export_report_writes_file() {
        let h = harness();
        *h.source.procs.lock() = vec![raw(10, "a.exe", r"C:\a.exe", 3.0)];

        let (path, rows) = h.ctx.export_report().unwrap();
        assert_eq!(rows, 1);
        assert!(std::fs::read_to_string(path).unwrap().contains("a.exe"));
    }

    #[tokio::test]
    async fn test_background_scan() {
        let h = harness();
        let out = crate::logic::scan::scan_in_background(Arc::clone(&h.ctx)).await.unwrap();
        assert!(!out.is_empty());
        assert!(h.ctx.begin_scan().is_ok());
    }
}
