//! Suggestion Engine - scored recommendations for autostart entries and services

use std::collections::BTreeMap;

use super::types::{Category, RemediationCommand, SuggestionRecord};
use crate::logic::autostart::normalize::normalize_path;
use crate::logic::autostart::{ApprovalState, AutostartEntry};
use crate::logic::collector::ProcessSample;
use crate::logic::config::ScoringConfig;
use crate::logic::correlator;
use crate::logic::prefs::PreferenceStore;
use crate::logic::scoring::{self, EnvContext, ListStatus, Signals, Tier};
use crate::logic::services::ServiceInfo;

/// Everything one scan looks at
pub struct ScanInputs<'a> {
    pub entries: &'a [AutostartEntry],
    pub samples: &'a BTreeMap<u32, ProcessSample>,
    pub services: &'a [ServiceInfo],
    pub env: &'a EnvContext,
}

/// Startup + service suggestions, highest score first
pub fn scan_for_suggestions(inputs: &ScanInputs<'_>, prefs: &PreferenceStore, config: &ScoringConfig) -> Vec<SuggestionRecord> {
    let mut out = Vec::new();

    for entry in inputs.entries {
        if let Some(record) = startup_suggestion(entry, inputs, prefs, config) {
            out.push(record);
        }
    }

    for service in inputs.services.iter().filter(|s| s.is_running()) {
        if let Some(record) = service_suggestion(service, inputs, prefs, config) {
            out.push(record);
        }
    }

    sort_by_score(&mut out);

    if out.is_empty() {
        out.push(system_ok());
    }
    out
}

pub fn sort_by_score(records: &mut [SuggestionRecord]) {
    records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
}

pub fn system_ok() -> SuggestionRecord {
    SuggestionRecord::new(
        "System OK",
        Category::Info,
        None,
        0,
        Tier::Informational,
        "-".to_string(),
        "No actionable suggestions found",
        RemediationCommand::no_action("Nothing to do"),
    )
}

fn startup_suggestion(
    entry: &AutostartEntry,
    inputs: &ScanInputs<'_>,
    prefs: &PreferenceStore,
    config: &ScoringConfig,
) -> Option<SuggestionRecord> {
    // Already off; nothing to recommend
    if entry.approval_state == ApprovalState::Disabled {
        return None;
    }

    let list = prefs.status(&[entry.display_name.as_str(), entry.identity.as_str()]);
    if list == ListStatus::Allowed {
        return None;
    }

    let disable = RemediationCommand::DisableEntry { identity: entry.identity.clone() };

    let sample = match correlator::match_entry(entry, inputs.samples) {
        Some(s) => s,
        None => {
            let score = config.idle_startup_score.min(100);
            return Some(SuggestionRecord::new(
                &entry.display_name,
                Category::StartupApp,
                None,
                score,
                scoring::tier_for(score, list == ListStatus::Denied, config.action_threshold),
                format!("[Score {}] Not running | Cmd: {}", score, entry.command),
                "Can disable from startup if not needed",
                disable,
            ));
        }
    };

    let path = sample
        .exe_path
        .clone()
        .unwrap_or_else(|| normalize_path(&entry.command));
    let signals = Signals::from_sample(sample)
        .with_startup(true)
        .with_suspicious(scoring::is_suspicious_path(&path, config));
    let score = scoring::evaluate(&signals, inputs.env, config, list)?;

    let (suggestion, command) = if score.tier == Tier::Actionable {
        ("Disable from startup (backup is kept)", disable)
    } else {
        ("Optional: disable if unnecessary", RemediationCommand::no_action("Safe, no automatic action"))
    };

    Some(SuggestionRecord::new(
        &entry.display_name,
        Category::StartupApp,
        Some(sample.pid),
        score.value,
        score.tier,
        format!(
            "PID {} | CPU {:.1}% | RAM {:.1}% | [Score {}]",
            sample.pid, sample.cpu_percent, sample.memory_percent, score.value
        ),
        suggestion,
        command,
    ))
}

/// Live process of a service: by pid, else a process whose name appears in the binary path
fn service_process<'a>(service: &ServiceInfo, samples: &'a BTreeMap<u32, ProcessSample>) -> Option<&'a ProcessSample> {
    if let Some(sample) = service.pid().and_then(|pid| samples.get(&pid)) {
        return Some(sample);
    }

    let bin = service.bin_path().to_lowercase();
    if bin.is_empty() {
        return None;
    }
    samples.values().find(|s| {
        let name = s.name.to_lowercase();
        name.len() >= 3 && bin.contains(&name)
    })
}

fn service_suggestion(
    service: &ServiceInfo,
    inputs: &ScanInputs<'_>,
    prefs: &PreferenceStore,
    config: &ScoringConfig,
) -> Option<SuggestionRecord> {
    let list = prefs.status(&[service.name.as_str(), service.display_name.as_str()]);
    if list == ListStatus::Allowed {
        return None;
    }

    let sample = match service_process(service, inputs.samples) {
        Some(s) => s,
        None => {
            return Some(SuggestionRecord::new(
                &service.name,
                Category::Service,
                None,
                0,
                scoring::tier_for(0, list == ListStatus::Denied, config.action_threshold),
                format!("[Score 0] No live process | BinPath: {}", service.bin_path()),
                "Optional: disable from services.msc",
                RemediationCommand::no_action("Service has no live process"),
            ));
        }
    };

    let signals = Signals::from_sample(sample)
        .with_suspicious(scoring::is_suspicious_service(&service.name, service.bin_path(), config));
    let score = scoring::evaluate(&signals, inputs.env, config, list)?;

    let (suggestion, command) = if score.tier == Tier::Actionable {
        (
            "Stop & disable service (if non-critical)",
            RemediationCommand::StopService { name: service.name.clone() },
        )
    } else {
        ("Leave running (safe)", RemediationCommand::no_action("Service safe, no action"))
    };

    Some(SuggestionRecord::new(
        &service.name,
        Category::Service,
        Some(sample.pid),
        score.value,
        score.tier,
        format!(
            "PID {} | CPU {:.1}% | RAM {:.1}% | [Score {}]",
            sample.pid, sample.cpu_percent, sample.memory_percent, score.value
        ),
        suggestion,
        command,
    ))
}
