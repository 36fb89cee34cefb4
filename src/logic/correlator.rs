//! Correlator - Links autostart entries to live processes
//!
//! An exact executable-path match wins; otherwise the lowest pid whose name,
//! path or command line overlaps one of the entry's needles.

use std::collections::{BTreeMap, HashMap};

use super::autostart::normalize::{executable_basename, expand_short_tokens, normalize_path};
use super::autostart::AutostartEntry;
use super::collector::ProcessSample;

/// Needles shorter than this match too much
const MIN_NEEDLE_LEN: usize = 3;

struct Needles {
    path: String,
    terms: Vec<String>,
}

impl Needles {
    fn of(entry: &AutostartEntry) -> Self {
        let path = normalize_path(&entry.command);
        let mut terms = vec![
            entry.identity.clone(),
            executable_basename(&entry.command),
            path.clone(),
            entry.display_name.to_lowercase(),
        ];
        terms.retain(|t| t.trim().len() >= MIN_NEEDLE_LEN);
        terms.dedup();
        Self { path, terms }
    }
}

fn sample_path(sample: &ProcessSample) -> Option<String> {
    sample
        .exe_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| expand_short_tokens(&p.to_lowercase()))
}

fn overlaps(needle: &str, field: &str) -> bool {
    field.contains(needle) || (field.len() >= MIN_NEEDLE_LEN && needle.contains(field))
}

fn fields(sample: &ProcessSample) -> Vec<String> {
    [Some(sample.name.as_str()), sample.exe_path.as_deref(), sample.command_line.as_deref()]
        .into_iter()
        .flatten()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Best live process of one entry
pub fn match_entry<'a>(entry: &AutostartEntry, samples: &'a BTreeMap<u32, ProcessSample>) -> Option<&'a ProcessSample> {
    let needles = Needles::of(entry);

    if needles.path.len() >= MIN_NEEDLE_LEN {
        if let Some(exact) = samples
            .values()
            .find(|s| sample_path(s).as_deref() == Some(needles.path.as_str()))
        {
            return Some(exact);
        }
    }

    samples.values().find(|s| {
        let fields = fields(s);
        needles
            .terms
            .iter()
            .any(|n| fields.iter().any(|f| overlaps(n, f)))
    })
}

/// identity -> matching sample, for every entry that has one
pub fn correlate(entries: &[AutostartEntry], samples: &BTreeMap<u32, ProcessSample>) -> HashMap<String, ProcessSample> {
    entries
        .iter()
        .filter_map(|e| match_entry(e, samples).map(|s| (e.identity.clone(), s.clone())))
        .collect()
}

/// Every pid that belongs to an entry: same executable, name or command line overlap
pub fn pids_of_entry(entry: &AutostartEntry, samples: &BTreeMap<u32, ProcessSample>) -> Vec<u32> {
    let needles = Needles::of(entry);
    let exe = executable_basename(&entry.command);

    samples
        .values()
        .filter(|s| {
            if sample_path(s).as_deref() == Some(needles.path.as_str()) {
                return true;
            }
            let name = s.name.to_lowercase();
            if exe.len() >= MIN_NEEDLE_LEN && name == exe {
                return true;
            }
            let cmd = s.command_line.as_deref().unwrap_or("").to_lowercase();
            !needles.path.is_empty() && needles.path.len() >= MIN_NEEDLE_LEN && cmd.contains(&needles.path)
        })
        .map(|s| s.pid)
        .collect()
}
