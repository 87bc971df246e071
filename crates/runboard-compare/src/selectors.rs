use runboard_core::model::RunData;
use std::collections::BTreeSet;

/// Distinct datasets across all runs, lexicographically sorted.
pub fn available_datasets(runs: &[RunData]) -> Vec<String> {
    let mut out = BTreeSet::new();
    for run in runs {
        for args in &run.args {
            if !args.dataset.is_empty() {
                out.insert(args.dataset.clone());
            }
        }
    }
    out.into_iter().collect()
}

/// Splits observed within the selected dataset only. An empty dataset
/// selection yields no splits: the split selector depends on the dataset
/// selector, not on the global run list.
pub fn available_splits(runs: &[RunData], dataset: &str) -> Vec<String> {
    if dataset.is_empty() {
        return Vec::new();
    }
    let mut out = BTreeSet::new();
    for run in runs {
        for args in &run.args {
            if args.dataset == dataset && !args.split.is_empty() {
                out.insert(args.split.clone());
            }
        }
    }
    out.into_iter().collect()
}

pub fn available_systems(runs: &[RunData], dataset: &str, split: &str) -> Vec<String> {
    if dataset.is_empty() || split.is_empty() {
        return Vec::new();
    }
    let mut out = BTreeSet::new();
    for run in runs {
        for args in &run.args {
            if args.dataset == dataset && args.split == split && !args.system_type.is_empty() {
                out.insert(args.system_type.clone());
            }
        }
    }
    out.into_iter().collect()
}

pub fn available_run_ids(runs: &[RunData], dataset: &str, split: &str, system: &str) -> Vec<i64> {
    if dataset.is_empty() || split.is_empty() || system.is_empty() {
        return Vec::new();
    }
    let mut out = BTreeSet::new();
    for run in runs {
        for args in &run.args {
            if args.dataset == dataset && args.split == split && args.system_type == system {
                out.insert(args.run_id);
            }
        }
    }
    out.into_iter().collect()
}
