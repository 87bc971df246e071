use chrono::{DateTime, Utc};
use runboard_core::model::RunData;
use serde_json::{json, Value};

use crate::intersect::common_tasks;
use crate::metrics::summarize_tasks;

/// One-way export of the currently filtered run list with a metadata
/// envelope. There is no matching re-import path.
pub fn build_export_document(
    runs: &[&RunData],
    dataset: &str,
    split: &str,
    exported_at: DateTime<Utc>,
) -> Value {
    let common = common_tasks(runs);
    let summary = summarize_tasks(common.iter().copied());
    json!({
        "metadata": {
            "exported_at": exported_at.to_rfc3339(),
            "task_summary": summary.summary_line(),
            "dataset": dataset,
            "split": split,
            "num_runs": runs.len(),
        },
        "run_data_list": runs,
    })
}

pub fn export_filename(dataset: &str, split: &str, exported_at: DateTime<Utc>) -> String {
    format!(
        "message_browser_{}_{}_{}.json",
        dataset,
        split,
        exported_at.format("%Y-%m-%dT%H-%M-%S")
    )
}
