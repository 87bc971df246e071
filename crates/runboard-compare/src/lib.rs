//! The comparison pipeline: selector derivation, run filtering, common-task
//! intersection and summary metrics over imported runs. Every function here
//! is pure and recomputed on demand.

pub mod export;
pub mod filter;
pub mod intersect;
pub mod metrics;
pub mod selectors;
pub mod state;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testutil;

pub use filter::RunFilter;
pub use intersect::common_tasks;
pub use metrics::{recompute_run_metrics, summarize_tasks, TaskSetSummary};
pub use tokens::{compute_mean_token_usage, compute_total_token_usage};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_run_with_tasks;

    // Filtering by dataset keeps both runs, the shared id set is [t1], and
    // per-run summaries over that set disagree because t1 passed in A but
    // failed in B. Common-task metrics are always computed per run against
    // the shared ids, never by merging scores across runs.
    #[test]
    fn compare_pipeline_end_to_end() {
        let a = make_run_with_tasks(
            "D",
            "S",
            "X",
            1,
            &[("t1", 1.0), ("t2", 0.0)],
        );
        let b = make_run_with_tasks(
            "D",
            "S",
            "X",
            2,
            &[("t1", 0.0), ("t3", 1.0)],
        );
        let runs = vec![a, b];

        let filtered = RunFilter::new().dataset("D").apply(&runs);
        assert_eq!(filtered.len(), 2);

        let common = common_tasks(&filtered);
        let ids: Vec<&str> = common.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);

        let per_run: Vec<TaskSetSummary> = filtered
            .iter()
            .map(|run| {
                summarize_tasks(
                    common
                        .iter()
                        .filter_map(|t| run.task(&t.task_id)),
                )
            })
            .collect();
        assert_eq!(per_run[0].total_tasks, 1);
        assert_eq!(per_run[0].successful_tasks, 1);
        assert_eq!(per_run[1].total_tasks, 1);
        assert_eq!(per_run[1].failed_tasks, 1);
    }
}
