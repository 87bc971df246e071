use runboard_core::model::{RunData, TaskData};
use std::collections::BTreeSet;

/// Tasks present in every run of the comparison set.
///
/// The returned task objects are the FIRST run's copies, in the first run's
/// order: per-run metadata (messages, timing) differs between runs, and
/// callers that need a specific run's version re-look it up by id there.
pub fn common_tasks<'a>(runs: &[&'a RunData]) -> Vec<&'a TaskData> {
    match runs {
        [] => Vec::new(),
        [only] => only.tasks.iter().collect(),
        [first, rest @ ..] => {
            let mut common: BTreeSet<&str> =
                first.tasks.iter().map(|t| t.task_id.as_str()).collect();
            for run in rest {
                let ids: BTreeSet<&str> = run.tasks.iter().map(|t| t.task_id.as_str()).collect();
                common.retain(|id| ids.contains(id));
            }
            first
                .tasks
                .iter()
                .filter(|t| common.contains(t.task_id.as_str()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_run_with_tasks;

    #[test]
    fn zero_runs_yield_no_tasks() {
        assert!(common_tasks(&[]).is_empty());
    }

    #[test]
    fn single_run_passes_its_tasks_through_in_order() {
        let run = make_run_with_tasks(
            "gaia",
            "validation",
            "agent",
            1,
            &[("t3", 1.0), ("t1", 0.0), ("t2", 0.5)],
        );
        let tasks = common_tasks(&[&run]);
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1", "t2"]);
    }

    #[test]
    fn intersection_follows_first_run_order_and_copies() {
        let a = make_run_with_tasks(
            "gaia",
            "validation",
            "agent",
            1,
            &[("t1", 1.0), ("t2", 0.0), ("t3", 0.5)],
        );
        let b = make_run_with_tasks(
            "gaia",
            "validation",
            "agent",
            2,
            &[("t4", 1.0), ("t3", 1.0), ("t2", 1.0)],
        );
        let tasks = common_tasks(&[&a, &b]);
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
        // copies come from run A, so t2 still carries A's failing score
        assert_eq!(tasks[0].score.score, 0.0);
    }

    #[test]
    fn cardinality_never_exceeds_the_smallest_run() {
        let a = make_run_with_tasks(
            "gaia",
            "validation",
            "agent",
            1,
            &[("t1", 1.0), ("t2", 1.0), ("t3", 1.0)],
        );
        let b = make_run_with_tasks("gaia", "validation", "agent", 2, &[("t2", 0.0)]);
        let c = make_run_with_tasks(
            "gaia",
            "validation",
            "agent",
            3,
            &[("t2", 0.5), ("t3", 0.5)],
        );
        let tasks = common_tasks(&[&a, &b, &c]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, "t2");
    }

    #[test]
    fn disjoint_runs_intersect_to_nothing() {
        let a = make_run_with_tasks("gaia", "validation", "agent", 1, &[("t1", 1.0)]);
        let b = make_run_with_tasks("gaia", "validation", "agent", 2, &[("t2", 1.0)]);
        assert!(common_tasks(&[&a, &b]).is_empty());
    }
}
