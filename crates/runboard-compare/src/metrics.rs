use runboard_core::model::{RunMetrics, TaskData};
use serde::Serialize;

/// Summary statistics over an arbitrary task set (one run's tasks, or the
/// common tasks of several runs looked up within one run).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskSetSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub partial_tasks: usize,
    pub average_score: f64,
    pub average_duration_seconds: f64,
}

impl TaskSetSummary {
    /// Rendered the way the dashboard shows it, e.g.
    /// `12 tasks • 7 passed, 3 failed, 2 partial`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} tasks \u{2022} {} passed, {} failed, {} partial",
            self.total_tasks, self.successful_tasks, self.failed_tasks, self.partial_tasks
        )
    }
}

pub fn summarize_tasks<'a, I>(tasks: I) -> TaskSetSummary
where
    I: IntoIterator<Item = &'a TaskData>,
{
    let mut summary = TaskSetSummary::default();
    let mut score_sum = 0.0;
    let mut duration_sum_ms = 0.0;
    for task in tasks {
        summary.total_tasks += 1;
        if task.is_success() {
            summary.successful_tasks += 1;
        } else if task.is_failure() {
            summary.failed_tasks += 1;
        } else {
            summary.partial_tasks += 1;
        }
        score_sum += task.score.score;
        duration_sum_ms += task.times.duration;
    }
    if summary.total_tasks > 0 {
        let n = summary.total_tasks as f64;
        summary.average_score = score_sum / n;
        summary.average_duration_seconds = duration_sum_ms / n / 1000.0;
    }
    summary
}

/// Run-level metrics rebuilt from the tasks that were actually parsed. The
/// metrics file found in an import payload is advisory only; this keeps
/// `num_tasks` consistent with `tasks.len()` no matter what it claimed.
pub fn recompute_run_metrics(tasks: &[TaskData]) -> RunMetrics {
    let n = tasks.len();
    let mean_score = if n > 0 {
        tasks.iter().map(|t| t.score.score).sum::<f64>() / n as f64
    } else {
        0.0
    };
    let max_score = tasks.iter().map(|t| t.score.score).fold(0.0, f64::max);
    let average_time = if n > 0 {
        tasks.iter().map(|t| t.times.duration).sum::<f64>() / n as f64 / 1000.0
    } else {
        0.0
    };
    let scores = tasks
        .iter()
        .map(|t| {
            let payload = serde_json::json!({
                "score": t.score.score,
                "metadata": t.score.metadata,
            });
            (t.task_id.clone(), payload.to_string())
        })
        .collect();
    RunMetrics {
        mean_score,
        max_score,
        num_tasks: n,
        average_time,
        scores,
    }
}
