use runboard_core::model::{
    MessageSource, RunArgs, RunData, RunMetrics, TaskAnswer, TaskData, TaskMessage, TaskScore,
    TaskTimes,
};
use serde_json::Map;

pub(crate) fn make_args(dataset: &str, split: &str, system: &str, run_id: i64) -> RunArgs {
    RunArgs {
        mode: "run".to_string(),
        dataset: dataset.to_string(),
        split: split.to_string(),
        system_type: system.to_string(),
        run_id,
        config: "config.yaml".to_string(),
        config_content: serde_json::json!({}),
        seed: 0,
        parallel: 1,
        subsample: 0,
        extra: Map::new(),
    }
}

pub(crate) fn make_task(task_id: &str, score: f64) -> TaskData {
    make_task_timed(task_id, score, 2000.0)
}

pub(crate) fn make_task_timed(task_id: &str, score: f64, duration_ms: f64) -> TaskData {
    TaskData {
        task_id: task_id.to_string(),
        messages: vec![TaskMessage {
            source: MessageSource::User,
            content: "do the thing".to_string(),
            timestamp: None,
            metadata: None,
        }],
        answer: TaskAnswer {
            answer: String::new(),
            screenshots: vec![],
        },
        score: TaskScore {
            score,
            metadata: Map::new(),
        },
        times: TaskTimes {
            start_time: 1000.0,
            end_time: 1000.0 + duration_ms,
            duration: duration_ms,
        },
        token_usage: None,
    }
}

pub(crate) fn make_run(dataset: &str, split: &str, system: &str, run_id: i64) -> RunData {
    make_run_with_tasks(dataset, split, system, run_id, &[])
}

pub(crate) fn make_run_with_tasks(
    dataset: &str,
    split: &str,
    system: &str,
    run_id: i64,
    tasks: &[(&str, f64)],
) -> RunData {
    let tasks: Vec<TaskData> = tasks.iter().map(|(id, s)| make_task(id, *s)).collect();
    RunData {
        args: vec![make_args(dataset, split, system, run_id)],
        metrics: crate::metrics::recompute_run_metrics(&tasks),
        tasks,
        analysis: None,
    }
}
