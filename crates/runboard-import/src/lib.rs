//! Run-folder import: parse, schema-validate and admit evaluation runs.
//!
//! A run folder holds `args_*.json` / `args_consolidated_*.json` and an
//! advisory `metrics.json` at the root, plus one directory per task with
//! `score.json`, `times.json`, `*_messages.json`, `*_answer.json` and an
//! optional `token_usage.json`. Import either admits a fully-validated
//! `RunData` or rejects the folder with every violation it found.

use jsonschema::JSONSchema;
use runboard_core::analysis::RunAnalysis;
use runboard_core::model::{
    RunArgs, RunData, RunMetrics, TaskAnswer, TaskData, TaskMessage, TaskScore, TaskTimes,
    TokenUsage,
};
use runboard_core::canonical_json_digest;
use runboard_schemas::{compile_schema, validation_errors};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Subdirectory runboard itself writes analysis results into; never a task.
pub const ANALYSIS_DIR: &str = "analysis";

const DURATION_TOLERANCE_MS: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("run folder not found: {0}")]
    NotFound(PathBuf),
    #[error("run folder failed validation:\n{}", format_violations(.0))]
    Validation(Vec<String>),
    #[error("io error reading run folder: {0}")]
    Io(#[from] std::io::Error),
    #[error("schema registry error: {0}")]
    Schema(#[from] anyhow::Error),
}

impl ImportError {
    pub fn violations(&self) -> &[String] {
        match self {
            ImportError::Validation(v) => v,
            _ => &[],
        }
    }
}

fn format_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

struct Schemas {
    args: JSONSchema,
    metrics: JSONSchema,
    messages: JSONSchema,
    answer: JSONSchema,
    score: JSONSchema,
    times: JSONSchema,
    token_usage: JSONSchema,
    run_analysis: JSONSchema,
}

impl Schemas {
    fn load() -> anyhow::Result<Self> {
        Ok(Self {
            args: compile_schema("run_args_v1.jsonschema")?,
            metrics: compile_schema("run_metrics_v1.jsonschema")?,
            messages: compile_schema("task_messages_v1.jsonschema")?,
            answer: compile_schema("task_answer_v1.jsonschema")?,
            score: compile_schema("task_score_v1.jsonschema")?,
            times: compile_schema("task_times_v1.jsonschema")?,
            token_usage: compile_schema("token_usage_v1.jsonschema")?,
            run_analysis: compile_schema("run_analysis_v1.jsonschema")?,
        })
    }
}

/// An admitted run together with the folder it came from, so later analysis
/// results can be written back next to the data.
#[derive(Debug)]
pub struct ImportedRun {
    pub dir: PathBuf,
    pub run: RunData,
}

#[derive(Debug, Default)]
pub struct RunRepository {
    pub runs: Vec<ImportedRun>,
    pub failures: Vec<(PathBuf, ImportError)>,
}

/// Import every direct subdirectory of `root` as a run folder. A folder that
/// fails validation is reported and left out; it never poisons the rest of
/// the repository.
pub fn load_run_repository(root: &Path) -> Result<RunRepository, ImportError> {
    if !root.is_dir() {
        return Err(ImportError::NotFound(root.to_path_buf()));
    }
    let mut repo = RunRepository::default();
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.path())
        .collect();
    dirs.sort();
    for dir in dirs {
        match import_run_dir(&dir) {
            Ok(run) => repo.runs.push(ImportedRun { dir, run }),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "run folder rejected");
                repo.failures.push((dir, err));
            }
        }
    }
    Ok(repo)
}

/// Canonical-JSON digest identifying an imported run's content.
pub fn run_digest(run: &RunData) -> String {
    let value = serde_json::to_value(run).unwrap_or(Value::Null);
    canonical_json_digest(&value)
}

pub fn import_run_dir(dir: &Path) -> Result<RunData, ImportError> {
    if !dir.is_dir() {
        return Err(ImportError::NotFound(dir.to_path_buf()));
    }
    let schemas = Schemas::load()?;
    let mut violations: Vec<String> = Vec::new();

    let (args, advisory_metrics) = parse_root_files(dir, &schemas, &mut violations)?;
    let mut tasks = parse_task_dirs(dir, &schemas, advisory_metrics.as_ref(), &mut violations)?;

    if args.is_empty() {
        violations.push("at least one run argument file is required".to_string());
    }
    if tasks.is_empty() {
        violations.push("at least one task is required".to_string());
    }
    check_unique_task_ids(&tasks, &mut violations);

    if !violations.is_empty() {
        return Err(ImportError::Validation(violations));
    }

    order_tasks(&mut tasks, advisory_metrics.as_ref());

    // The metrics file is advisory: recompute everything from the tasks that
    // actually parsed so num_tasks can never drift from tasks.len().
    let metrics = runboard_compare::recompute_run_metrics(&tasks);
    if let Some(stored) = &advisory_metrics {
        if stored.num_tasks != metrics.num_tasks {
            warn!(
                stored = stored.num_tasks,
                actual = metrics.num_tasks,
                "metrics.json num_tasks disagrees with parsed tasks; recomputed"
            );
        }
    }

    let analysis = load_attached_run_analysis(dir, &schemas, &mut violations);
    if !violations.is_empty() {
        return Err(ImportError::Validation(violations));
    }

    Ok(RunData {
        args,
        metrics,
        tasks,
        analysis,
    })
}

fn parse_root_files(
    dir: &Path,
    schemas: &Schemas,
    violations: &mut Vec<String>,
) -> Result<(Vec<RunArgs>, Option<RunMetrics>), ImportError> {
    let mut root_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.path())
        .collect();
    root_files.sort();

    let mut args: Vec<RunArgs> = Vec::new();
    let mut metrics: Option<RunMetrics> = None;

    let has_consolidated = root_files
        .iter()
        .any(|p| file_name(p).starts_with("args_consolidated_"));

    for path in &root_files {
        let name = file_name(path);
        if name.starts_with("args_consolidated_") && name.ends_with(".json") {
            parse_args_file(path, schemas, &mut args, violations);
        } else if name.starts_with("args_") && name.ends_with(".json") && !has_consolidated {
            parse_args_file(path, schemas, &mut args, violations);
        } else if name == "metrics.json" {
            match read_json(path) {
                Ok(value) => {
                    let errors = validation_errors(&schemas.metrics, &value);
                    if errors.is_empty() {
                        match serde_json::from_value::<RunMetrics>(value) {
                            Ok(m) => metrics = Some(m),
                            Err(e) => violations.push(format!("{}: {}", name, e)),
                        }
                    } else {
                        violations.extend(errors.into_iter().map(|e| format!("{}: {}", name, e)));
                    }
                }
                Err(e) => violations.push(format!("{}: {}", name, e)),
            }
        }
    }

    Ok((args, metrics))
}

/// Individual args files hold a single snapshot; consolidated files hold the
/// whole array. Accept either shape for either name.
fn parse_args_file(
    path: &Path,
    schemas: &Schemas,
    args: &mut Vec<RunArgs>,
    violations: &mut Vec<String>,
) {
    let name = file_name(path);
    let value = match read_json(path) {
        Ok(v) => v,
        Err(e) => {
            violations.push(format!("{}: {}", name, e));
            return;
        }
    };
    let entries: Vec<Value> = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    for (idx, entry) in entries.into_iter().enumerate() {
        let errors = validation_errors(&schemas.args, &entry);
        if !errors.is_empty() {
            violations.extend(
                errors
                    .into_iter()
                    .map(|e| format!("{}[{}]: {}", name, idx, e)),
            );
            continue;
        }
        match serde_json::from_value::<RunArgs>(entry) {
            Ok(parsed) => args.push(parsed),
            Err(e) => violations.push(format!("{}[{}]: {}", name, idx, e)),
        }
    }
}

fn parse_task_dirs(
    dir: &Path,
    schemas: &Schemas,
    advisory_metrics: Option<&RunMetrics>,
    violations: &mut Vec<String>,
) -> Result<Vec<TaskData>, ImportError> {
    // Task ids listed in the advisory metrics bound which directories count
    // as tasks; directories outside that set were not completed by the run.
    let listed_ids: Option<BTreeSet<&str>> = advisory_metrics
        .filter(|m| !m.scores.is_empty())
        .map(|m| m.scores.iter().map(|(id, _)| id.as_str()).collect());

    let mut tasks = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let task_id = entry.file_name().to_string_lossy().to_string();
        if task_id == ANALYSIS_DIR {
            continue;
        }
        if let Some(listed) = &listed_ids {
            if !listed.contains(task_id.as_str()) {
                debug!(task_id = %task_id, "skipping task dir absent from metrics scores");
                continue;
            }
        }
        if let Some(task) = parse_task_dir(entry.path(), &task_id, schemas, violations)? {
            tasks.push(task);
        }
    }
    Ok(tasks)
}

fn parse_task_dir(
    task_dir: &Path,
    task_id: &str,
    schemas: &Schemas,
    violations: &mut Vec<String>,
) -> Result<Option<TaskData>, ImportError> {
    let before = violations.len();

    let mut score: Option<TaskScore> = None;
    let mut times: Option<TaskTimes> = None;
    let mut token_usage: Option<TokenUsage> = None;
    let mut messages: Option<Vec<TaskMessage>> = None;
    let mut answer: Option<TaskAnswer> = None;
    let mut saw_score_file = false;
    let mut saw_times_file = false;
    let mut saw_messages_file = false;

    let mut files: Vec<PathBuf> = fs::read_dir(task_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.path())
        .collect();
    files.sort();

    for path in &files {
        let name = file_name(path);
        let label = format!("task {}: {}", task_id, name);
        match name.as_str() {
            "score.json" => {
                saw_score_file = true;
                score = parse_validated(path, &schemas.score, &label, violations);
            }
            "times.json" => {
                saw_times_file = true;
                times = parse_validated(path, &schemas.times, &label, violations);
            }
            "token_usage.json" => {
                token_usage = parse_validated(path, &schemas.token_usage, &label, violations);
            }
            _ if name.ends_with("_messages.json") => {
                saw_messages_file = true;
                messages = parse_validated(path, &schemas.messages, &label, violations);
            }
            _ if name.ends_with("_answer.json") => {
                answer = parse_answer(path, schemas, &label, violations);
            }
            _ => {}
        }
    }

    if !saw_score_file {
        violations.push(format!("task {}: missing score.json", task_id));
    }
    if !saw_times_file {
        violations.push(format!("task {}: missing times.json", task_id));
    }
    if !saw_messages_file {
        violations.push(format!("task {}: missing messages file", task_id));
    } else if matches!(&messages, Some(m) if m.is_empty()) {
        violations.push(format!("task {}: must have at least one message", task_id));
    }
    if let Some(times) = &times {
        check_times(task_id, times, violations);
    }
    if let Some(score) = &score {
        if !(0.0..=1.0).contains(&score.score) {
            violations.push(format!("task {}: score must be between 0 and 1", task_id));
        }
    }

    if violations.len() > before {
        return Ok(None);
    }
    Ok(Some(TaskData {
        task_id: task_id.to_string(),
        messages: messages.unwrap_or_default(),
        answer: answer.unwrap_or(TaskAnswer {
            answer: String::new(),
            screenshots: Vec::new(),
        }),
        score: score.expect("checked above"),
        times: times.expect("checked above"),
        token_usage,
    }))
}

fn check_times(task_id: &str, times: &TaskTimes, violations: &mut Vec<String>) {
    if times.duration <= 0.0 {
        violations.push(format!("task {}: duration must be positive", task_id));
    }
    if times.end_time < times.start_time {
        violations.push(format!(
            "task {}: end time must be after start time",
            task_id
        ));
    }
    if (times.duration - (times.end_time - times.start_time)).abs() > DURATION_TOLERANCE_MS {
        violations.push(format!(
            "task {}: duration must equal end_time - start_time",
            task_id
        ));
    }
}

fn parse_validated<T: serde::de::DeserializeOwned>(
    path: &Path,
    schema: &JSONSchema,
    label: &str,
    violations: &mut Vec<String>,
) -> Option<T> {
    let value = match read_json(path) {
        Ok(v) => v,
        Err(e) => {
            violations.push(format!("{}: {}", label, e));
            return None;
        }
    };
    let errors = validation_errors(schema, &value);
    if !errors.is_empty() {
        violations.extend(errors.into_iter().map(|e| format!("{}: {}", label, e)));
        return None;
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            violations.push(format!("{}: {}", label, e));
            None
        }
    }
}

/// Answer files vary between system versions; fall through the known key
/// spellings before giving up and keeping the raw object as text.
fn parse_answer(
    path: &Path,
    schemas: &Schemas,
    label: &str,
    violations: &mut Vec<String>,
) -> Option<TaskAnswer> {
    let value = match read_json(path) {
        Ok(v) => v,
        Err(e) => {
            violations.push(format!("{}: {}", label, e));
            return None;
        }
    };
    let answer_text = ["answer", "computed_answer", "final_answer", "response"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| value.to_string());
    let screenshots: Vec<String> = value
        .get("screenshots")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let candidate = serde_json::json!({
        "answer": answer_text,
        "screenshots": screenshots,
    });
    let errors = validation_errors(&schemas.answer, &candidate);
    if !errors.is_empty() {
        violations.extend(errors.into_iter().map(|e| format!("{}: {}", label, e)));
        return None;
    }
    serde_json::from_value(candidate).ok()
}

fn check_unique_task_ids(tasks: &[TaskData], violations: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for task in tasks {
        if task.task_id.is_empty() {
            violations.push("task ids must be non-empty".to_string());
        }
        if !seen.insert(task.task_id.as_str()) {
            violations.push("all task IDs must be unique".to_string());
            return;
        }
    }
}

/// Deterministic task order: the advisory metrics score list when present
/// (it records completion order), otherwise directory-name order.
fn order_tasks(tasks: &mut [TaskData], advisory_metrics: Option<&RunMetrics>) {
    let Some(metrics) = advisory_metrics.filter(|m| !m.scores.is_empty()) else {
        return;
    };
    let position: std::collections::BTreeMap<&str, usize> = metrics
        .scores
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();
    tasks.sort_by_key(|t| {
        position
            .get(t.task_id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
}

fn load_attached_run_analysis(
    dir: &Path,
    schemas: &Schemas,
    violations: &mut Vec<String>,
) -> Option<RunAnalysis> {
    let path = dir.join(ANALYSIS_DIR).join("run_analysis.json");
    if !path.exists() {
        return None;
    }
    parse_validated(&path, &schemas.run_analysis, "analysis/run_analysis.json", violations)
}

fn read_json(path: &Path) -> Result<Value, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {}", e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
