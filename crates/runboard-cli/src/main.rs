use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use runboard_analysis::{
    store, AnalysisBackend, AnalysisSession, AnalysisSettings, HttpAnalysisBackend, RUN_ERROR_KEY,
};
use runboard_compare::export::{build_export_document, export_filename};
use runboard_compare::selectors;
use runboard_compare::{
    common_tasks, compute_mean_token_usage, compute_total_token_usage, summarize_tasks, RunFilter,
};
use runboard_core::model::{RunData, TaskData};
use runboard_import::{import_run_dir, load_run_repository, run_digest, ImportError};
use runboard_transcript::{classify, collect_sentinel_steps, MessageKind};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "runboard", version = "0.1.0", about = "Evaluation-run analysis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct AnalysisArgs {
    /// Settings file (YAML); defaults to ./runboard.yaml when present
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Analysis collaborator base URL; overrides the settings file
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Model to analyze with; overrides the settings file
    #[arg(long)]
    pub model: Option<String>,
    /// Sampling temperature; overrides the settings file
    #[arg(long)]
    pub temperature: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings template to ./runboard.yaml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Validate one run folder and show what it contains
    Import {
        run_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List every run folder under a repository root
    Runs {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Filter runs and compare them over their common tasks
    Compare {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        dataset: Option<String>,
        #[arg(long)]
        split: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Metrics and token usage for a single run
    Summary {
        run_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Classified message transcript and sentinel steps for one task
    Transcript {
        run_dir: PathBuf,
        #[arg(long)]
        task_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Models offered by the analysis collaborator
    Models {
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        json: bool,
    },
    /// Analyze one task with the analysis collaborator
    AnalyzeTask {
        run_dir: PathBuf,
        #[arg(long)]
        task_id: String,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        json: bool,
    },
    /// Analyze every not-yet-analyzed selected task, sequentially
    AnalyzeTasks {
        run_dir: PathBuf,
        /// Also analyze successful tasks, not only failed ones
        #[arg(long)]
        include_successful: bool,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        json: bool,
    },
    /// Run-level analysis over the task analyses gathered so far
    AnalyzeRun {
        run_dir: PathBuf,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        json: bool,
    },
    /// Export the filtered run list with a metadata envelope
    Export {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        split: String,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Validate any JSON file against a named embedded schema
    SchemaValidate {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Init { force } => {
            let path = settings::default_settings_path();
            settings::write_template(&path, force)?;
            println!("wrote: {}", path.display());
            println!("next: edit {} and point endpoint at the analysis service", path.display());
        }
        Commands::Import { run_dir, json } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let summary = summarize_tasks(run.tasks.iter());
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "import",
                    "run_dir": run_dir.display().to_string(),
                    "digest": run_digest(&run),
                    "dataset": run.canonical_args().map(|a| a.dataset.clone()),
                    "split": run.canonical_args().map(|a| a.split.clone()),
                    "system": run.canonical_args().map(|a| a.system_type.clone()),
                    "run_id": run.canonical_args().map(|a| a.run_id),
                    "model": run.model(),
                    "tasks": run.tasks.len(),
                    "task_summary": summary.summary_line(),
                })));
            }
            print_run_line(&run_dir, &run);
            println!("digest: {}", run_digest(&run));
            println!("tasks: {}", summary.summary_line());
        }
        Commands::Runs { root, json } => {
            let repo = load_run_repository(&root)?;
            if json {
                let runs: Vec<Value> = repo
                    .runs
                    .iter()
                    .map(|imported| run_row_json(&imported.dir, &imported.run))
                    .collect();
                let failures: Vec<Value> = repo
                    .failures
                    .iter()
                    .map(|(dir, err)| {
                        json!({
                            "run_dir": dir.display().to_string(),
                            "error": err.to_string(),
                            "violations": err.violations(),
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "runs",
                    "runs": runs,
                    "failures": failures,
                })));
            }
            for imported in &repo.runs {
                print_run_line(&imported.dir, &imported.run);
            }
            for (dir, err) in &repo.failures {
                eprintln!("rejected: {}: {}", dir.display(), err);
            }
            println!("{} runs, {} rejected", repo.runs.len(), repo.failures.len());
        }
        Commands::Compare {
            root,
            dataset,
            split,
            json,
        } => {
            let repo = load_run_repository(&root)?;
            let runs: Vec<RunData> = repo.runs.into_iter().map(|r| r.run).collect();
            let datasets = selectors::available_datasets(&runs);
            let splits = dataset
                .as_deref()
                .map(|d| selectors::available_splits(&runs, d))
                .unwrap_or_default();

            let mut filter = RunFilter::new();
            if let Some(dataset) = &dataset {
                filter = filter.dataset(dataset.clone());
            }
            if let Some(split) = &split {
                filter = filter.split(split.clone());
            }
            let filtered = filter.apply(&runs);
            let common = common_tasks(&filtered);
            let common_summary = summarize_tasks(common.iter().copied());

            let per_run: Vec<(String, i64, runboard_compare::TaskSetSummary)> = filtered
                .iter()
                .map(|run| {
                    let tasks_in_run: Vec<&TaskData> = common
                        .iter()
                        .filter_map(|t| run.task(&t.task_id))
                        .collect();
                    (
                        run.canonical_args()
                            .map(|a| a.system_type.clone())
                            .unwrap_or_default(),
                        run.canonical_args().map(|a| a.run_id).unwrap_or_default(),
                        summarize_tasks(tasks_in_run.iter().copied()),
                    )
                })
                .collect();

            if json {
                let rows: Vec<Value> = per_run
                    .iter()
                    .map(|(system, run_id, summary)| {
                        json!({
                            "system": system,
                            "run_id": run_id,
                            "summary": summary,
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "compare",
                    "available_datasets": datasets,
                    "available_splits": splits,
                    "filtered_runs": filtered.len(),
                    "common_tasks": common.iter().map(|t| t.task_id.clone()).collect::<Vec<_>>(),
                    "common_summary": common_summary,
                    "per_run": rows,
                })));
            }
            println!("datasets: {}", datasets.join(", "));
            if !splits.is_empty() {
                println!("splits: {}", splits.join(", "));
            }
            println!("filtered runs: {}", filtered.len());
            println!("common tasks: {}", common.len());
            println!("common set: {}", common_summary.summary_line());
            for (system, run_id, summary) in &per_run {
                println!("  {} run {}: {}", system, run_id, summary.summary_line());
            }
        }
        Commands::Summary { run_dir, json } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let summary = summarize_tasks(run.tasks.iter());
            let total_usage = compute_total_token_usage(run.tasks.iter());
            let mean_usage = compute_mean_token_usage(run.tasks.iter());
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "summary",
                    "run_dir": run_dir.display().to_string(),
                    "metrics": run.metrics,
                    "task_summary": summary,
                    "token_usage_total": total_usage,
                    "token_usage_mean": mean_usage,
                })));
            }
            print_run_line(&run_dir, &run);
            println!("tasks: {}", summary.summary_line());
            println!(
                "mean score: {:.3}  avg duration: {:.1}s",
                summary.average_score, summary.average_duration_seconds
            );
            match &total_usage {
                Some(usage) => {
                    println!(
                        "tokens: {} total ({} in, {} out, {} requests)",
                        usage.grand_total.total_tokens,
                        usage.grand_total.total_input_tokens,
                        usage.grand_total.total_output_tokens,
                        usage.grand_total.total_requests
                    );
                    if let Some(mean) = &mean_usage {
                        println!("tokens per task: {}", mean.grand_total.total_tokens);
                    }
                }
                None => println!("tokens: no token data recorded"),
            }
        }
        Commands::Transcript {
            run_dir,
            task_id,
            json,
        } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let task = run
                .task(&task_id)
                .ok_or_else(|| anyhow!("task not found in run: {}", task_id))?;
            let now = Utc::now();
            let kinds: Vec<MessageKind> = task.messages.iter().map(classify).collect();
            let sentinels = collect_sentinel_steps(&task.messages);
            if json {
                let messages: Vec<Value> = task
                    .messages
                    .iter()
                    .zip(kinds.iter())
                    .enumerate()
                    .map(|(idx, (msg, kind))| {
                        json!({
                            "index": idx,
                            "source": msg.source,
                            "kind": kind_label(kind),
                            "preview": kind_preview(kind),
                        })
                    })
                    .collect();
                let steps: Vec<Value> = sentinels
                    .iter()
                    .map(|step| {
                        json!({
                            "sentinel_id": step.sentinel_id,
                            "title": step.title,
                            "status": step.status_text(now),
                            "total_checks": step.total_checks,
                            "runtime": step.runtime_text(),
                            "checks": step.checks.len(),
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "transcript",
                    "task_id": task_id,
                    "score": task.score.score,
                    "messages": messages,
                    "sentinel_steps": steps,
                })));
            }
            println!("task: {} (score {})", task_id, task.score.score);
            for (idx, (msg, kind)) in task.messages.iter().zip(kinds.iter()).enumerate() {
                println!(
                    "[{:>3}] {:<5} {:<20} {}",
                    idx,
                    source_label(msg.source),
                    kind_label(kind),
                    kind_preview(kind)
                );
            }
            for step in &sentinels {
                println!(
                    "sentinel '{}': {} (checks: {}, runtime: {})",
                    step.title,
                    step.status_text(now),
                    step.checks.len(),
                    step.runtime_text()
                );
            }
        }
        Commands::Models { analysis, json } => {
            let settings = Settings::resolve(&analysis)?;
            let backend = HttpAnalysisBackend::new(&settings.endpoint);
            let models = backend
                .list_models()
                .map_err(|e| anyhow!("model list unavailable: {}", e))?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "models",
                    "endpoint": settings.endpoint,
                    "models": models,
                })));
            }
            for model in models {
                println!("{}", model);
            }
        }
        Commands::AnalyzeTask {
            run_dir,
            task_id,
            analysis,
            json,
        } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let mut session = open_session(&run_dir, &analysis)?;
            let stored = session.analyze_task(&run.tasks, &task_id);
            store::save_task_analyses(&run_dir, session.task_analyses())?;
            if !stored {
                let key = runboard_analysis::task_error_key(&task_id);
                let message = session
                    .errors()
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("task not found in run: {}", task_id));
                return Err(anyhow!("{}", message));
            }
            let analysis_result = &session.task_analyses()[&task_id];
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "analyze-task",
                    "task_id": task_id,
                    "analysis": analysis_result,
                })));
            }
            println!("task: {}", task_id);
            println!("reason: {}", analysis_result.reason);
            println!("suggestion: {}", analysis_result.suggestion);
        }
        Commands::AnalyzeTasks {
            run_dir,
            include_successful,
            analysis,
            json,
        } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let mut session = open_session(&run_dir, &analysis)?;
            if include_successful {
                session.settings.include_successful_tasks = true;
            }
            let outcome = session.analyze_all(&run.tasks);
            store::save_task_analyses(&run_dir, session.task_analyses())?;

            let task_errors: Vec<(String, String)> = session
                .errors()
                .iter()
                .filter(|(key, _)| key.as_str() != RUN_ERROR_KEY)
                .map(|(key, message)| (key.clone(), message.clone()))
                .collect();
            let note = session.errors().get(RUN_ERROR_KEY).cloned();
            if outcome.attempted == 0 && outcome.skipped == 0 {
                if let Some(note) = &note {
                    return Err(anyhow!("{}", note));
                }
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "analyze-tasks",
                    "attempted": outcome.attempted,
                    "succeeded": outcome.succeeded,
                    "skipped": outcome.skipped,
                    "analyzed_total": session.task_analyses().len(),
                    "errors": task_errors
                        .iter()
                        .map(|(k, v)| json!({"key": k, "message": v}))
                        .collect::<Vec<_>>(),
                    "note": note,
                })));
            }
            println!(
                "attempted: {}  succeeded: {}  skipped (already analyzed): {}",
                outcome.attempted, outcome.succeeded, outcome.skipped
            );
            for (key, message) in &task_errors {
                eprintln!("error [{}]: {}", key, message);
            }
            if let Some(note) = note {
                println!("note: {}", note);
            }
        }
        Commands::AnalyzeRun {
            run_dir,
            analysis,
            json,
        } => {
            let run = import_with_violation_details(&run_dir, json)?;
            let mut session = open_session(&run_dir, &analysis)?;
            let stored = session.analyze_run(&run);
            if !stored {
                let message = session
                    .errors()
                    .get(RUN_ERROR_KEY)
                    .cloned()
                    .unwrap_or_else(|| "run analysis failed".to_string());
                return Err(anyhow!("{}", message));
            }
            let run_analysis = session.run_analysis().expect("stored run analysis");
            store::save_run_analysis(&run_dir, run_analysis)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "analyze-run",
                    "analysis": run_analysis,
                })));
            }
            println!("task analyses considered: {}", run_analysis.task_analyses.len());
            if let Some(prompt_analysis) = &run_analysis.system_prompt_analysis {
                println!("suggested prompt: {}", prompt_analysis.suggested_prompt);
            }
            if let Some(suggestion) = &run_analysis.suggestion {
                println!("suggestion: {}", suggestion);
            }
        }
        Commands::Export {
            root,
            dataset,
            split,
            out,
            json,
        } => {
            let repo = load_run_repository(&root)?;
            let runs: Vec<RunData> = repo.runs.into_iter().map(|r| r.run).collect();
            let filtered = RunFilter::new()
                .dataset(dataset.clone())
                .split(split.clone())
                .apply(&runs);
            let exported_at = Utc::now();
            let document = build_export_document(&filtered, &dataset, &split, exported_at);
            let out_path =
                out.unwrap_or_else(|| PathBuf::from(export_filename(&dataset, &split, exported_at)));
            runboard_core::atomic_write_json_pretty(&out_path, &document)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "export",
                    "out": out_path.display().to_string(),
                    "num_runs": filtered.len(),
                })));
            }
            println!("exported {} runs to {}", filtered.len(), out_path.display());
        }
        Commands::SchemaValidate { schema, file, json } => {
            let compiled = runboard_schemas::compile_schema(&schema)?;
            let data = std::fs::read_to_string(&file)?;
            let value: Value = serde_json::from_str(&data)?;
            let errors = runboard_schemas::validation_errors(&compiled, &value);
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("schema error: {}", e);
                }
                std::process::exit(1);
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "schema-validate",
                    "valid": true,
                    "schema": schema,
                })));
            }
            println!("ok");
        }
    }
    Ok(None)
}

/// Surface import validation failures as the full violation list rather than
/// one opaque line.
fn import_with_violation_details(run_dir: &Path, json: bool) -> Result<RunData> {
    match import_run_dir(run_dir) {
        Ok(run) => Ok(run),
        Err(err @ ImportError::Validation(_)) => {
            if !json {
                for violation in err.violations() {
                    eprintln!("violation: {}", violation);
                }
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn open_session(
    run_dir: &Path,
    args: &AnalysisArgs,
) -> Result<AnalysisSession<HttpAnalysisBackend>> {
    let resolved = Settings::resolve(args)?;
    let backend = HttpAnalysisBackend::new(&resolved.endpoint);
    let models = backend
        .list_models()
        .map_err(|e| anyhow!("model list unavailable: {}", e))?;
    let mut session = AnalysisSession::new(
        backend,
        models,
        AnalysisSettings {
            model: resolved.model,
            temperature: resolved.temperature,
            include_successful_tasks: resolved.include_successful_tasks,
        },
    );
    session.seed_task_analyses(store::load_task_analyses(run_dir)?);
    Ok(session)
}

fn print_run_line(dir: &Path, run: &RunData) {
    let (dataset, split, system, run_id) = run
        .canonical_args()
        .map(|a| (a.dataset.clone(), a.split.clone(), a.system_type.clone(), a.run_id))
        .unwrap_or_default();
    println!(
        "{}: {} / {} / {} run {} (model {}, {} tasks, mean {:.3})",
        dir.display(),
        dataset,
        split,
        system,
        run_id,
        run.model(),
        run.tasks.len(),
        run.metrics.mean_score
    );
}

fn run_row_json(dir: &Path, run: &RunData) -> Value {
    json!({
        "run_dir": dir.display().to_string(),
        "dataset": run.canonical_args().map(|a| a.dataset.clone()),
        "split": run.canonical_args().map(|a| a.split.clone()),
        "system": run.canonical_args().map(|a| a.system_type.clone()),
        "run_id": run.canonical_args().map(|a| a.run_id),
        "model": run.model(),
        "tasks": run.tasks.len(),
        "mean_score": run.metrics.mean_score,
        "digest": run_digest(run),
        "has_analysis": run.analysis.is_some(),
    })
}

fn source_label(source: runboard_core::model::MessageSource) -> &'static str {
    match source {
        runboard_core::model::MessageSource::User => "user",
        runboard_core::model::MessageSource::Agent => "agent",
    }
}

fn kind_label(kind: &MessageKind) -> &'static str {
    match kind {
        MessageKind::Plan(_) => "plan",
        MessageKind::ToolCallRequest(_) => "tool-call-request",
        MessageKind::ToolCallExecution(_) => "tool-call-execution",
        MessageKind::ToolCallSummary(_) => "tool-call-summary",
        MessageKind::Thought(_) => "thought",
        MessageKind::Multimodal(_) => "multimodal",
        MessageKind::BaseText(_) => "text",
        MessageKind::Unstructured(_) => "unstructured",
    }
}

fn kind_preview(kind: &MessageKind) -> String {
    const MAX: usize = 80;
    let text = match kind {
        MessageKind::Plan(plan) => format!("{} ({} steps)", plan.task, plan.steps.len()),
        MessageKind::ToolCallRequest(calls) => calls
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        MessageKind::ToolCallExecution(results) => format!("{} results", results.len()),
        MessageKind::ToolCallSummary(text)
        | MessageKind::Thought(text)
        | MessageKind::BaseText(text)
        | MessageKind::Unstructured(text) => text.clone(),
        MessageKind::Multimodal(parts) => format!("{} parts", parts.len()),
    };
    let flat = text.replace('\n', " ");
    if flat.chars().count() > MAX {
        let mut clipped: String = flat.chars().take(MAX).collect();
        clipped.push_str("...");
        clipped
    } else {
        flat
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Import { json, .. }
        | Commands::Runs { json, .. }
        | Commands::Compare { json, .. }
        | Commands::Summary { json, .. }
        | Commands::Transcript { json, .. }
        | Commands::Models { json, .. }
        | Commands::AnalyzeTask { json, .. }
        | Commands::AnalyzeTasks { json, .. }
        | Commands::AnalyzeRun { json, .. }
        | Commands::Export { json, .. }
        | Commands::SchemaValidate { json, .. } => *json,
        _ => false,
    }
}
