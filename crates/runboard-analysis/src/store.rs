use anyhow::{anyhow, Result};
use runboard_core::analysis::{RunAnalysis, TaskAnalysis};
use runboard_core::atomic_write_json_pretty;
use runboard_schemas::{compile_schema, validation_errors};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Analyses are persisted inside the run folder so a later invocation can
/// pick up where the last one stopped.
const TASK_ANALYSES_FILE: &str = "task_analyses.json";
const RUN_ANALYSIS_FILE: &str = "run_analysis.json";

pub fn analysis_dir(run_dir: &Path) -> PathBuf {
    run_dir.join("analysis")
}

pub fn load_task_analyses(run_dir: &Path) -> Result<BTreeMap<String, TaskAnalysis>> {
    let path = analysis_dir(run_dir).join(TASK_ANALYSES_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let value: Value = serde_json::from_slice(&fs::read(&path)?)?;
    let schema = compile_schema("task_analyses_v1.jsonschema")?;
    let errors = validation_errors(&schema, &value);
    if !errors.is_empty() {
        return Err(anyhow!(
            "saved task analyses failed validation ({}): {}",
            path.display(),
            errors.join("; ")
        ));
    }
    Ok(serde_json::from_value(value)?)
}

pub fn save_task_analyses(
    run_dir: &Path,
    analyses: &BTreeMap<String, TaskAnalysis>,
) -> Result<()> {
    let path = analysis_dir(run_dir).join(TASK_ANALYSES_FILE);
    atomic_write_json_pretty(&path, &serde_json::to_value(analyses)?)
}

pub fn load_run_analysis(run_dir: &Path) -> Result<Option<RunAnalysis>> {
    let path = analysis_dir(run_dir).join(RUN_ANALYSIS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(&fs::read(&path)?)?;
    let schema = compile_schema("run_analysis_v1.jsonschema")?;
    let errors = validation_errors(&schema, &value);
    if !errors.is_empty() {
        return Err(anyhow!(
            "saved run analysis failed validation ({}): {}",
            path.display(),
            errors.join("; ")
        ));
    }
    Ok(Some(serde_json::from_value(value)?))
}

pub fn save_run_analysis(run_dir: &Path, analysis: &RunAnalysis) -> Result<()> {
    let path = analysis_dir(run_dir).join(RUN_ANALYSIS_FILE);
    atomic_write_json_pretty(&path, &serde_json::to_value(analysis)?)
}
