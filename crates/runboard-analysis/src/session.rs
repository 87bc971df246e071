use runboard_core::analysis::{RunAnalysis, TaskAnalysis};
use runboard_core::model::{RunData, TaskData};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::backend::AnalysisBackend;

/// Error-map key for run-level analysis; task errors use [`task_error_key`].
pub const RUN_ERROR_KEY: &str = "run";

pub fn task_error_key(task_id: &str) -> String {
    format!("task-{}", task_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub model: String,
    pub temperature: f64,
    pub include_successful_tasks: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            temperature: 0.0,
            include_successful_tasks: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

/// One analysis workflow over a selected run's task set.
///
/// Every unit of work (a task, or the run itself) owns a slot in the keyed
/// error map, so one task's failure coexists with other tasks' results. A
/// unit is re-triggerable from either terminal state; retrying clears its
/// previous error first.
pub struct AnalysisSession<B: AnalysisBackend> {
    backend: B,
    available_models: Vec<String>,
    pub settings: AnalysisSettings,
    task_analyses: BTreeMap<String, TaskAnalysis>,
    run_analysis: Option<RunAnalysis>,
    errors: BTreeMap<String, String>,
    analyzing: BTreeSet<String>,
}

impl<B: AnalysisBackend> AnalysisSession<B> {
    pub fn new(backend: B, available_models: Vec<String>, settings: AnalysisSettings) -> Self {
        Self {
            backend,
            available_models,
            settings,
            task_analyses: BTreeMap::new(),
            run_analysis: None,
            errors: BTreeMap::new(),
            analyzing: BTreeSet::new(),
        }
    }

    /// Seed results saved by a previous session so batch analysis skips them.
    pub fn seed_task_analyses(&mut self, analyses: BTreeMap<String, TaskAnalysis>) {
        self.task_analyses.extend(analyses);
    }

    pub fn task_analyses(&self) -> &BTreeMap<String, TaskAnalysis> {
        &self.task_analyses
    }

    pub fn run_analysis(&self) -> Option<&RunAnalysis> {
        self.run_analysis.as_ref()
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn dismiss_error(&mut self, key: &str) {
        self.errors.remove(key);
    }

    pub fn is_analyzing(&self, key: &str) -> bool {
        self.analyzing.contains(key)
    }

    fn model_is_available(&self) -> bool {
        self.available_models
            .iter()
            .any(|m| m == &self.settings.model)
    }

    fn invalid_model_message(&self) -> String {
        format!(
            "model '{}' is not in the available model list",
            self.settings.model
        )
    }

    /// Analyze one task out of `tasks`. Returns true when a result was
    /// stored. An unknown task id is a silent no-op: it signals a stale
    /// selection, not a user-actionable failure.
    pub fn analyze_task(&mut self, tasks: &[TaskData], task_id: &str) -> bool {
        let key = task_error_key(task_id);
        if !self.model_is_available() {
            let message = self.invalid_model_message();
            self.errors.insert(key, message);
            return false;
        }

        self.analyzing.insert(key.clone());
        self.errors.remove(&key);

        let mut stored = false;
        match tasks.iter().find(|t| t.task_id == task_id) {
            None => {
                debug!(task_id, "task not found in current task set; skipping");
            }
            Some(task) => {
                match self
                    .backend
                    .analyze_task(task, &self.settings.model, self.settings.temperature)
                {
                    Ok(analysis) => {
                        self.task_analyses.insert(task_id.to_string(), analysis);
                        stored = true;
                    }
                    Err(err) => {
                        self.errors.insert(key.clone(), err.to_string());
                    }
                }
            }
        }

        // cleared on every path, success or not
        self.analyzing.remove(&key);
        stored
    }

    /// Analyze every selected task that has no stored result yet, one at a
    /// time. Calls are strictly serialized to avoid overwhelming the
    /// collaborator; a task's failure does not stop the batch.
    pub fn analyze_all(&mut self, tasks: &[TaskData]) -> BatchOutcome {
        if !self.model_is_available() {
            let message = self.invalid_model_message();
            self.errors.insert(RUN_ERROR_KEY.to_string(), message);
            return BatchOutcome::default();
        }

        let selected: Vec<String> = tasks
            .iter()
            .filter(|t| self.settings.include_successful_tasks || t.is_failure())
            .map(|t| t.task_id.clone())
            .collect();
        let pending: Vec<String> = selected
            .iter()
            .filter(|id| !self.task_analyses.contains_key(*id))
            .cloned()
            .collect();
        let skipped = selected.len() - pending.len();

        if pending.is_empty() {
            self.errors.insert(
                RUN_ERROR_KEY.to_string(),
                "all selected tasks have already been analyzed".to_string(),
            );
            return BatchOutcome {
                attempted: 0,
                succeeded: 0,
                skipped,
            };
        }

        self.errors.remove(RUN_ERROR_KEY);
        let mut outcome = BatchOutcome {
            skipped,
            ..BatchOutcome::default()
        };
        for task_id in pending {
            outcome.attempted += 1;
            if self.analyze_task(tasks, &task_id) {
                outcome.succeeded += 1;
            }
        }
        outcome
    }

    /// Run-level analysis over everything analyzed so far. Requires at least
    /// one task analysis; the system prompt is extracted from the run's
    /// canonical args and its absence is never an error.
    pub fn analyze_run(&mut self, run: &RunData) -> bool {
        if !self.model_is_available() {
            let message = self.invalid_model_message();
            self.errors.insert(RUN_ERROR_KEY.to_string(), message);
            return false;
        }
        if self.task_analyses.is_empty() {
            self.errors.insert(
                RUN_ERROR_KEY.to_string(),
                "no task analyses available; analyze at least one task first".to_string(),
            );
            return false;
        }

        self.analyzing.insert(RUN_ERROR_KEY.to_string());
        self.errors.remove(RUN_ERROR_KEY);

        let analyses: Vec<TaskAnalysis> = self.task_analyses.values().cloned().collect();
        let system_prompt = run.system_prompt();
        let mut stored = false;
        match self.backend.analyze_run(
            &analyses,
            &system_prompt,
            &self.settings.model,
            self.settings.temperature,
        ) {
            Ok(analysis) => {
                self.run_analysis = Some(analysis);
                stored = true;
            }
            Err(err) => {
                self.errors.insert(RUN_ERROR_KEY.to_string(), err.to_string());
            }
        }

        self.analyzing.remove(RUN_ERROR_KEY);
        stored
    }
}
