use runboard_core::analysis::RunAnalysis;
use runboard_core::model::RunData;

/// Selection owned by the compare view. Dataset scopes split, split scopes
/// the task list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareSelection {
    pub dataset: Option<String>,
    pub split: Option<String>,
    pub task: Option<String>,
}

/// Selection owned by the analyze view: one concrete run, reached through
/// dataset -> split -> system -> run id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeSelection {
    pub dataset: Option<String>,
    pub split: Option<String>,
    pub system: Option<String>,
    pub run_id: Option<i64>,
}

/// The single application state store. Derivation functions never reach into
/// this implicitly; callers pass the slices they need.
#[derive(Debug, Default)]
pub struct AppState {
    pub runs: Vec<RunData>,
    pub compare: CompareSelection,
    pub analyze: AnalyzeSelection,
}

impl AppState {
    pub fn add_run(&mut self, run: RunData) {
        self.runs.push(run);
    }

    pub fn remove_run(&mut self, index: usize) -> Option<RunData> {
        if index < self.runs.len() {
            Some(self.runs.remove(index))
        } else {
            None
        }
    }

    pub fn clear_runs(&mut self) {
        self.runs.clear();
        self.compare = CompareSelection::default();
        self.analyze = AnalyzeSelection::default();
    }

    pub fn attach_analysis(&mut self, index: usize, analysis: RunAnalysis) -> bool {
        match self.runs.get_mut(index) {
            Some(run) => {
                run.analysis = Some(analysis);
                true
            }
            None => false,
        }
    }

    // Changing an upstream selector invalidates every downstream option set,
    // so the downstream selections are cleared with it.

    pub fn set_compare_dataset(&mut self, dataset: Option<String>) {
        self.compare.dataset = dataset;
        self.compare.split = None;
        self.compare.task = None;
    }

    pub fn set_compare_split(&mut self, split: Option<String>) {
        self.compare.split = split;
        self.compare.task = None;
    }

    pub fn set_compare_task(&mut self, task: Option<String>) {
        self.compare.task = task;
    }

    pub fn set_analyze_dataset(&mut self, dataset: Option<String>) {
        self.analyze.dataset = dataset;
        self.analyze.split = None;
        self.analyze.system = None;
        self.analyze.run_id = None;
    }

    pub fn set_analyze_split(&mut self, split: Option<String>) {
        self.analyze.split = split;
        self.analyze.system = None;
        self.analyze.run_id = None;
    }

    pub fn set_analyze_system(&mut self, system: Option<String>) {
        self.analyze.system = system;
        self.analyze.run_id = None;
    }

    pub fn set_analyze_run_id(&mut self, run_id: Option<i64>) {
        self.analyze.run_id = run_id;
    }

    /// The run addressed by the analyze selection, if any args entry carries
    /// the selected run id.
    pub fn selected_run(&self) -> Option<&RunData> {
        let run_id = self.analyze.run_id?;
        self.runs
            .iter()
            .find(|run| run.args.iter().any(|args| args.run_id == run_id))
    }
}
