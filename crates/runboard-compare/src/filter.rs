use runboard_core::model::{RunArgs, RunData};

/// Progressive run filter. Unset criteria pass everything through; a run is
/// retained when any single args entry satisfies every criterion that is set.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub dataset: Option<String>,
    pub split: Option<String>,
    pub system: Option<String>,
    pub run_id: Option<i64>,
}

impl RunFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        let dataset = dataset.into();
        self.dataset = (!dataset.is_empty()).then_some(dataset);
        self
    }

    pub fn split(mut self, split: impl Into<String>) -> Self {
        let split = split.into();
        self.split = (!split.is_empty()).then_some(split);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = (!system.is_empty()).then_some(system);
        self
    }

    pub fn run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_none()
            && self.split.is_none()
            && self.system.is_none()
            && self.run_id.is_none()
    }

    fn matches_args(&self, args: &RunArgs) -> bool {
        if let Some(dataset) = &self.dataset {
            if &args.dataset != dataset {
                return false;
            }
        }
        if let Some(split) = &self.split {
            if &args.split != split {
                return false;
            }
        }
        if let Some(system) = &self.system {
            if &args.system_type != system {
                return false;
            }
        }
        if let Some(run_id) = self.run_id {
            if args.run_id != run_id {
                return false;
            }
        }
        true
    }

    pub fn matches(&self, run: &RunData) -> bool {
        run.args.iter().any(|args| self.matches_args(args))
    }

    /// An empty result is a valid outcome, not an error.
    pub fn apply<'a>(&self, runs: &'a [RunData]) -> Vec<&'a RunData> {
        runs.iter().filter(|run| self.matches(run)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_run;

    #[test]
    fn unset_filter_passes_everything_through() {
        let runs = vec![
            make_run("gaia", "validation", "agent", 1),
            make_run("webarena", "test", "agent", 2),
        ];
        assert_eq!(RunFilter::new().apply(&runs).len(), 2);
    }

    #[test]
    fn each_added_stage_never_grows_the_result() {
        let runs = vec![
            make_run("gaia", "validation", "agent", 1),
            make_run("gaia", "validation", "agent", 2),
            make_run("gaia", "test", "agent", 3),
            make_run("webarena", "test", "other", 1),
        ];
        let by_dataset = RunFilter::new().dataset("gaia").apply(&runs);
        let by_split = RunFilter::new()
            .dataset("gaia")
            .split("validation")
            .apply(&runs);
        let by_system = RunFilter::new()
            .dataset("gaia")
            .split("validation")
            .system("agent")
            .apply(&runs);
        let by_run = RunFilter::new()
            .dataset("gaia")
            .split("validation")
            .system("agent")
            .run_id(1)
            .apply(&runs);
        assert!(by_dataset.len() <= runs.len());
        assert!(by_split.len() <= by_dataset.len());
        assert!(by_system.len() <= by_split.len());
        assert!(by_run.len() <= by_system.len());
        assert_eq!(by_dataset.len(), 3);
        assert_eq!(by_split.len(), 2);
        assert_eq!(by_run.len(), 1);
    }

    #[test]
    fn no_match_yields_empty_not_error() {
        let runs = vec![make_run("gaia", "validation", "agent", 1)];
        assert!(RunFilter::new().dataset("nope").apply(&runs).is_empty());
    }

    #[test]
    fn all_criteria_must_match_a_single_args_entry() {
        let mut run = make_run("gaia", "validation", "agent", 1);
        run.args
            .push(crate::testutil::make_args("webarena", "test", "agent", 2));
        let runs = vec![run];
        // dataset from one entry, split from the other: no single entry has both
        assert!(RunFilter::new()
            .dataset("gaia")
            .split("test")
            .apply(&runs)
            .is_empty());
        assert_eq!(
            RunFilter::new()
                .dataset("webarena")
                .split("test")
                .apply(&runs)
                .len(),
            1
        );
    }

    #[test]
    fn empty_string_selector_is_treated_as_unset() {
        let runs = vec![make_run("gaia", "validation", "agent", 1)];
        assert_eq!(RunFilter::new().dataset("").split("").apply(&runs).len(), 1);
    }
}
