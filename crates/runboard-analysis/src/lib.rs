//! LLM-assisted analysis of evaluation runs: a backend seam over the
//! analysis collaborator plus the orchestration rules (preconditions, keyed
//! errors, strictly sequential batches, skip-if-analyzed).

pub mod backend;
pub mod session;
pub mod store;

pub use backend::{AnalysisBackend, BackendError, HttpAnalysisBackend};
pub use session::{task_error_key, AnalysisSession, AnalysisSettings, BatchOutcome, RUN_ERROR_KEY};
