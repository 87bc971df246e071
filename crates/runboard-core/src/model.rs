use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::RunAnalysis;

pub const NO_SYSTEM_PROMPT: &str = "No system prompt found";

/// One argument snapshot recorded for a run. A run folder may carry several
/// (one per worker); the first entry is treated as canonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArgs {
    pub mode: String,
    pub dataset: String,
    pub split: String,
    pub system_type: String,
    pub run_id: i64,
    pub config: String,
    #[serde(default)]
    pub config_content: Value,
    #[serde(default)]
    pub seed: i64,
    #[serde(default)]
    pub parallel: i64,
    #[serde(default)]
    pub subsample: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub mean_score: f64,
    pub max_score: f64,
    pub num_tasks: usize,
    pub average_time: f64,
    pub scores: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub source: MessageSource,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskMessage {
    /// Metadata values arrive as strings from the orchestrator but are not
    /// guaranteed to; tolerate numbers as well.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        let value = self.metadata.as_ref()?.get(key)?;
        match value {
            Value::String(s) => s.parse().ok(),
            _ => value.as_u64(),
        }
    }

    pub fn meta_type(&self) -> Option<&str> {
        self.meta_str("type")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnswer {
    pub answer: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskScore {
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Wall-clock bounds of one task, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTimes {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientTokenUsage {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    #[serde(default)]
    pub requests: Vec<TokenRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenTotals {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub clients: std::collections::BTreeMap<String, ClientTokenUsage>,
    pub grand_total: TokenTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub messages: Vec<TaskMessage>,
    pub answer: TaskAnswer,
    pub score: TaskScore,
    pub times: TaskTimes,
    #[serde(rename = "tokenUsage", default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl TaskData {
    pub fn is_success(&self) -> bool {
        self.score.score == 1.0
    }

    pub fn is_failure(&self) -> bool {
        self.score.score == 0.0
    }

    pub fn is_partial(&self) -> bool {
        self.score.score > 0.0 && self.score.score < 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunData {
    pub args: Vec<RunArgs>,
    pub metrics: RunMetrics,
    pub tasks: Vec<TaskData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RunAnalysis>,
}

impl RunData {
    pub fn canonical_args(&self) -> Option<&RunArgs> {
        self.args.first()
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskData> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// System prompt from the canonical config blob. Tolerates both key
    /// spellings seen in the wild and never fails on absence.
    pub fn system_prompt(&self) -> String {
        self.canonical_args()
            .map(|args| &args.config_content)
            .and_then(|config| {
                config
                    .get("system_message")
                    .or_else(|| config.get("system_prompt"))
            })
            .and_then(|v| v.as_str())
            .unwrap_or(NO_SYSTEM_PROMPT)
            .to_string()
    }

    /// Model name buried anywhere in the canonical config blob.
    pub fn model(&self) -> String {
        self.canonical_args()
            .and_then(|args| crate::lookup::find_model(&args.config_content))
            .unwrap_or(crate::lookup::UNKNOWN_MODEL)
            .to_string()
    }
}
