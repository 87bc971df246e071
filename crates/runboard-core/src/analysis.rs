use serde::{Deserialize, Serialize};

/// Verdict produced by the analysis collaborator for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPromptAnalysis {
    #[serde(rename = "originalPrompt")]
    pub original_prompt: String,
    #[serde(rename = "suggestedPrompt")]
    pub suggested_prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAnalysis {
    #[serde(rename = "taskAnalyses", default)]
    pub task_analyses: Vec<TaskAnalysis>,
    #[serde(
        rename = "systemPromptAnalysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub system_prompt_analysis: Option<SystemPromptAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}
