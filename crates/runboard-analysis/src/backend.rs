use runboard_core::analysis::{RunAnalysis, TaskAnalysis};
use runboard_core::model::TaskData;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("analysis request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("analysis service returned status {status}")]
    Transport { status: u16 },
    #[error("analysis response did not match the expected shape: {0}")]
    Shape(String),
}

/// The analysis collaborator, seen as three opaque remote procedures.
pub trait AnalysisBackend {
    fn analyze_task(
        &self,
        task: &TaskData,
        model: &str,
        temperature: f64,
    ) -> Result<TaskAnalysis, BackendError>;

    fn analyze_run(
        &self,
        task_analyses: &[TaskAnalysis],
        system_prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Result<RunAnalysis, BackendError>;

    fn list_models(&self) -> Result<Vec<String>, BackendError>;
}

pub struct HttpAnalysisBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAnalysisBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport {
                status: status.as_u16(),
            });
        }
        let text = response.text()?;
        serde_json::from_str(&text).map_err(|e| BackendError::Shape(e.to_string()))
    }
}

impl AnalysisBackend for HttpAnalysisBackend {
    fn analyze_task(
        &self,
        task: &TaskData,
        model: &str,
        temperature: f64,
    ) -> Result<TaskAnalysis, BackendError> {
        let body = json!({
            "task": task,
            "model": model,
            "temperature": temperature,
        });
        let value = self.post("/api/analyze/task", &body)?;
        serde_json::from_value(value).map_err(|e| BackendError::Shape(e.to_string()))
    }

    fn analyze_run(
        &self,
        task_analyses: &[TaskAnalysis],
        system_prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Result<RunAnalysis, BackendError> {
        let body = json!({
            "taskAnalyses": task_analyses,
            "systemPrompt": system_prompt,
            "model": model,
            "temperature": temperature,
        });
        let value = self.post("/api/analyze/run", &body)?;
        serde_json::from_value(value).map_err(|e| BackendError::Shape(e.to_string()))
    }

    fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/models", self.base_url))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport {
                status: status.as_u16(),
            });
        }
        let text = response.text()?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| BackendError::Shape(e.to_string()))?;
        let models = value
            .get("models")
            .and_then(|v| v.as_array())
            .ok_or_else(|| BackendError::Shape("missing models array".to_string()))?;
        Ok(models
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runboard_core::model::{
        MessageSource, TaskAnswer, TaskData, TaskMessage, TaskScore, TaskTimes,
    };
    use serde_json::Map;
    use std::thread;

    fn sample_task() -> TaskData {
        TaskData {
            task_id: "t1".to_string(),
            messages: vec![TaskMessage {
                source: MessageSource::Agent,
                content: "done".to_string(),
                timestamp: None,
                metadata: None,
            }],
            answer: TaskAnswer {
                answer: String::new(),
                screenshots: vec![],
            },
            score: TaskScore {
                score: 0.0,
                metadata: Map::new(),
            },
            times: TaskTimes {
                start_time: 1.0,
                end_time: 2.0,
                duration: 1.0,
            },
            token_usage: None,
        }
    }

    /// One-shot fake collaborator: answers a single request with a fixed
    /// status and body, then shuts down.
    fn serve_once(status: u16, body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("ip listener");
        thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn successful_task_analysis_parses_the_body() {
        let base = serve_once(
            200,
            r#"{"taskId": "t1", "reason": "clicked wrong link", "suggestion": "verify urls"}"#,
        );
        let backend = HttpAnalysisBackend::new(base);
        let analysis = backend
            .analyze_task(&sample_task(), "gpt-4.1", 0.0)
            .expect("analysis");
        assert_eq!(analysis.task_id, "t1");
        assert_eq!(analysis.reason, "clicked wrong link");
    }

    #[test]
    fn non_success_status_maps_to_transport_error() {
        let base = serve_once(503, "overloaded");
        let backend = HttpAnalysisBackend::new(base);
        let err = backend
            .analyze_task(&sample_task(), "gpt-4.1", 0.0)
            .expect_err("must fail");
        match err {
            BackendError::Transport { status } => assert_eq!(status, 503),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_body_maps_to_shape_error() {
        let base = serve_once(200, r#"{"taskId": "t1"}"#);
        let backend = HttpAnalysisBackend::new(base);
        let err = backend
            .analyze_task(&sample_task(), "gpt-4.1", 0.0)
            .expect_err("must fail");
        assert!(matches!(err, BackendError::Shape(_)), "got {:?}", err);
    }

    #[test]
    fn model_list_unwraps_the_models_field() {
        let base = serve_once(200, r#"{"models": ["gpt-4.1", "o3"]}"#);
        let backend = HttpAnalysisBackend::new(base);
        let models = backend.list_models().expect("models");
        assert_eq!(models, vec!["gpt-4.1", "o3"]);
    }
}
