//! Embedded JSON Schemas for everything runboard reads off disk or the wire.

use anyhow::{anyhow, Result};
use include_dir::{include_dir, Dir};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

static SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

pub fn compile_schema(name: &str) -> Result<JSONSchema> {
    let file = SCHEMAS
        .get_file(name)
        .ok_or_else(|| anyhow!("unknown schema: {}", name))?;
    let text = file
        .contents_utf8()
        .ok_or_else(|| anyhow!("schema is not utf-8: {}", name))?;
    let schema_json: Value = serde_json::from_str(text)
        .map_err(|e| anyhow!("schema is not valid JSON ({}): {}", name, e))?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema_json)
        .map_err(|e| anyhow!("schema failed to compile ({}): {}", name, e))
}

/// Validate and collect every violation as `<instance path>: <message>`.
pub fn validation_errors(schema: &JSONSchema, instance: &Value) -> Vec<String> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect(),
    }
}

pub fn schema_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SCHEMAS
        .files()
        .filter_map(|f| f.path().to_str())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_embedded_schema_compiles() {
        for name in schema_names() {
            compile_schema(name).unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        }
    }

    #[test]
    fn task_score_schema_bounds_the_score() {
        let schema = compile_schema("task_score_v1.jsonschema").expect("compile");
        assert!(validation_errors(&schema, &json!({"score": 0.5, "metadata": {}})).is_empty());
        let errors = validation_errors(&schema, &json!({"score": 1.5, "metadata": {}}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("/score"), "unexpected: {:?}", errors);
    }

    #[test]
    fn run_args_schema_requires_selector_fields() {
        let schema = compile_schema("run_args_v1.jsonschema").expect("compile");
        let errors = validation_errors(&schema, &json!({"dataset": "gaia"}));
        assert!(!errors.is_empty());
    }

    #[test]
    fn task_analysis_schema_rejects_missing_suggestion() {
        let schema = compile_schema("task_analysis_v1.jsonschema").expect("compile");
        let ok = json!({"taskId": "t1", "reason": "r", "suggestion": "s"});
        assert!(validation_errors(&schema, &ok).is_empty());
        let bad = json!({"taskId": "t1", "reason": "r"});
        assert!(!validation_errors(&schema, &bad).is_empty());
    }

    #[test]
    fn unknown_schema_name_is_an_error() {
        assert!(compile_schema("nope_v1.jsonschema").is_err());
    }
}
