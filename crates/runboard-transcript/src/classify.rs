use runboard_core::model::TaskMessage;
use serde_json::Value;

use crate::plan::{parse_plan, PlanContent};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExecutionResult {
    pub call_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultimodalPart {
    Text(String),
    Image { url: Option<String>, data: Option<String> },
}

/// Structured message kinds, most specific first. Message shapes can be
/// structurally ambiguous, so classification is first-match-wins in exactly
/// this order; reordering the probes changes behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Plan(PlanContent),
    ToolCallRequest(Vec<FunctionCall>),
    ToolCallExecution(Vec<FunctionExecutionResult>),
    ToolCallSummary(String),
    Thought(String),
    Multimodal(Vec<MultimodalPart>),
    BaseText(String),
    Unstructured(String),
}

pub fn classify(message: &TaskMessage) -> MessageKind {
    let parsed: Option<Value> = serde_json::from_str(&message.content).ok();

    if is_plan(message, parsed.as_ref()) {
        let plan = parsed
            .as_ref()
            .map(parse_plan)
            .unwrap_or_else(|| parse_plan(&Value::Null));
        return MessageKind::Plan(plan);
    }
    if let Some(calls) = as_tool_call_request(parsed.as_ref()) {
        return MessageKind::ToolCallRequest(calls);
    }
    if let Some(results) = as_tool_call_execution(parsed.as_ref()) {
        return MessageKind::ToolCallExecution(results);
    }
    if let Some(summary) = as_tool_call_summary(message, parsed.as_ref()) {
        return MessageKind::ToolCallSummary(summary);
    }
    if let Some(thought) = as_thought(message, parsed.as_ref()) {
        return MessageKind::Thought(thought);
    }
    if let Some(parts) = as_multimodal(parsed.as_ref()) {
        return MessageKind::Multimodal(parts);
    }
    if let Some(text) = as_base_text(parsed.as_ref()) {
        return MessageKind::BaseText(text);
    }
    MessageKind::Unstructured(message.content.clone())
}

fn is_plan(message: &TaskMessage, parsed: Option<&Value>) -> bool {
    if message.meta_type() == Some("plan_message") {
        return true;
    }
    matches!(parsed, Some(Value::Object(map)) if map.get("steps").map(Value::is_array).unwrap_or(false))
}

fn as_tool_call_request(parsed: Option<&Value>) -> Option<Vec<FunctionCall>> {
    let items = parsed?.as_array()?;
    items
        .iter()
        .map(|item| {
            let obj = item.as_object()?;
            if !(obj.contains_key("id") && obj.contains_key("name") && obj.contains_key("arguments"))
            {
                return None;
            }
            Some(FunctionCall {
                id: obj.get("id")?.as_str().unwrap_or_default().to_string(),
                name: obj.get("name")?.as_str().unwrap_or_default().to_string(),
                arguments: obj
                    .get("arguments")
                    .map(value_as_text)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn as_tool_call_execution(parsed: Option<&Value>) -> Option<Vec<FunctionExecutionResult>> {
    let items = parsed?.as_array()?;
    items
        .iter()
        .map(|item| {
            let obj = item.as_object()?;
            if !(obj.contains_key("call_id") && obj.contains_key("content")) {
                return None;
            }
            Some(FunctionExecutionResult {
                call_id: obj.get("call_id")?.as_str().unwrap_or_default().to_string(),
                content: obj.get("content").map(value_as_text).unwrap_or_default(),
            })
        })
        .collect()
}

fn as_tool_call_summary(message: &TaskMessage, parsed: Option<&Value>) -> Option<String> {
    if message.meta_type() == Some("tool_call_summary") {
        return Some(extract_text(message, parsed));
    }
    let obj = parsed?.as_object()?;
    if obj.get("type").and_then(|v| v.as_str()) == Some("ToolCallSummaryMessage") {
        return Some(obj.get("content").map(value_as_text).unwrap_or_default());
    }
    None
}

fn as_thought(message: &TaskMessage, parsed: Option<&Value>) -> Option<String> {
    if message.meta_type() == Some("thought") {
        return Some(extract_text(message, parsed));
    }
    let obj = parsed?.as_object()?;
    if obj.get("type").and_then(|v| v.as_str()) == Some("ThoughtEvent") {
        return Some(obj.get("content").map(value_as_text).unwrap_or_default());
    }
    None
}

fn as_multimodal(parsed: Option<&Value>) -> Option<Vec<MultimodalPart>> {
    let items = parsed?.as_array()?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(MultimodalPart::Text(s.clone())),
            Value::Object(obj) if obj.contains_key("url") || obj.contains_key("data") => {
                Some(MultimodalPart::Image {
                    url: obj.get("url").and_then(|v| v.as_str()).map(String::from),
                    data: obj.get("data").and_then(|v| v.as_str()).map(String::from),
                })
            }
            _ => None,
        })
        .collect()
}

/// A structured wrapper around plain text: `{"content": "..."}`, sometimes
/// nested one level deeper.
fn as_base_text(parsed: Option<&Value>) -> Option<String> {
    let obj = parsed?.as_object()?;
    match obj.get("content")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(inner) => inner
            .get("content")
            .and_then(|v| v.as_str())
            .map(String::from),
        _ => None,
    }
}

fn extract_text(message: &TaskMessage, parsed: Option<&Value>) -> String {
    as_base_text(parsed).unwrap_or_else(|| message.content.clone())
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runboard_core::model::MessageSource;
    use serde_json::{json, Map};

    fn msg(content: &str) -> TaskMessage {
        TaskMessage {
            source: MessageSource::Agent,
            content: content.to_string(),
            timestamp: None,
            metadata: None,
        }
    }

    fn msg_with_type(content: &str, meta_type: &str) -> TaskMessage {
        let mut metadata = Map::new();
        metadata.insert("type".to_string(), json!(meta_type));
        TaskMessage {
            source: MessageSource::Agent,
            content: content.to_string(),
            timestamp: None,
            metadata: Some(metadata),
        }
    }

    #[test]
    fn plain_text_is_unstructured() {
        let kind = classify(&msg("I opened the page and clicked search."));
        assert_eq!(
            kind,
            MessageKind::Unstructured("I opened the page and clicked search.".to_string())
        );
    }

    #[test]
    fn object_with_steps_is_a_plan() {
        let content = json!({"task": "t", "steps": [{"title": "one"}]}).to_string();
        match classify(&msg(&content)) {
            MessageKind::Plan(plan) => assert_eq!(plan.steps.len(), 1),
            other => panic!("expected plan, got {:?}", other),
        }
    }

    #[test]
    fn plan_metadata_wins_even_without_steps() {
        let kind = classify(&msg_with_type("{\"task\": \"t\"}", "plan_message"));
        assert!(matches!(kind, MessageKind::Plan(_)));
    }

    #[test]
    fn tool_call_request_array_is_detected() {
        let content = json!([
            {"id": "c1", "name": "click", "arguments": "{\"x\": 1}"}
        ])
        .to_string();
        match classify(&msg(&content)) {
            MessageKind::ToolCallRequest(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "click");
            }
            other => panic!("expected tool call request, got {:?}", other),
        }
    }

    #[test]
    fn tool_call_execution_array_is_detected() {
        let content = json!([
            {"call_id": "c1", "content": "clicked"}
        ])
        .to_string();
        match classify(&msg(&content)) {
            MessageKind::ToolCallExecution(results) => {
                assert_eq!(results[0].call_id, "c1");
                assert_eq!(results[0].content, "clicked");
            }
            other => panic!("expected tool call execution, got {:?}", other),
        }
    }

    // An item carrying id+name+arguments AND call_id+content satisfies both
    // probes; the request probe runs first and must win.
    #[test]
    fn ambiguous_tool_call_item_resolves_to_request() {
        let content = json!([
            {"id": "c1", "name": "click", "arguments": "{}",
             "call_id": "c1", "content": "clicked"}
        ])
        .to_string();
        assert!(matches!(
            classify(&msg(&content)),
            MessageKind::ToolCallRequest(_)
        ));
    }

    #[test]
    fn summary_and_thought_are_recognized_by_payload_type_tag() {
        let summary = json!({"type": "ToolCallSummaryMessage", "content": "2 calls ok"});
        match classify(&msg(&summary.to_string())) {
            MessageKind::ToolCallSummary(text) => assert_eq!(text, "2 calls ok"),
            other => panic!("expected summary, got {:?}", other),
        }
        let thought = json!({"type": "ThoughtEvent", "content": "maybe retry"});
        match classify(&msg(&thought.to_string())) {
            MessageKind::Thought(text) => assert_eq!(text, "maybe retry"),
            other => panic!("expected thought, got {:?}", other),
        }
    }

    #[test]
    fn summary_metadata_tag_is_recognized() {
        let kind = classify(&msg_with_type("all calls succeeded", "tool_call_summary"));
        assert_eq!(
            kind,
            MessageKind::ToolCallSummary("all calls succeeded".to_string())
        );
    }

    #[test]
    fn mixed_text_and_image_array_is_multimodal() {
        let content = json!([
            "here is the page",
            {"data": "aGVsbG8="},
            {"url": "https://example.test/shot.png"}
        ])
        .to_string();
        match classify(&msg(&content)) {
            MessageKind::Multimodal(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(parts[0], MultimodalPart::Text(_)));
                assert!(matches!(parts[1], MultimodalPart::Image { .. }));
            }
            other => panic!("expected multimodal, got {:?}", other),
        }
    }

    #[test]
    fn wrapped_content_object_is_base_text() {
        let content = json!({"content": "the wrapped text"}).to_string();
        assert_eq!(
            classify(&msg(&content)),
            MessageKind::BaseText("the wrapped text".to_string())
        );
        let nested = json!({"content": {"content": "deeper"}}).to_string();
        assert_eq!(
            classify(&msg(&nested)),
            MessageKind::BaseText("deeper".to_string())
        );
    }

    #[test]
    fn unknown_object_shape_falls_back_to_unstructured() {
        let content = json!({"weird": true}).to_string();
        assert!(matches!(
            classify(&msg(&content)),
            MessageKind::Unstructured(_)
        ));
    }
}
