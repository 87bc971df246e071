use serde_json::Value;

/// Sentinel steps carry either a natural-language condition or a fixed
/// iteration count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanCondition {
    Iterations(u64),
    Text(String),
}

impl PlanCondition {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(PlanCondition::Iterations),
            Value::String(s) => {
                if let Ok(n) = s.parse::<u64>() {
                    Some(PlanCondition::Iterations(n))
                } else if s.is_empty() {
                    None
                } else {
                    Some(PlanCondition::Text(s.clone()))
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub title: String,
    pub details: String,
    pub agent_name: String,
    pub enabled: bool,
    pub sleep_duration: Option<u64>,
    pub condition: Option<PlanCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanContent {
    pub task: String,
    pub from_memory: bool,
    pub steps: Vec<PlanStep>,
}

/// Tolerant plan extraction: anything missing gets its default rather than
/// failing the whole message.
pub fn parse_plan(value: &Value) -> PlanContent {
    let steps = value
        .get("steps")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_step).collect())
        .unwrap_or_default();
    PlanContent {
        task: value
            .get("task")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled Task")
            .to_string(),
        from_memory: value
            .get("from_memory")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        steps,
    }
}

fn parse_step(value: &Value) -> PlanStep {
    PlanStep {
        title: value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        details: value
            .get("details")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        agent_name: value
            .get("agent_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        enabled: value.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true),
        sleep_duration: value.get("sleep_duration").and_then(|v| v.as_u64()),
        condition: value.get("condition").and_then(PlanCondition::from_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_steps_default_their_optional_fields() {
        let plan = parse_plan(&json!({
            "task": "book a flight",
            "steps": [
                {"title": "search", "details": "open the airline page", "agent_name": "web_surfer"},
                {"title": "wait for price drop", "enabled": false,
                 "sleep_duration": 600, "condition": "price below 300"}
            ]
        }));
        assert_eq!(plan.task, "book a flight");
        assert!(!plan.from_memory);
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].enabled);
        assert!(plan.steps[0].sleep_duration.is_none());
        assert!(!plan.steps[1].enabled);
        assert_eq!(plan.steps[1].sleep_duration, Some(600));
        assert_eq!(
            plan.steps[1].condition,
            Some(PlanCondition::Text("price below 300".to_string()))
        );
    }

    #[test]
    fn numeric_conditions_become_iteration_counts() {
        assert_eq!(
            PlanCondition::from_value(&json!(5)),
            Some(PlanCondition::Iterations(5))
        );
        assert_eq!(
            PlanCondition::from_value(&json!("12")),
            Some(PlanCondition::Iterations(12))
        );
        assert_eq!(PlanCondition::from_value(&json!("")), None);
    }

    #[test]
    fn missing_task_gets_the_untitled_placeholder() {
        let plan = parse_plan(&json!({"steps": []}));
        assert_eq!(plan.task, "Untitled Task");
        assert!(plan.steps.is_empty());
    }
}
