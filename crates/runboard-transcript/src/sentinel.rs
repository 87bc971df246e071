use chrono::{DateTime, Utc};
use runboard_core::model::TaskMessage;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::format::format_duration;
use crate::plan::PlanCondition;

const DEFAULT_SLEEP_SECONDS: u64 = 30;

/// One condition check: the agent messages produced while checking, plus the
/// outcome the orchestrator reported for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentinelCheck {
    pub check_number: u64,
    /// Indices into the task's message list.
    pub message_indices: Vec<usize>,
    pub reason: Option<String>,
    pub next_check_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentinelStatus {
    Checking,
    Sleeping {
        sleep_started: Option<DateTime<Utc>>,
        sleep_duration_seconds: u64,
    },
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentinelStep {
    pub sentinel_id: String,
    pub title: String,
    pub condition: Option<PlanCondition>,
    pub sleep_duration_seconds: u64,
    pub checks: Vec<SentinelCheck>,
    pub status: SentinelStatus,
    pub total_checks: u64,
    pub runtime_seconds: u64,
}

/// Remaining sleep time. Pure on purpose: the periodic tick that re-renders
/// a countdown lives in the caller, never here.
pub fn seconds_remaining(
    now: DateTime<Utc>,
    sleep_started: DateTime<Utc>,
    sleep_duration_seconds: u64,
) -> u64 {
    let elapsed = (now - sleep_started).num_seconds().max(0) as u64;
    sleep_duration_seconds.saturating_sub(elapsed)
}

impl SentinelStep {
    /// The status line shown next to the step title.
    pub fn status_text(&self, now: DateTime<Utc>) -> String {
        match &self.status {
            SentinelStatus::Complete => match &self.condition {
                Some(PlanCondition::Iterations(n)) => {
                    format!("Completed {} iteration{}", n, plural_s(*n))
                }
                _ => format!(
                    "Completed after {} check{}",
                    self.total_checks,
                    plural_s(self.total_checks)
                ),
            },
            SentinelStatus::Checking => match &self.condition {
                Some(PlanCondition::Iterations(n)) => {
                    format!("Checking ({}/{})...", self.total_checks, n)
                }
                _ => "Checking condition...".to_string(),
            },
            SentinelStatus::Sleeping {
                sleep_started,
                sleep_duration_seconds,
            } => {
                let remaining = sleep_started
                    .map(|started| seconds_remaining(now, started, *sleep_duration_seconds))
                    .unwrap_or(*sleep_duration_seconds);
                format!("Sleeping... next check in {}s", remaining)
            }
        }
    }

    pub fn runtime_text(&self) -> String {
        format_duration(self.runtime_seconds)
    }
}

/// Rebuild every sentinel step from a flat message stream. A
/// `sentinel_start` message opens a step; everything after it that carries
/// the same `sentinel_id` belongs to that step, grouped by check number. The
/// latest status-bearing message decides where the step stands now.
pub fn collect_sentinel_steps(messages: &[TaskMessage]) -> Vec<SentinelStep> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, msg)| msg.meta_type() == Some("sentinel_start"))
        .map(|(idx, msg)| build_step(messages, idx, msg))
        .collect()
}

fn build_step(messages: &[TaskMessage], start_idx: usize, start: &TaskMessage) -> SentinelStep {
    let sentinel_id = start.meta_str("sentinel_id").unwrap_or_default().to_string();
    let payload: Option<Value> = serde_json::from_str(&start.content).ok();

    let title = payload
        .as_ref()
        .and_then(|v| v.get("title"))
        .and_then(|v| v.as_str())
        .or_else(|| start.meta_str("step_title"))
        .unwrap_or_default()
        .to_string();
    let condition = payload
        .as_ref()
        .and_then(|v| v.get("condition"))
        .and_then(PlanCondition::from_value)
        .or_else(|| {
            start
                .meta_str("condition")
                .and_then(|s| PlanCondition::from_value(&Value::String(s.to_string())))
        });
    let sleep_duration_seconds = payload
        .as_ref()
        .and_then(|v| v.get("sleep_duration"))
        .and_then(|v| v.as_u64())
        .or_else(|| start.meta_u64("sleep_duration"))
        .unwrap_or(DEFAULT_SLEEP_SECONDS);

    let related: Vec<(usize, &TaskMessage)> = messages
        .iter()
        .enumerate()
        .skip(start_idx + 1)
        .filter(|(_, msg)| msg.meta_str("sentinel_id") == Some(sentinel_id.as_str()))
        .collect();

    let mut checks: BTreeMap<u64, SentinelCheck> = BTreeMap::new();
    for (idx, msg) in &related {
        let Some(check_number) = msg.meta_u64("check_number").filter(|n| *n > 0) else {
            continue;
        };
        let check = checks.entry(check_number).or_insert_with(|| SentinelCheck {
            check_number,
            ..SentinelCheck::default()
        });
        match msg.meta_type() {
            Some("sentinel_check") | Some("sentinel_sleeping") => {
                check.reason = msg.meta_str("reason").map(String::from);
                check.next_check_in = msg
                    .meta_u64("next_check_in")
                    .or_else(|| msg.meta_u64("sleep_duration"));
            }
            Some("sentinel_status") | Some("sentinel_complete") | Some("sentinel_start") => {}
            _ => check.message_indices.push(*idx),
        }
    }

    let latest_status = related.iter().rev().find(|(_, msg)| {
        matches!(
            msg.meta_type(),
            Some("sentinel_status") | Some("sentinel_sleeping") | Some("sentinel_complete")
        )
    });

    let (status, total_checks, runtime_seconds) = match latest_status {
        Some((_, msg)) => {
            let total = msg.meta_u64("total_checks").unwrap_or(0);
            let runtime = msg.meta_u64("runtime").unwrap_or(0);
            let status = match msg.meta_type() {
                Some("sentinel_complete") => SentinelStatus::Complete,
                Some("sentinel_sleeping") => SentinelStatus::Sleeping {
                    sleep_started: msg
                        .meta_str("sleep_start_timestamp")
                        .and_then(parse_timestamp),
                    sleep_duration_seconds: msg.meta_u64("sleep_duration").unwrap_or(0),
                },
                _ => SentinelStatus::Checking,
            };
            (status, total, runtime)
        }
        None => {
            // Nothing reported back yet: the first check is underway.
            checks.entry(1).or_insert_with(|| SentinelCheck {
                check_number: 1,
                reason: Some("Actively checking...".to_string()),
                ..SentinelCheck::default()
            });
            (SentinelStatus::Checking, 0, 0)
        }
    };

    SentinelStep {
        sentinel_id,
        title,
        condition,
        sleep_duration_seconds,
        checks: checks.into_values().collect(),
        status,
        total_checks,
        runtime_seconds,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn plural_s(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
