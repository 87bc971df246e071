//! Chat-transcript interpretation: structured message classification, plan
//! payloads, and sentinel-step reconstruction from a flat message stream.

pub mod classify;
pub mod format;
pub mod plan;
pub mod sentinel;

pub use classify::{classify, MessageKind};
pub use format::format_duration;
pub use plan::{PlanCondition, PlanContent, PlanStep};
pub use sentinel::{
    collect_sentinel_steps, seconds_remaining, SentinelCheck, SentinelStatus, SentinelStep,
};
