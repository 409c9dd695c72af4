//! Telemetry event model.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle phase an event describes. Closed set.
///
/// Serialized under the same dotted name [`EventType::as_str`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "session.started")]
    SessionStarted,
    #[serde(rename = "session.ended")]
    SessionEnded,

    #[serde(rename = "plan.created")]
    PlanCreated,
    #[serde(rename = "plan.started")]
    PlanStarted,
    #[serde(rename = "plan.completed")]
    PlanCompleted,
    #[serde(rename = "plan.failed")]
    PlanFailed,

    #[serde(rename = "task.started")]
    TaskStarted,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.failed")]
    TaskFailed,
    #[serde(rename = "task.retried")]
    TaskRetried,

    #[serde(rename = "tool.started")]
    ToolExecutionStarted,
    #[serde(rename = "tool.completed")]
    ToolExecutionCompleted,
    #[serde(rename = "tool.failed")]
    ToolExecutionFailed,

    #[serde(rename = "model_stream.started")]
    ModelStreamStarted,
    #[serde(rename = "model_stream.chunk")]
    ModelStreamChunk,
    #[serde(rename = "model_stream.completed")]
    ModelStreamCompleted,
    #[serde(rename = "model_stream.failed")]
    ModelStreamFailed,

    #[serde(rename = "circuit_breaker.opened")]
    CircuitBreakerOpened,
    #[serde(rename = "circuit_breaker.half_open")]
    CircuitBreakerHalfOpen,
    #[serde(rename = "circuit_breaker.closed")]
    CircuitBreakerClosed,

    #[serde(rename = "experiment.started")]
    ExperimentStarted,
    #[serde(rename = "experiment.completed")]
    ExperimentCompleted,

    #[serde(rename = "metrics.exported")]
    MetricsExported,
}

impl EventType {
    /// Dotted wire name, e.g. `task.started`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStarted => "session.started",
            EventType::SessionEnded => "session.ended",
            EventType::PlanCreated => "plan.created",
            EventType::PlanStarted => "plan.started",
            EventType::PlanCompleted => "plan.completed",
            EventType::PlanFailed => "plan.failed",
            EventType::TaskStarted => "task.started",
            EventType::TaskCompleted => "task.completed",
            EventType::TaskFailed => "task.failed",
            EventType::TaskRetried => "task.retried",
            EventType::ToolExecutionStarted => "tool.started",
            EventType::ToolExecutionCompleted => "tool.completed",
            EventType::ToolExecutionFailed => "tool.failed",
            EventType::ModelStreamStarted => "model_stream.started",
            EventType::ModelStreamChunk => "model_stream.chunk",
            EventType::ModelStreamCompleted => "model_stream.completed",
            EventType::ModelStreamFailed => "model_stream.failed",
            EventType::CircuitBreakerOpened => "circuit_breaker.opened",
            EventType::CircuitBreakerHalfOpen => "circuit_breaker.half_open",
            EventType::CircuitBreakerClosed => "circuit_breaker.closed",
            EventType::ExperimentStarted => "experiment.started",
            EventType::ExperimentCompleted => "experiment.completed",
            EventType::MetricsExported => "metrics.exported",
        }
    }

    /// True for the failure variants.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventType::PlanFailed
                | EventType::TaskFailed
                | EventType::ToolExecutionFailed
                | EventType::ModelStreamFailed
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured lifecycle event.
///
/// A timestamp of `UNIX_EPOCH` means "unset"; the hub stamps it on publish.
/// Subscribers receive events behind an `Arc` and cannot mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Event {
    /// New unstamped event.
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp: UNIX_EPOCH,
            session_id: None,
            plan_id: None,
            task_id: None,
            data: BTreeMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_stamped(&self) -> bool {
        self.timestamp != UNIX_EPOCH
    }

    pub(crate) fn stamp_if_unset(&mut self) {
        if !self.is_stamped() {
            self.timestamp = SystemTime::now();
        }
    }
}
