//! Event types for the stagegate run-event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagegate_core::Stage;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: RunEvent,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: RunEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All events published while a run progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run began executing rounds
    #[serde(rename = "run.started")]
    RunStarted {
        project: String,
        start: Stage,
        end: Stage,
    },

    /// The stage cursor moved
    #[serde(rename = "run.stage_changed")]
    StageChanged { project: String, stage: Stage },

    /// The run loop exited cleanly
    #[serde(rename = "run.completed")]
    RunCompleted { project: String, stage: Stage },

    /// The run loop exited with a terminal error
    #[serde(rename = "run.failed")]
    RunFailed { project: String, message: String },

    /// An approval gate is parked waiting for an external verdict
    #[serde(rename = "approval.requested")]
    ApprovalRequested {
        project: String,
        stage: Stage,
        prompt: String,
    },

    /// A verdict was delivered to a waiting gate
    #[serde(rename = "approval.resolved")]
    ApprovalResolved {
        project: String,
        stage: Stage,
        approved: bool,
    },

    /// A run log line for the streaming surface
    #[serde(rename = "log")]
    Log { project: String, line: String },
}

impl RunEvent {
    /// SSE event name for this variant
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run.started",
            RunEvent::StageChanged { .. } => "run.stage_changed",
            RunEvent::RunCompleted { .. } => "run.completed",
            RunEvent::RunFailed { .. } => "run.failed",
            RunEvent::ApprovalRequested { .. } => "approval.requested",
            RunEvent::ApprovalResolved { .. } => "approval.resolved",
            RunEvent::Log { .. } => "log",
        }
    }

    /// The project this event belongs to
    pub fn project(&self) -> &str {
        match self {
            RunEvent::RunStarted { project, .. }
            | RunEvent::StageChanged { project, .. }
            | RunEvent::RunCompleted { project, .. }
            | RunEvent::RunFailed { project, .. }
            | RunEvent::ApprovalRequested { project, .. }
            | RunEvent::ApprovalResolved { project, .. }
            | RunEvent::Log { project, .. } => project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_creation() {
        let event = RunEvent::StageChanged {
            project: "demo".to_string(),
            stage: Stage::Design,
        };
        let envelope = EventEnvelope::new(event);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::ApprovalRequested {
            project: "demo".to_string(),
            stage: Stage::Requirements,
            prompt: "Do you approve the Requirements deliverable? (yes/no)".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("approval.requested"));
        assert!(json.contains("requirements"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"run.completed","project":"demo","stage":"plan"}"#;
        let event: RunEvent = serde_json::from_str(json).unwrap();

        match event {
            RunEvent::RunCompleted { project, stage } => {
                assert_eq!(project, "demo");
                assert_eq!(stage, Stage::Plan);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_project_accessor() {
        let event = RunEvent::Log {
            project: "demo".to_string(),
            line: "Entering round 1".to_string(),
        };
        assert_eq!(event.project(), "demo");
        assert_eq!(event.kind(), "log");
    }
}
