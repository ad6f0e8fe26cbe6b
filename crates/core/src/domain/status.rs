use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::stage::Stage;

/// Externally visible run state. Exactly one of these is reported by
/// the status query at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    WaitingForApproval {
        stage: Stage,
    },
    Running {
        stage: Stage,
    },
    Completed {
        stage: Stage,
    },
    Error {
        message: String,
    },
}

impl RunStatus {
    /// True while a run loop is live (running or parked on a gate).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Running { .. } | Self::WaitingForApproval { .. }
        )
    }
}
