use std::path::PathBuf;

use stagegate_core::{CoreError, Profile, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Insufficient funds: spent {spent:.2} against a ceiling of {ceiling:.2}")]
    BudgetExceeded { spent: f64, ceiling: f64 },

    #[error("Approval rejected by {approver}")]
    ApprovalRejected { approver: Profile },

    #[error("No progress after {rounds} consecutive idle rounds")]
    NoProgress { rounds: u32 },

    #[error("No product configuration found at {0}")]
    ConfigurationMissing(PathBuf),

    #[error("Project already exists: {0}")]
    ProjectExists(String),

    #[error("No content available for stage {stage}")]
    ContentUnavailable { stage: Stage },

    #[error("No deliverable defined for stage {stage}")]
    DeliverableUnmapped { stage: Stage },

    #[error("Approval channel closed before a verdict was delivered")]
    ApprovalChannelClosed,

    #[error("No approval is pending")]
    NoPendingApproval,

    #[error("Approval pending for {pending}, not {requested}")]
    UnexpectedApprovalStage { pending: Stage, requested: Stage },

    #[error("Participant {profile} failed: {reason}")]
    ParticipantFailed { profile: Profile, reason: String },

    #[error("Wiring tables: {0}")]
    Tables(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// How far past the ceiling the spend went, for budget breaches.
    pub fn overage(&self) -> Option<f64> {
        match self {
            Self::BudgetExceeded { spent, ceiling } => Some(spent - ceiling),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
