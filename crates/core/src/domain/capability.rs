use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::stage::Stage;

/// Tag identifying what class of message a producer emits or a watcher
/// reacts to. Closed enumeration; dispatch is by value, never by type
/// identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Initial requirement seeded by the orchestrator (the product idea).
    Seed,
    ProduceRequirements,
    ProduceDesign,
    ProducePlan,
    ProduceCode,
    ProduceTests,
    ApproveRequirements,
    ApproveDesign,
    ApprovePlan,
    /// Signal naming a target stage strictly ahead of the current one.
    AdvanceStage,
    /// Management directive marking a stage as externally pre-approved.
    Directive,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::ProduceRequirements => "produce_requirements",
            Self::ProduceDesign => "produce_design",
            Self::ProducePlan => "produce_plan",
            Self::ProduceCode => "produce_code",
            Self::ProduceTests => "produce_tests",
            Self::ApproveRequirements => "approve_requirements",
            Self::ApproveDesign => "approve_design",
            Self::ApprovePlan => "approve_plan",
            Self::AdvanceStage => "advance_stage",
            Self::Directive => "directive",
        }
    }

    /// True for the approval-gate capabilities.
    pub fn is_approval(&self) -> bool {
        matches!(
            self,
            Self::ApproveRequirements | Self::ApproveDesign | Self::ApprovePlan
        )
    }

    /// The stage whose content this capability produces, if any.
    pub fn produces_for(&self) -> Option<Stage> {
        match self {
            Self::ProduceRequirements => Some(Stage::Requirements),
            Self::ProduceDesign => Some(Stage::Design),
            Self::ProducePlan => Some(Stage::Plan),
            Self::ProduceCode => Some(Stage::Build),
            Self::ProduceTests => Some(Stage::Test),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
