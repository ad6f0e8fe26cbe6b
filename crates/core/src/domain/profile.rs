use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of a participant in the production pipeline. Closed set,
/// known at compile time; roster membership is looked up by value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    RequirementsAuthor,
    DesignAuthor,
    PlanAuthor,
    Builder,
    Tester,
    RequirementsApprover,
    DesignApprover,
    PlanApprover,
    Governance,
    /// The orchestrator itself, for seeded and synthesized messages.
    Operator,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequirementsAuthor => "Requirements Author",
            Self::DesignAuthor => "Design Author",
            Self::PlanAuthor => "Plan Author",
            Self::Builder => "Builder",
            Self::Tester => "Tester",
            Self::RequirementsApprover => "Requirements Approver",
            Self::DesignApprover => "Design Approver",
            Self::PlanApprover => "Plan Approver",
            Self::Governance => "Governance",
            Self::Operator => "Operator",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
