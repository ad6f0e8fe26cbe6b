use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// One phase in the fixed production sequence. The set is closed and the
/// order is total: `Requirements < Design < Plan < Build < Test`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Requirements,
    Design,
    Plan,
    Build,
    Test,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Requirements,
        Stage::Design,
        Stage::Plan,
        Stage::Build,
        Stage::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "Requirements",
            Self::Design => "Design",
            Self::Plan => "Plan",
            Self::Build => "Build",
            Self::Test => "Test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Requirements" => Some(Self::Requirements),
            "Design" => Some(Self::Design),
            "Plan" => Some(Self::Plan),
            "Build" => Some(Self::Build),
            "Test" => Some(Self::Test),
            _ => None,
        }
    }

    /// Position in the fixed sequence, 0-based.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The stage after this one, if any.
    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    /// True iff `self` comes strictly before `other`.
    pub fn precedes(&self, other: Stage) -> bool {
        self.index() < other.index()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownStage(s.to_string()))
    }
}
