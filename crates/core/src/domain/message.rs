use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::capability::CapabilityKind;
use crate::domain::profile::Profile;
use crate::domain::stage::Stage;

/// Prefix of the management directive payload that marks a stage as
/// externally pre-approved. The full payload is
/// `"AUTO-APPROVE <stage name>"`.
pub const PRE_APPROVED_MARKER: &str = "AUTO-APPROVE";

/// Artifact field naming the target of an advance signal.
const ADVANCE_FIELD: &str = "Advance Stage";

/// A structured, decoded artifact: a named document with ordered,
/// named text fields. What the fields mean is up to the producing
/// capability; the orchestrator never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DecodedArtifact {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl DecodedArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Message payload: free text or a decoded artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text { content: String },
    Artifact { artifact: DecodedArtifact },
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            Self::Artifact { .. } => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&DecodedArtifact> {
        match self {
            Self::Artifact { artifact } => Some(artifact),
            Self::Text { .. } => None,
        }
    }
}

/// An immutable record of one produced artifact or signal, tagged with
/// its producing capability. Never mutated after publication; ordering
/// within a scope is the order of publication.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub capability: CapabilityKind,
    pub sender: Profile,
    /// Destination; `None` means broadcast.
    pub send_to: Option<Profile>,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(capability: CapabilityKind, sender: Profile, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            capability,
            sender,
            send_to: None,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn to(mut self, recipient: Profile) -> Self {
        self.send_to = Some(recipient);
        self
    }

    /// The seed message carrying the product idea.
    pub fn seed(idea: impl Into<String>) -> Self {
        Self::new(CapabilityKind::Seed, Profile::Operator, Payload::text(idea))
    }

    /// An advance signal naming a target stage.
    pub fn advance(sender: Profile, target: Stage) -> Self {
        let artifact =
            DecodedArtifact::new("stage_advance").with_field(ADVANCE_FIELD, target.as_str());
        Self::new(
            CapabilityKind::AdvanceStage,
            sender,
            Payload::Artifact { artifact },
        )
    }

    /// A synthetic directive marking `stage` as already approved, so a
    /// replayed approver treats the gate as satisfied.
    pub fn pre_approved(stage: Stage) -> Self {
        Self::new(
            CapabilityKind::Directive,
            Profile::Operator,
            Payload::text(format!("{} {}", PRE_APPROVED_MARKER, stage.as_str())),
        )
    }

    /// The stage named by this message, if it is an advance signal.
    pub fn advance_target(&self) -> Option<Stage> {
        if self.capability != CapabilityKind::AdvanceStage {
            return None;
        }
        match &self.payload {
            Payload::Artifact { artifact } => artifact.field(ADVANCE_FIELD).and_then(Stage::parse),
            Payload::Text { content } => Stage::parse(content.trim()),
        }
    }

    /// The stage this directive pre-approves, if it is one.
    pub fn pre_approved_stage(&self) -> Option<Stage> {
        if self.capability != CapabilityKind::Directive {
            return None;
        }
        let content = self.payload.as_text()?;
        let rest = content.strip_prefix(PRE_APPROVED_MARKER)?;
        Stage::parse(rest.trim())
    }
}
