//! The built-in reactions: producers, acceptance gates, and the
//! governance advance signal.

use std::sync::Arc;

use async_trait::async_trait;
use stagegate_core::tables::advance_target;
use stagegate_core::{CapabilityKind, DecodedArtifact, Message, Payload, Stage};
use tracing::{info, warn};

use crate::approval::ApprovalResponder;
use crate::error::{OrchestratorError, Result};
use crate::participant::{Reaction, ReactionContext};

/// Where produced artifact content comes from. The orchestrator only
/// routes content; generation is behind this seam.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Produce the payload for `stage`, charging any cost incurred to
    /// `ctx.ledger`.
    async fn produce(&self, stage: Stage, ctx: &ReactionContext) -> Result<Payload>;
}

/// Deterministic built-in source: a skeletal structured artifact
/// derived from the most recent news item, at a flat unit cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateSource;

impl TemplateSource {
    pub const UNIT_COST: f64 = 1.0;
}

#[async_trait]
impl ArtifactSource for TemplateSource {
    async fn produce(&self, stage: Stage, ctx: &ReactionContext) -> Result<Payload> {
        let basis = ctx
            .news
            .last()
            .and_then(|m| match &m.payload {
                Payload::Text { content } => Some(content.clone()),
                Payload::Artifact { artifact } => Some(artifact.name.clone()),
            })
            .unwrap_or_default();
        ctx.ledger.add(Self::UNIT_COST);

        let artifact = DecodedArtifact::new(format!("{}_draft", stage.as_str().to_lowercase()))
            .with_field("Basis", basis)
            .with_field("Stage", stage.as_str());
        Ok(Payload::Artifact { artifact })
    }
}

/// Emits one produced artifact per batch of news.
pub struct ProducerReaction {
    capability: CapabilityKind,
    source: Arc<dyn ArtifactSource>,
}

impl ProducerReaction {
    pub fn new(capability: CapabilityKind, source: Arc<dyn ArtifactSource>) -> Self {
        Self { capability, source }
    }
}

#[async_trait]
impl Reaction for ProducerReaction {
    async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
        let Some(stage) = self.capability.produces_for() else {
            return Err(OrchestratorError::ParticipantFailed {
                profile: ctx.profile,
                reason: format!("{} produces no artifact", self.capability),
            });
        };
        let payload = self.source.produce(stage, ctx).await?;
        info!(profile = %ctx.profile, stage = %stage, "artifact produced");
        Ok(Some(Message::new(self.capability, ctx.profile, payload)))
    }
}

/// An acceptance gate. Asks the responder unless the pre-approval latch
/// is set; a rejection is fatal for the run.
pub struct ApprovalReaction {
    capability: CapabilityKind,
    responder: Arc<dyn ApprovalResponder>,
}

impl ApprovalReaction {
    pub fn new(capability: CapabilityKind, responder: Arc<dyn ApprovalResponder>) -> Self {
        Self { capability, responder }
    }

    fn gated(&self) -> Stage {
        match self.capability {
            CapabilityKind::ApproveRequirements => Stage::Requirements,
            CapabilityKind::ApproveDesign => Stage::Design,
            CapabilityKind::ApprovePlan => Stage::Plan,
            // Construction is table-driven; only approval kinds reach here.
            _ => Stage::default(),
        }
    }
}

#[async_trait]
impl Reaction for ApprovalReaction {
    async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
        let stage = self.gated();
        let approved = if ctx.auto_approved {
            info!(profile = %ctx.profile, stage = %stage, "pre-approved, gate skipped");
            true
        } else {
            let prompt = format!("Do you approve the {stage} deliverable? (yes/no)");
            self.responder.verdict(stage, &prompt).await?
        };

        if !approved {
            warn!(profile = %ctx.profile, stage = %stage, "deliverable rejected");
            return Err(OrchestratorError::ApprovalRejected {
                approver: ctx.profile,
            });
        }
        Ok(Some(Message::new(
            self.capability,
            ctx.profile,
            Payload::text(format!("{stage} approved")),
        )))
    }
}

/// Governance: turns granted approvals into an advance signal naming
/// the furthest stage any of them unlocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdvanceReaction;

#[async_trait]
impl Reaction for AdvanceReaction {
    async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
        let target = ctx
            .news
            .iter()
            .filter_map(|m| advance_target(m.capability))
            .max();
        match target {
            Some(target) => {
                info!(stage = %target, "advance signal emitted");
                Ok(Some(Message::advance(ctx.profile, target)))
            }
            None => Ok(None),
        }
    }
}
