//! Roster construction: turns the static wiring tables into live
//! participants sharing one responder, one artifact source, and one
//! cost ledger.

use std::sync::Arc;

use stagegate_core::tables::{repertoire, stage_roster};
use stagegate_core::{CapabilityKind, Profile, Stage};
use tracing::debug;

use crate::approval::ApprovalResponder;
use crate::budget::CostLedger;
use crate::participant::{Participant, Reaction};
use crate::reactions::{AdvanceReaction, ApprovalReaction, ArtifactSource, ProducerReaction};

pub struct ParticipantFactory {
    responder: Arc<dyn ApprovalResponder>,
    source: Arc<dyn ArtifactSource>,
    ledger: CostLedger,
}

impl ParticipantFactory {
    pub fn new(
        responder: Arc<dyn ApprovalResponder>,
        source: Arc<dyn ArtifactSource>,
        ledger: CostLedger,
    ) -> Self {
        Self {
            responder,
            source,
            ledger,
        }
    }

    pub fn ledger(&self) -> CostLedger {
        self.ledger.clone()
    }

    /// One participant for `profile`, or `None` when the profile has no
    /// repertoire (the operator never reacts).
    pub fn build(&self, profile: Profile) -> Option<Participant> {
        let capability = repertoire(profile)?;
        let reaction: Box<dyn Reaction> = match capability {
            kind if kind.is_approval() => Box::new(ApprovalReaction::new(
                kind,
                Arc::clone(&self.responder),
            )),
            CapabilityKind::AdvanceStage => Box::new(AdvanceReaction),
            kind => Box::new(ProducerReaction::new(kind, Arc::clone(&self.source))),
        };
        Some(Participant::new(profile, reaction, self.ledger.clone()))
    }

    /// The full active roster for a run toward `target`, in table order.
    pub fn roster_for(&self, target: Stage) -> Vec<Participant> {
        let roster: Vec<Participant> = stage_roster(target)
            .iter()
            .filter_map(|profile| self.build(*profile))
            .collect();
        debug!(target = %target, size = roster.len(), "roster activated");
        roster
    }
}
