//! Static wiring tables: which participants serve which target stage,
//! what each one watches and produces, and how approvals map to stage
//! advancement. All lookups are by enum value; `validate_tables` checks
//! the tables against each other at startup.

use crate::{CapabilityKind, CoreError, Profile, Stage};

/// Roster membership for a given target stage. A pure function: running
/// toward Build adds the Builder, toward Test also the Tester; the
/// gated document stages always share the same crew.
pub fn stage_roster(target: Stage) -> &'static [Profile] {
    const DOCUMENT_CREW: [Profile; 7] = [
        Profile::RequirementsAuthor,
        Profile::DesignAuthor,
        Profile::PlanAuthor,
        Profile::RequirementsApprover,
        Profile::DesignApprover,
        Profile::PlanApprover,
        Profile::Governance,
    ];
    const BUILD_CREW: [Profile; 8] = [
        Profile::RequirementsAuthor,
        Profile::DesignAuthor,
        Profile::PlanAuthor,
        Profile::RequirementsApprover,
        Profile::DesignApprover,
        Profile::PlanApprover,
        Profile::Governance,
        Profile::Builder,
    ];
    const TEST_CREW: [Profile; 9] = [
        Profile::RequirementsAuthor,
        Profile::DesignAuthor,
        Profile::PlanAuthor,
        Profile::RequirementsApprover,
        Profile::DesignApprover,
        Profile::PlanApprover,
        Profile::Governance,
        Profile::Builder,
        Profile::Tester,
    ];

    match target {
        Stage::Requirements | Stage::Design | Stage::Plan => &DOCUMENT_CREW,
        Stage::Build => &BUILD_CREW,
        Stage::Test => &TEST_CREW,
    }
}

/// The capability kinds a participant reacts to. An acceptance gate
/// never watches its own capability.
pub fn watchlist(profile: Profile) -> &'static [CapabilityKind] {
    match profile {
        Profile::RequirementsAuthor => &[CapabilityKind::Seed],
        Profile::DesignAuthor => &[CapabilityKind::ApproveRequirements],
        Profile::PlanAuthor => &[CapabilityKind::ApproveDesign],
        Profile::Builder => &[CapabilityKind::ApprovePlan],
        Profile::Tester => &[CapabilityKind::ProduceCode],
        Profile::RequirementsApprover => &[
            CapabilityKind::ProduceRequirements,
            CapabilityKind::Directive,
        ],
        Profile::DesignApprover => &[CapabilityKind::ProduceDesign, CapabilityKind::Directive],
        Profile::PlanApprover => &[CapabilityKind::ProducePlan, CapabilityKind::Directive],
        Profile::Governance => &[
            CapabilityKind::ApproveRequirements,
            CapabilityKind::ApproveDesign,
            CapabilityKind::ApprovePlan,
            CapabilityKind::ProduceCode,
        ],
        Profile::Operator => &[],
    }
}

/// The single capability a participant's reaction produces.
pub fn repertoire(profile: Profile) -> Option<CapabilityKind> {
    match profile {
        Profile::RequirementsAuthor => Some(CapabilityKind::ProduceRequirements),
        Profile::DesignAuthor => Some(CapabilityKind::ProduceDesign),
        Profile::PlanAuthor => Some(CapabilityKind::ProducePlan),
        Profile::Builder => Some(CapabilityKind::ProduceCode),
        Profile::Tester => Some(CapabilityKind::ProduceTests),
        Profile::RequirementsApprover => Some(CapabilityKind::ApproveRequirements),
        Profile::DesignApprover => Some(CapabilityKind::ApproveDesign),
        Profile::PlanApprover => Some(CapabilityKind::ApprovePlan),
        Profile::Governance => Some(CapabilityKind::AdvanceStage),
        Profile::Operator => None,
    }
}

/// The stage an event of this kind unlocks once published: a granted
/// approval opens the next document stage, produced code opens Test.
/// Test itself unlocks nothing; the run ends there.
pub fn advance_target(kind: CapabilityKind) -> Option<Stage> {
    match kind {
        CapabilityKind::ApproveRequirements => Some(Stage::Design),
        CapabilityKind::ApproveDesign => Some(Stage::Plan),
        CapabilityKind::ApprovePlan => Some(Stage::Build),
        CapabilityKind::ProduceCode => Some(Stage::Test),
        _ => None,
    }
}

/// The participant whose approval gates a stage, if it is gated.
pub fn approver_for(stage: Stage) -> Option<Profile> {
    match stage {
        Stage::Requirements => Some(Profile::RequirementsApprover),
        Stage::Design => Some(Profile::DesignApprover),
        Stage::Plan => Some(Profile::PlanApprover),
        Stage::Build | Stage::Test => None,
    }
}

/// The stage an approver's gate belongs to, if the profile is a gate.
pub fn gated_stage(profile: Profile) -> Option<Stage> {
    match profile {
        Profile::RequirementsApprover => Some(Stage::Requirements),
        Profile::DesignApprover => Some(Stage::Design),
        Profile::PlanApprover => Some(Stage::Plan),
        _ => None,
    }
}

/// Capability kinds relevant when resuming at `stage`: everything
/// produced and approved up to and including that stage, plus the
/// advance signals that moved the cursor there. Cumulative over the
/// order; directives are never replayed, they are synthesized fresh.
pub fn replay_kinds(stage: Stage) -> Vec<CapabilityKind> {
    let mut kinds = vec![CapabilityKind::Seed, CapabilityKind::AdvanceStage];
    for reached in Stage::ALL.iter().take_while(|s| s.index() <= stage.index()) {
        match reached {
            Stage::Requirements => kinds.extend([
                CapabilityKind::ProduceRequirements,
                CapabilityKind::ApproveRequirements,
            ]),
            Stage::Design => kinds.extend([
                CapabilityKind::ProduceDesign,
                CapabilityKind::ApproveDesign,
            ]),
            Stage::Plan => {
                kinds.extend([CapabilityKind::ProducePlan, CapabilityKind::ApprovePlan])
            }
            Stage::Build => kinds.push(CapabilityKind::ProduceCode),
            Stage::Test => kinds.push(CapabilityKind::ProduceTests),
        }
    }
    kinds
}

/// Cross-checks the tables. Called once at orchestrator construction;
/// a failure here is a programming error in the tables, not a runtime
/// condition.
pub fn validate_tables() -> Result<(), CoreError> {
    for target in Stage::ALL {
        for profile in stage_roster(target) {
            let Some(produced) = repertoire(*profile) else {
                return Err(CoreError::InvalidTables(format!(
                    "{profile} is rostered for {target} but has no repertoire"
                )));
            };
            if watchlist(*profile).is_empty() {
                return Err(CoreError::InvalidTables(format!(
                    "{profile} is rostered for {target} but watches nothing"
                )));
            }
            // Acceptance gates must not observe their own output.
            if watchlist(*profile).contains(&produced) {
                return Err(CoreError::InvalidTables(format!(
                    "{profile} watches its own capability {produced}"
                )));
            }
        }
        if let Some(approver) = approver_for(target) {
            if !stage_roster(target).contains(&approver) {
                return Err(CoreError::InvalidTables(format!(
                    "approver {approver} for {target} is missing from its roster"
                )));
            }
        }
    }

    // Every capability that advances the cursor must be observed by
    // Governance, or the signal would never be emitted.
    for kind in [
        CapabilityKind::ApproveRequirements,
        CapabilityKind::ApproveDesign,
        CapabilityKind::ApprovePlan,
        CapabilityKind::ProduceCode,
    ] {
        if advance_target(kind).is_some() && !watchlist(Profile::Governance).contains(&kind) {
            return Err(CoreError::InvalidTables(format!(
                "advance source {kind} is not in the Governance watch-list"
            )));
        }
    }

    Ok(())
}
