//! End-to-end run loop behavior: gating, resume, the fuse, the budget,
//! and round atomicity.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use events::{EventBus, RunEvent};
use orchestrator::{
    ApprovalResponder, ArtifactSource, AutoApprover, OrchestratorError, ProjectStore,
    ReactionContext, Result, Team, TemplateSource,
};
use stagegate_core::{CapabilityKind, Message, Payload, Profile, Stage};

/// Grants everything, recording which stages were actually asked.
#[derive(Default)]
struct CountingResponder {
    asked: Mutex<Vec<Stage>>,
}

impl CountingResponder {
    fn asked(&self) -> Vec<Stage> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalResponder for CountingResponder {
    async fn verdict(&self, stage: Stage, _prompt: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(stage);
        Ok(true)
    }
}

/// Rejects one stage, grants the rest.
struct RejectStage(Stage);

#[async_trait]
impl ApprovalResponder for RejectStage {
    async fn verdict(&self, stage: Stage, _prompt: &str) -> Result<bool> {
        Ok(stage != self.0)
    }
}

/// Fails production for one stage, delegating the rest.
struct FlakySource(Stage);

#[async_trait]
impl ArtifactSource for FlakySource {
    async fn produce(&self, stage: Stage, ctx: &ReactionContext) -> Result<Payload> {
        if stage == self.0 {
            return Err(OrchestratorError::ParticipantFailed {
                profile: ctx.profile,
                reason: "generation failed".into(),
            });
        }
        TemplateSource.produce(stage, ctx).await
    }
}

async fn team_with(
    store: &ProjectStore,
    responder: Arc<dyn ApprovalResponder>,
    source: Arc<dyn ArtifactSource>,
    bus: EventBus,
) -> Team {
    Team::new("demo", store.clone(), responder, source, bus)
        .await
        .unwrap()
}

fn drain_stage_changes(rx: &mut tokio::sync::broadcast::Receiver<events::EventEnvelope>) -> Vec<Stage> {
    let mut stages = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if let RunEvent::StageChanged { stage, .. } = envelope.event {
            stages.push(stage);
        }
    }
    stages
}

#[tokio::test]
async fn test_full_run_through_the_document_stages() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "a dice-rolling cli").await.unwrap();

    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let mut team = team_with(
        &store,
        Arc::new(AutoApprover),
        Arc::new(TemplateSource),
        bus,
    )
    .await;

    let reached = team.run(Stage::Requirements, Stage::Plan).await.unwrap();
    assert_eq!(reached, Stage::Plan);
    assert_eq!(drain_stage_changes(&mut rx), [Stage::Design, Stage::Plan]);

    // Both completed document stages left a deliverable behind.
    let dir = store.project_dir("demo");
    assert!(dir.join("prd.md").exists());
    assert!(dir.join("system_design.md").exists());

    let history = orchestrator::history::load_history(&dir)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history[0].capability, CapabilityKind::Seed);
    assert!(history
        .iter()
        .any(|m| m.capability == CapabilityKind::ApproveRequirements));

    let config = store.load("demo").await.unwrap();
    assert_eq!(config.stage, Stage::Plan);
}

#[tokio::test]
async fn test_run_to_the_final_stage_completes() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "a url shortener").await.unwrap();

    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let mut team = team_with(
        &store,
        Arc::new(AutoApprover),
        Arc::new(TemplateSource),
        bus,
    )
    .await;

    // The full pipeline must come to rest at Test, not trip the
    // no-progress fuse after the build work is done.
    let reached = team.run(Stage::Requirements, Stage::Test).await.unwrap();
    assert_eq!(reached, Stage::Test);
    assert_eq!(
        drain_stage_changes(&mut rx),
        [Stage::Design, Stage::Plan, Stage::Build, Stage::Test]
    );

    let dir = store.project_dir("demo");
    let history = orchestrator::history::load_history(&dir)
        .await
        .unwrap()
        .unwrap();
    assert!(history
        .iter()
        .any(|m| m.capability == CapabilityKind::ProduceCode));
    assert!(history
        .iter()
        .any(|m| m.capability == CapabilityKind::ProduceTests));
    assert_eq!(store.load("demo").await.unwrap().stage, Stage::Test);
}

#[tokio::test]
async fn test_resume_asks_only_the_resume_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "a todo app").await.unwrap();

    let first = Arc::new(CountingResponder::default());
    let mut team = team_with(
        &store,
        first.clone(),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    team.run(Stage::Requirements, Stage::Design).await.unwrap();
    assert_eq!(first.asked(), [Stage::Requirements]);

    // A fresh team resumes from the saved history; the already-granted
    // Requirements gate is never asked again.
    let second = Arc::new(CountingResponder::default());
    let mut team = team_with(
        &store,
        second.clone(),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    let reached = team.run(Stage::Design, Stage::Plan).await.unwrap();
    assert_eq!(reached, Stage::Plan);
    assert_eq!(second.asked(), [Stage::Design]);
}

#[tokio::test]
async fn test_no_progress_fuse_trips_after_three_idle_rounds() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "stalled").await.unwrap();

    // A history whose only message names a stage past the resume point
    // is dropped entirely by the replay filter, so no round yields
    // anything.
    let dir = store.project_dir("demo");
    orchestrator::history::save_history(
        &dir,
        &[Message::advance(Profile::Governance, Stage::Design)],
    )
    .await
    .unwrap();

    let mut team = team_with(
        &store,
        Arc::new(AutoApprover),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    let err = team.run(Stage::Requirements, Stage::Plan).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoProgress { rounds: 3 }));
}

#[tokio::test]
async fn test_budget_breach_aborts_before_persisting() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "expensive").await.unwrap();

    let mut team = team_with(
        &store,
        Arc::new(AutoApprover),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    team.invest(0.0);

    let err = team.run(Stage::Requirements, Stage::Plan).await.unwrap_err();
    assert_eq!(err.overage(), Some(TemplateSource::UNIT_COST));

    // Nothing was persisted for a run that blew its budget.
    let dir = store.project_dir("demo");
    assert!(orchestrator::history::load_history(&dir)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rejection_is_terminal_but_history_survives() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "rejected").await.unwrap();

    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let mut team = team_with(
        &store,
        Arc::new(RejectStage(Stage::Requirements)),
        Arc::new(TemplateSource),
        bus,
    )
    .await;

    let err = team.run(Stage::Requirements, Stage::Plan).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::ApprovalRejected {
            approver: Profile::RequirementsApprover
        }
    ));

    // The produced artifact is still on record for the next attempt.
    let dir = store.project_dir("demo");
    let history = orchestrator::history::load_history(&dir)
        .await
        .unwrap()
        .unwrap();
    assert!(history
        .iter()
        .any(|m| m.capability == CapabilityKind::ProduceRequirements));

    let mut failed = false;
    while let Ok(envelope) = rx.try_recv() {
        if matches!(envelope.event, RunEvent::RunFailed { .. }) {
            failed = true;
        }
    }
    assert!(failed);
}

#[tokio::test]
async fn test_retry_after_rejection_asks_the_gate_again() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "second chance").await.unwrap();

    let mut team = team_with(
        &store,
        Arc::new(RejectStage(Stage::Requirements)),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    team.run(Stage::Requirements, Stage::Design)
        .await
        .unwrap_err();

    // A new run from the same stage regenerates the artifact and puts
    // the question to the gate again.
    let responder = Arc::new(CountingResponder::default());
    let mut team = team_with(
        &store,
        responder.clone(),
        Arc::new(TemplateSource),
        EventBus::new(),
    )
    .await;
    let reached = team
        .run(Stage::Requirements, Stage::Design)
        .await
        .unwrap();
    assert_eq!(reached, Stage::Design);
    assert_eq!(responder.asked(), [Stage::Requirements]);
}

#[tokio::test]
async fn test_failed_round_merges_output_but_never_advances() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(tmp.path());
    store.create("demo", "flaky").await.unwrap();

    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let mut team = team_with(
        &store,
        Arc::new(AutoApprover),
        Arc::new(FlakySource(Stage::Design)),
        bus,
    )
    .await;

    let err = team.run(Stage::Requirements, Stage::Plan).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::ParticipantFailed {
            profile: Profile::DesignAuthor,
            ..
        }
    ));

    // The advance signal produced in the failed round was merged and
    // persisted, but the cursor never moved.
    let dir = store.project_dir("demo");
    let history = orchestrator::history::load_history(&dir)
        .await
        .unwrap()
        .unwrap();
    assert!(history
        .iter()
        .any(|m| m.advance_target() == Some(Stage::Design)));
    assert!(drain_stage_changes(&mut rx).is_empty());
    assert_eq!(store.load("demo").await.unwrap().stage, Stage::Requirements);
}
