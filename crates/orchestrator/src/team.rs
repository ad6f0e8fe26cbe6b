//! The team: wires a project, a roster, and the shared environment
//! into a stage-gated run loop.
//!
//! A run moves a stage cursor from `start` toward `end`. Each round the
//! whole roster reacts once; the cursor advances only when an advance
//! signal names a stage strictly ahead of it. Three consecutive rounds
//! without output trip the no-progress fuse.

use std::sync::Arc;

use events::{EventBus, EventEnvelope, RunEvent};
use stagegate_core::tables::{approver_for, replay_kinds, validate_tables};
use stagegate_core::{CapabilityKind, Message, Profile, Stage};
use tracing::{info, warn};

use crate::approval::ApprovalResponder;
use crate::budget::CostLedger;
use crate::deliverable::{deliverable_file, render_markdown, DeliverableStore};
use crate::environment::Environment;
use crate::error::{OrchestratorError, Result};
use crate::history::{load_history, save_history};
use crate::project::{ProductConfig, ProjectStore};
use crate::reactions::ArtifactSource;
use crate::roster::ParticipantFactory;

/// Consecutive zero-yield rounds tolerated before the run is declared
/// stuck.
const NO_PROGRESS_LIMIT: u32 = 3;

/// Default spend ceiling when the caller does not invest explicitly.
const DEFAULT_INVESTMENT: f64 = 10.0;

/// The participant whose fresh output restarts the pipeline when
/// resuming at `resume`: the first author for Requirements, the gate of
/// the preceding stage otherwise, or the Builder once all gates are
/// behind. Everything replayed is withheld from this participant's
/// private memory so it reacts to it as news.
fn resume_trigger(resume: Stage) -> Profile {
    match resume {
        Stage::Requirements => Profile::RequirementsAuthor,
        Stage::Design => Profile::RequirementsApprover,
        Stage::Plan => Profile::DesignApprover,
        Stage::Build => Profile::PlanApprover,
        Stage::Test => Profile::Builder,
    }
}

/// The approval capability gating `stage`, if it is gated.
fn gate_capability(stage: Stage) -> Option<CapabilityKind> {
    match stage {
        Stage::Requirements => Some(CapabilityKind::ApproveRequirements),
        Stage::Design => Some(CapabilityKind::ApproveDesign),
        Stage::Plan => Some(CapabilityKind::ApprovePlan),
        Stage::Build | Stage::Test => None,
    }
}

pub struct Team {
    project: String,
    config: ProductConfig,
    store: ProjectStore,
    deliverables: DeliverableStore,
    environment: Environment,
    factory: ParticipantFactory,
    ledger: CostLedger,
    bus: EventBus,
    ceiling: f64,
    current: Stage,
}

impl Team {
    pub async fn new(
        project: &str,
        store: ProjectStore,
        responder: Arc<dyn ApprovalResponder>,
        source: Arc<dyn ArtifactSource>,
        bus: EventBus,
    ) -> Result<Self> {
        validate_tables()?;
        let config = store.load(project).await?;
        let ledger = CostLedger::new();
        let factory = ParticipantFactory::new(responder, source, ledger.clone());
        let deliverables = DeliverableStore::new(store.project_dir(project));
        Ok(Self {
            project: project.to_string(),
            config,
            store,
            deliverables,
            environment: Environment::new(),
            factory,
            ledger,
            bus,
            ceiling: DEFAULT_INVESTMENT,
            current: Stage::default(),
        })
    }

    /// Set the spend ceiling for this run.
    pub fn invest(&mut self, ceiling: f64) {
        self.ceiling = ceiling;
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn current_stage(&self) -> Stage {
        self.current
    }

    pub fn history(&self) -> &[Message] {
        self.environment.history()
    }

    fn emit(&self, event: RunEvent) {
        self.bus.publish(EventEnvelope::new(event));
    }

    fn log(&self, line: impl Into<String>) {
        self.emit(RunEvent::Log {
            project: self.project.clone(),
            line: line.into(),
        });
    }

    /// Seed the environment for a run resuming at `resume` from saved
    /// history.
    ///
    /// Replayed messages are filtered to the capabilities relevant up
    /// to and including the resume stage, and advance signals pointing
    /// past it are dropped. For every gate the history shows as
    /// granted, an addressed pre-approval directive is synthesized so
    /// the gate is not asked again. Everything is delivered into every
    /// private memory except the resume trigger's, whose reaction to
    /// the "news" restarts the pipeline.
    async fn set_memory(&mut self, history: Vec<Message>, resume: Stage) {
        let kinds = replay_kinds(resume);
        let mut replayed: Vec<Message> = history
            .into_iter()
            .filter(|m| kinds.contains(&m.capability))
            .filter(|m| !m.advance_target().is_some_and(|t| t > resume))
            .collect();

        for stage in Stage::ALL {
            let (Some(gate), Some(approver)) = (gate_capability(stage), approver_for(stage))
            else {
                continue;
            };
            if replayed.iter().any(|m| m.capability == gate) {
                replayed.push(Message::pre_approved(stage).to(approver));
            }
        }

        let skip = Some(resume_trigger(resume));
        info!(
            project = %self.project,
            resume = %resume,
            replayed = replayed.len(),
            "replaying history"
        );
        self.environment.deliver(&replayed, skip).await;
        for message in replayed {
            self.environment.publish(message);
        }
    }

    /// Move the cursor if any advance signal names a stage strictly
    /// ahead of it. Highest target wins.
    fn resolve_stage(&mut self) -> Option<Stage> {
        let target = self
            .environment
            .history()
            .iter()
            .filter_map(Message::advance_target)
            .max()?;
        if target > self.current {
            self.current = target;
            Some(target)
        } else {
            None
        }
    }

    /// Write the shared log, the latest deliverable per document stage,
    /// and the updated product configuration.
    async fn persist(&mut self) -> Result<()> {
        let dir = self.store.project_dir(&self.project);
        save_history(&dir, self.environment.history()).await?;

        for stage in Stage::ALL {
            if deliverable_file(stage).is_none() {
                continue;
            }
            let latest = self
                .environment
                .history()
                .iter()
                .rev()
                .find(|m| m.capability.produces_for() == Some(stage));
            if let Some(message) = latest {
                self.deliverables
                    .write(stage, &render_markdown(&message.payload))
                    .await?;
            }
        }

        self.config.stage = self.current;
        self.store.save(&self.project, &self.config).await
    }

    async fn fail(&mut self, error: OrchestratorError, write_history: bool) -> OrchestratorError {
        if write_history {
            if let Err(persist_error) = self.persist().await {
                warn!(project = %self.project, %persist_error, "persist failed during shutdown");
            }
        }
        self.emit(RunEvent::RunFailed {
            project: self.project.clone(),
            message: error.to_string(),
        });
        error
    }

    /// Run the pipeline from `start` until the cursor reaches `end`.
    /// Returns the stage the cursor rests on.
    pub async fn run(&mut self, start: Stage, end: Stage) -> Result<Stage> {
        let end = end.max(start);
        self.current = start;
        self.environment
            .set_roster(self.factory.roster_for(end));

        match load_history(&self.store.project_dir(&self.project)).await? {
            Some(history) if !history.is_empty() => self.set_memory(history, start).await,
            _ => {
                let idea = self.config.idea.clone();
                self.environment.publish(Message::seed(idea));
            }
        }

        self.emit(RunEvent::RunStarted {
            project: self.project.clone(),
            start,
            end,
        });
        info!(project = %self.project, %start, %end, "run started");

        let mut idle_rounds = 0u32;
        let mut round = 0u64;
        while self.current < end {
            if let Err(error) = self.ledger.check(self.ceiling) {
                warn!(project = %self.project, %error, "run aborted");
                // A budget breach invalidates the round; nothing new is
                // worth keeping.
                return Err(self.fail(error, false).await);
            }

            round += 1;
            let outcome = self.environment.run_round().await;
            self.log(format!(
                "round {round}: {} message(s), stage {}",
                outcome.produced, self.current
            ));

            if let Some(error) = outcome.failure {
                if let OrchestratorError::ApprovalRejected { approver } = &error {
                    self.environment.clear_participant_memory(*approver).await;
                }
                return Err(self.fail(error, true).await);
            }

            if let Some(stage) = self.resolve_stage() {
                self.emit(RunEvent::StageChanged {
                    project: self.project.clone(),
                    stage,
                });
                info!(project = %self.project, %stage, "stage advanced");
            }

            if outcome.produced == 0 {
                idle_rounds += 1;
                if idle_rounds >= NO_PROGRESS_LIMIT {
                    let error = OrchestratorError::NoProgress {
                        rounds: idle_rounds,
                    };
                    return Err(self.fail(error, true).await);
                }
            } else {
                idle_rounds = 0;
            }
        }

        self.persist().await?;
        self.emit(RunEvent::RunCompleted {
            project: self.project.clone(),
            stage: self.current,
        });
        info!(project = %self.project, stage = %self.current, "run completed");
        Ok(self.current)
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("project", &self.project)
            .field("current", &self.current)
            .field("ceiling", &self.ceiling)
            .finish()
    }
}
