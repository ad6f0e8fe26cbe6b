//! Single-slot run supervision: at most one pipeline run per server,
//! with its approval gate and externally visible status.

use std::sync::{Arc, Mutex};

use events::{EventBus, EventEnvelope, RunEvent};
use orchestrator::{ApprovalGate, ProjectStore, Team, TemplateSource};
use stagegate_core::{RunStatus, Stage};
use tracing::{error, info, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub investment: Option<f64>,
    pub start: Option<Stage>,
    pub end: Option<Stage>,
}

#[derive(Debug, Clone, Copy)]
pub struct StartedRun {
    pub start: Stage,
    pub end: Stage,
}

#[derive(Default)]
struct ManagerInner {
    project: Option<String>,
    gate: Option<ApprovalGate>,
    running: bool,
    status: RunStatus,
}

#[derive(Clone)]
pub struct RunManager {
    store: ProjectStore,
    bus: EventBus,
    inner: Arc<Mutex<ManagerInner>>,
}

impl RunManager {
    pub fn new(store: ProjectStore, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            inner: Arc::new(Mutex::new(ManagerInner::default())),
        }
    }

    /// The project the last run belongs to and its current status. A
    /// parked approval gate overrides the stored status.
    pub fn status(&self) -> (Option<String>, RunStatus) {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if inner.running {
            if let Some(stage) = inner.gate.as_ref().and_then(ApprovalGate::pending) {
                return (inner.project.clone(), RunStatus::WaitingForApproval { stage });
            }
        }
        (inner.project.clone(), inner.status.clone())
    }

    /// Deliver a verdict to the parked gate of the active run.
    pub fn approve(&self, stage: Stage, approved: bool) -> Result<(), AppError> {
        let gate = {
            let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            inner
                .gate
                .clone()
                .filter(|_| inner.running)
                .ok_or_else(|| AppError::Conflict("no run is in progress".to_string()))?
        };
        gate.resolve(stage, approved)?;
        Ok(())
    }

    /// Launch a run for `project`. Fails if one is already in progress.
    /// Start defaults to the project's saved stage, end to Test.
    pub async fn start(&self, project: &str, options: RunOptions) -> Result<StartedRun, AppError> {
        let config = self.store.load(project).await?;
        let start = options.start.unwrap_or(config.stage);
        let end = options.end.unwrap_or(Stage::Test);

        let gate = {
            let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            if inner.running {
                return Err(AppError::Conflict("a run is already in progress".to_string()));
            }
            let gate = ApprovalGate::new(project, self.bus.clone());
            inner.project = Some(project.to_string());
            inner.gate = Some(gate.clone());
            inner.running = true;
            inner.status = RunStatus::Running { stage: start };
            gate
        };

        // Subscribe before the run task starts so no event is missed.
        let monitor_rx = self.bus.subscribe();
        tokio::spawn(monitor(monitor_rx, Arc::clone(&self.inner), project.to_string()));

        let store = self.store.clone();
        let bus = self.bus.clone();
        let project = project.to_string();
        tokio::spawn({
            let project = project.clone();
            async move {
                let team = Team::new(
                    &project,
                    store,
                    Arc::new(gate),
                    Arc::new(TemplateSource),
                    bus.clone(),
                )
                .await;
                match team {
                    Ok(mut team) => {
                        if let Some(investment) = options.investment {
                            team.invest(investment);
                        }
                        if let Err(e) = team.run(start, end).await {
                            warn!(project = %project, error = %e, "run ended with error");
                        }
                    }
                    Err(e) => {
                        error!(project = %project, error = %e, "failed to assemble team");
                        bus.publish(EventEnvelope::new(RunEvent::RunFailed {
                            project: project.clone(),
                            message: e.to_string(),
                        }));
                    }
                }
            }
        });

        info!(project = %project, %start, %end, "run launched");
        Ok(StartedRun { start, end })
    }
}

/// Tracks the active run through the event stream until it terminates.
async fn monitor(
    mut rx: tokio::sync::broadcast::Receiver<EventEnvelope>,
    inner: Arc<Mutex<ManagerInner>>,
    project: String,
) {
    loop {
        let envelope = match rx.recv().await {
            Ok(envelope) => envelope,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "run monitor lagged behind the event bus");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };
        if envelope.event.project() != project {
            continue;
        }
        let mut inner = inner.lock().unwrap_or_else(|p| p.into_inner());
        match envelope.event {
            RunEvent::StageChanged { stage, .. } => {
                inner.status = RunStatus::Running { stage };
            }
            RunEvent::RunCompleted { stage, .. } => {
                inner.status = RunStatus::Completed { stage };
                inner.running = false;
                inner.gate = None;
                break;
            }
            RunEvent::RunFailed { message, .. } => {
                inner.status = RunStatus::Error { message };
                inner.running = false;
                inner.gate = None;
                break;
            }
            _ => {}
        }
    }
}
