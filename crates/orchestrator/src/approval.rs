//! Approval delivery.
//!
//! An acceptance gate parks on an [`ApprovalResponder`] until a verdict
//! arrives. The production responder is [`ApprovalGate`]: a single-slot
//! oneshot channel resolved exactly once per question, wired to the
//! event bus so external surfaces see the request and its resolution.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use events::{EventBus, EventEnvelope, RunEvent};
use stagegate_core::Stage;
use tokio::sync::oneshot;

use crate::error::{OrchestratorError, Result};

/// Source of approval verdicts, asked by acceptance gates whose latch
/// is not set. `true` grants, `false` rejects.
#[async_trait]
pub trait ApprovalResponder: Send + Sync {
    async fn verdict(&self, stage: Stage, prompt: &str) -> Result<bool>;
}

/// Grants everything without asking. Used for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprover;

#[async_trait]
impl ApprovalResponder for AutoApprover {
    async fn verdict(&self, _stage: Stage, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

struct PendingApproval {
    stage: Stage,
    tx: oneshot::Sender<bool>,
}

/// Push-based approval channel between a running orchestration and an
/// external decision surface.
///
/// At most one question is outstanding at a time; the run loop is
/// strictly sequential, so a second `verdict` call cannot begin until
/// the previous one resolved. `resolve` consumes the slot, making a
/// double resolution impossible.
#[derive(Clone)]
pub struct ApprovalGate {
    project: String,
    bus: EventBus,
    slot: Arc<Mutex<Option<PendingApproval>>>,
}

impl ApprovalGate {
    pub fn new(project: impl Into<String>, bus: EventBus) -> Self {
        Self {
            project: project.into(),
            bus,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The stage whose verdict is currently awaited, if any.
    pub fn pending(&self) -> Option<Stage> {
        self.slot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|p| p.stage)
    }

    /// Deliver a verdict for `stage`. Fails if nothing is pending or if
    /// the pending question is for a different stage.
    pub fn resolve(&self, stage: Stage, approved: bool) -> Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        match slot.as_ref() {
            None => return Err(OrchestratorError::NoPendingApproval),
            Some(pending) if pending.stage != stage => {
                return Err(OrchestratorError::UnexpectedApprovalStage {
                    pending: pending.stage,
                    requested: stage,
                });
            }
            Some(_) => {}
        }
        let pending = slot.take().ok_or(OrchestratorError::NoPendingApproval)?;
        drop(slot);

        // A dropped receiver means the run already terminated; the
        // verdict has nowhere to go.
        pending
            .tx
            .send(approved)
            .map_err(|_| OrchestratorError::ApprovalChannelClosed)?;
        self.bus.publish(EventEnvelope::new(RunEvent::ApprovalResolved {
            project: self.project.clone(),
            stage,
            approved,
        }));
        Ok(())
    }
}

#[async_trait]
impl ApprovalResponder for ApprovalGate {
    async fn verdict(&self, stage: Stage, prompt: &str) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
            *slot = Some(PendingApproval { stage, tx });
        }
        self.bus.publish(EventEnvelope::new(RunEvent::ApprovalRequested {
            project: self.project.clone(),
            stage,
            prompt: prompt.to_string(),
        }));

        rx.await.map_err(|_| OrchestratorError::ApprovalChannelClosed)
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("project", &self.project)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_delivers_the_verdict() {
        let gate = ApprovalGate::new("demo", EventBus::new());
        let asker = gate.clone();
        let handle =
            tokio::spawn(async move { asker.verdict(Stage::Requirements, "ok?").await });

        // Wait for the question to be parked before resolving.
        while gate.pending().is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.pending(), Some(Stage::Requirements));

        gate.resolve(Stage::Requirements, false).unwrap();
        let verdict = handle.await.unwrap().unwrap();
        assert!(!verdict);
        assert_eq!(gate.pending(), None);
    }

    #[tokio::test]
    async fn test_resolve_without_question_fails() {
        let gate = ApprovalGate::new("demo", EventBus::new());
        assert!(matches!(
            gate.resolve(Stage::Design, true),
            Err(OrchestratorError::NoPendingApproval)
        ));
    }

    #[tokio::test]
    async fn test_resolve_for_wrong_stage_keeps_the_question() {
        let gate = ApprovalGate::new("demo", EventBus::new());
        let asker = gate.clone();
        let handle = tokio::spawn(async move { asker.verdict(Stage::Plan, "ok?").await });
        while gate.pending().is_none() {
            tokio::task::yield_now().await;
        }

        let err = gate.resolve(Stage::Design, true).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::UnexpectedApprovalStage {
                pending: Stage::Plan,
                requested: Stage::Design,
            }
        ));
        assert_eq!(gate.pending(), Some(Stage::Plan));

        gate.resolve(Stage::Plan, true).unwrap();
        assert!(handle.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_gate_publishes_request_and_resolution() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let gate = ApprovalGate::new("demo", bus);
        let asker = gate.clone();
        let handle = tokio::spawn(async move { asker.verdict(Stage::Design, "ok?").await });
        while gate.pending().is_none() {
            tokio::task::yield_now().await;
        }
        gate.resolve(Stage::Design, true).unwrap();
        handle.await.unwrap().unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event.kind(), "approval.requested");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.event.kind(), "approval.resolved");
    }

    #[tokio::test]
    async fn test_auto_approver_always_grants() {
        let verdict = AutoApprover.verdict(Stage::Test, "ok?").await.unwrap();
        assert!(verdict);
    }
}
