//! The shared environment: one shared message log plus the active
//! roster, dispatched in strict rounds.
//!
//! Every participant in a round observes the same snapshot of the
//! shared log; nothing anyone produces is visible until the whole
//! round has joined. A participant failure does not discard the other
//! participants' output, it only marks the round as failed.

use std::sync::Arc;

use futures::future::join_all;
use stagegate_core::{Message, Profile};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::OrchestratorError;
use crate::memory::Memory;
use crate::participant::Participant;

/// What one round yielded.
#[derive(Debug)]
pub struct RoundOutcome {
    /// Messages merged into the shared log this round.
    pub produced: usize,
    /// First participant failure, if any. The round's successful
    /// output is merged regardless.
    pub failure: Option<OrchestratorError>,
}

#[derive(Default)]
pub struct Environment {
    memory: Memory,
    roster: Vec<(Profile, Arc<Mutex<Participant>>)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the active roster, replacing any previous one. Order is
    /// preserved; merge order within a round follows it.
    pub fn set_roster(&mut self, participants: Vec<Participant>) {
        self.roster = participants
            .into_iter()
            .map(|p| (p.profile(), Arc::new(Mutex::new(p))))
            .collect();
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.roster.iter().map(|(profile, _)| *profile).collect()
    }

    pub fn handle(&self, profile: Profile) -> Option<Arc<Mutex<Participant>>> {
        self.roster
            .iter()
            .find(|(p, _)| *p == profile)
            .map(|(_, handle)| Arc::clone(handle))
    }

    /// Append to the shared log outside of a round (seeds, synthesized
    /// directives, replayed history).
    pub fn publish(&mut self, message: Message) {
        self.memory.add(message);
    }

    pub fn history(&self) -> &[Message] {
        self.memory.get()
    }

    /// Deliver `messages` straight into every participant's private
    /// memory, skipping `skip`. No reactions run.
    pub async fn deliver(&self, messages: &[Message], skip: Option<Profile>) {
        for (profile, handle) in &self.roster {
            if Some(*profile) == skip {
                continue;
            }
            handle.lock().await.receive_all(messages);
        }
    }

    pub async fn clear_participant_memory(&self, profile: Profile) {
        if let Some(handle) = self.handle(profile) {
            handle.lock().await.clear_memory();
        }
    }

    /// One round: every rostered participant observes the same shared
    /// snapshot concurrently, then all output is merged at the barrier.
    pub async fn run_round(&mut self) -> RoundOutcome {
        let snapshot: Arc<[Message]> = Arc::from(self.memory.get());

        let reactions = self.roster.iter().map(|(profile, handle)| {
            let snapshot = Arc::clone(&snapshot);
            async move {
                let mut participant = handle.lock().await;
                (*profile, participant.observe_and_react(&snapshot).await)
            }
        });
        let results = join_all(reactions).await;

        let mut produced = 0;
        let mut failure = None;
        for (profile, result) in results {
            match result {
                Ok(Some(message)) => {
                    debug!(profile = %profile, capability = %message.capability, "merged");
                    self.memory.add(message);
                    produced += 1;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(profile = %profile, %error, "participant failed");
                    if failure.is_none() {
                        failure = Some(error);
                    }
                }
            }
        }
        RoundOutcome { produced, failure }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("history_len", &self.memory.len())
            .field("roster", &self.profiles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CostLedger;
    use crate::error::Result;
    use crate::participant::{Reaction, ReactionContext};
    use async_trait::async_trait;
    use stagegate_core::{CapabilityKind, Payload};

    struct Produce(CapabilityKind);

    #[async_trait]
    impl Reaction for Produce {
        async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
            Ok(Some(Message::new(self.0, ctx.profile, Payload::text("out"))))
        }
    }

    struct Fail;

    #[async_trait]
    impl Reaction for Fail {
        async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
            Err(OrchestratorError::ParticipantFailed {
                profile: ctx.profile,
                reason: "boom".into(),
            })
        }
    }

    fn participant(profile: Profile, reaction: Box<dyn Reaction>) -> Participant {
        Participant::new(profile, reaction, CostLedger::new())
    }

    #[tokio::test]
    async fn test_round_output_is_invisible_until_the_barrier() {
        let mut env = Environment::new();
        env.set_roster(vec![
            participant(
                Profile::RequirementsAuthor,
                Box::new(Produce(CapabilityKind::ProduceRequirements)),
            ),
            // Watches ProduceRequirements; must not see this round's output.
            participant(
                Profile::RequirementsApprover,
                Box::new(Produce(CapabilityKind::ApproveRequirements)),
            ),
        ]);
        env.publish(Message::seed("idea"));

        let first = env.run_round().await;
        assert_eq!(first.produced, 1);
        assert!(first.failure.is_none());

        // The approver only sees the artifact on the next round.
        let second = env.run_round().await;
        assert_eq!(second.produced, 1);
        assert_eq!(env.history().len(), 3);
        assert_eq!(
            env.history()[2].capability,
            CapabilityKind::ApproveRequirements
        );
    }

    #[tokio::test]
    async fn test_failed_round_keeps_successful_output() {
        let mut env = Environment::new();
        env.set_roster(vec![
            participant(
                Profile::RequirementsAuthor,
                Box::new(Produce(CapabilityKind::ProduceRequirements)),
            ),
            participant(Profile::DesignAuthor, Box::new(Fail)),
        ]);
        env.publish(Message::seed("idea"));
        // Make the failing participant react too.
        env.publish(
            Message::new(
                CapabilityKind::ApproveRequirements,
                Profile::RequirementsApprover,
                Payload::text("ok"),
            ),
        );

        let outcome = env.run_round().await;
        assert_eq!(outcome.produced, 1);
        assert!(matches!(
            outcome.failure,
            Some(OrchestratorError::ParticipantFailed {
                profile: Profile::DesignAuthor,
                ..
            })
        ));
        assert_eq!(
            env.history().last().map(|m| m.capability),
            Some(CapabilityKind::ProduceRequirements)
        );
    }

    #[tokio::test]
    async fn test_deliver_skips_the_named_profile() {
        let mut env = Environment::new();
        env.set_roster(vec![
            participant(
                Profile::RequirementsAuthor,
                Box::new(Produce(CapabilityKind::ProduceRequirements)),
            ),
            participant(
                Profile::RequirementsApprover,
                Box::new(Produce(CapabilityKind::ApproveRequirements)),
            ),
        ]);

        env.deliver(&[Message::seed("idea")], Some(Profile::RequirementsApprover))
            .await;

        let author = env.handle(Profile::RequirementsAuthor).unwrap();
        assert_eq!(author.lock().await.memory().len(), 1);
        let approver = env.handle(Profile::RequirementsApprover).unwrap();
        assert!(approver.lock().await.memory().is_empty());
    }
}
