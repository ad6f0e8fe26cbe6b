//! A participant: one rostered profile with private memory and a
//! single reaction.
//!
//! Each round the environment hands every active participant the full
//! shared log. The participant scans for management directives, filters
//! what it watches, diffs against what it has already seen, absorbs
//! everything, and reacts only if genuine news remains.

use async_trait::async_trait;
use stagegate_core::tables::{gated_stage, watchlist};
use stagegate_core::{Message, Profile};
use tracing::debug;

use crate::budget::CostLedger;
use crate::error::Result;
use crate::memory::Memory;

/// Everything a reaction may look at while producing its message.
pub struct ReactionContext {
    pub profile: Profile,
    /// Watched messages not previously seen, in publication order.
    pub news: Vec<Message>,
    /// The participant's full private log, news included.
    pub history: Vec<Message>,
    /// Sticky pre-approval latch, set by a management directive.
    pub auto_approved: bool,
    pub ledger: CostLedger,
}

/// The behavior behind a participant's single capability.
#[async_trait]
pub trait Reaction: Send + Sync {
    /// Produce at most one message in response to the context's news.
    async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>>;
}

pub struct Participant {
    profile: Profile,
    memory: Memory,
    auto_approved: bool,
    reaction: Box<dyn Reaction>,
    ledger: CostLedger,
}

impl Participant {
    pub fn new(profile: Profile, reaction: Box<dyn Reaction>, ledger: CostLedger) -> Self {
        Self {
            profile,
            memory: Memory::new(),
            auto_approved: false,
            reaction,
            ledger,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn is_auto_approved(&self) -> bool {
        self.auto_approved
    }

    /// Absorb messages without reacting. Used when replaying history
    /// into a freshly built roster.
    pub fn receive_all(&mut self, messages: &[Message]) {
        self.scan_directives(messages);
        self.memory.add_batch(messages.iter().cloned());
    }

    /// Drop the private log. A rejected gate forgets the artifact it
    /// judged so the question is asked again next run.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    fn scan_directives(&mut self, shared: &[Message]) {
        if self.auto_approved {
            return;
        }
        let Some(gated) = gated_stage(self.profile) else {
            return;
        };
        if shared
            .iter()
            .any(|m| m.pre_approved_stage() == Some(gated))
        {
            debug!(profile = %self.profile, stage = %gated, "pre-approval latch set");
            self.auto_approved = true;
        }
    }

    /// Addressed messages are observed only by their addressee;
    /// broadcasts go through the watch-list.
    fn observed<'a>(&self, shared: &'a [Message]) -> Vec<&'a Message> {
        let watched = watchlist(self.profile);
        shared
            .iter()
            .filter(|m| match m.send_to {
                Some(to) => to == self.profile,
                None => watched.contains(&m.capability),
            })
            .collect()
    }

    /// One round step: observe the shared log, absorb it, and react if
    /// any watched message is new. The shared log is delivered in full
    /// regardless of the watch-list, so later reactions can draw on
    /// context they do not trigger on.
    pub async fn observe_and_react(&mut self, shared: &[Message]) -> Result<Option<Message>> {
        self.scan_directives(shared);

        let observed = self.observed(shared);
        let news: Vec<Message> = self
            .memory
            .unseen(&observed)
            .into_iter()
            .cloned()
            .collect();

        self.memory.add_batch(shared.iter().cloned());

        if news.is_empty() {
            return Ok(None);
        }
        debug!(profile = %self.profile, news = news.len(), "reacting");

        let ctx = ReactionContext {
            profile: self.profile,
            news,
            history: self.memory.get().to_vec(),
            auto_approved: self.auto_approved,
            ledger: self.ledger.clone(),
        };
        self.reaction.react(&ctx).await
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("profile", &self.profile)
            .field("memory_len", &self.memory.len())
            .field("auto_approved", &self.auto_approved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_core::{CapabilityKind, Payload, Stage};

    struct Echo;

    #[async_trait]
    impl Reaction for Echo {
        async fn react(&self, ctx: &ReactionContext) -> Result<Option<Message>> {
            Ok(Some(Message::new(
                CapabilityKind::ProduceRequirements,
                ctx.profile,
                Payload::text(format!("saw {} new", ctx.news.len())),
            )))
        }
    }

    fn author() -> Participant {
        Participant::new(
            Profile::RequirementsAuthor,
            Box::new(Echo),
            CostLedger::new(),
        )
    }

    #[tokio::test]
    async fn test_reacts_only_to_unseen_watched_messages() {
        let mut p = author();
        let seed = Message::seed("an idea");
        let shared = vec![seed.clone()];

        let first = p.observe_and_react(&shared).await.unwrap();
        assert!(first.is_some());

        // Same log again: the seed is absorbed, no news, no reaction.
        let second = p.observe_and_react(&shared).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_unwatched_messages_are_absorbed_but_silent() {
        let mut p = author();
        let shared = vec![Message::advance(Profile::Governance, Stage::Design)];

        let reaction = p.observe_and_react(&shared).await.unwrap();
        assert!(reaction.is_none());
        assert_eq!(p.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_addressed_message_is_news_even_if_unwatched() {
        let mut p = author();
        let direct = Message::new(
            CapabilityKind::ProduceDesign,
            Profile::DesignAuthor,
            Payload::text("fyi"),
        )
        .to(Profile::RequirementsAuthor);

        let reaction = p.observe_and_react(&[direct]).await.unwrap();
        assert!(reaction.is_some());
    }

    #[tokio::test]
    async fn test_directive_latch_is_sticky_and_profile_scoped() {
        let mut gate = Participant::new(
            Profile::DesignApprover,
            Box::new(Echo),
            CostLedger::new(),
        );
        assert!(!gate.is_auto_approved());

        gate.receive_all(&[Message::pre_approved(Stage::Requirements)]);
        assert!(!gate.is_auto_approved());

        gate.receive_all(&[Message::pre_approved(Stage::Design)]);
        assert!(gate.is_auto_approved());

        // Clearing memory does not reset the latch.
        gate.clear_memory();
        assert!(gate.is_auto_approved());
        assert!(gate.memory().is_empty());
    }
}
