//! Append-only message log with a capability index.
//!
//! One `Memory` is owned by exactly one scope: the environment (shared)
//! or a participant (private). Ordering is publication order; messages
//! are never mutated and never removed except by `clear`.

use std::collections::{HashMap, HashSet};

use stagegate_core::{CapabilityKind, Message};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct Memory {
    storage: Vec<Message>,
    index: HashMap<CapabilityKind, Vec<usize>>,
    seen: HashSet<Uuid>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message. O(1) amortized; duplicates (by id) are
    /// silently skipped so redelivery stays idempotent.
    pub fn add(&mut self, message: Message) {
        if !self.seen.insert(message.id) {
            return;
        }
        self.index
            .entry(message.capability)
            .or_default()
            .push(self.storage.len());
        self.storage.push(message);
    }

    pub fn add_batch(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.add(message);
        }
    }

    /// All messages whose producing capability is in `kinds`, in
    /// original publication order.
    pub fn by_capability(&self, kinds: &[CapabilityKind]) -> Vec<&Message> {
        let mut positions: Vec<usize> = kinds
            .iter()
            .filter_map(|kind| self.index.get(kind))
            .flatten()
            .copied()
            .collect();
        positions.sort_unstable();
        positions.into_iter().map(|i| &self.storage[i]).collect()
    }

    /// The subset of `candidates` this memory has not seen (by id).
    /// Idempotent: the result only changes when messages are delivered.
    pub fn unseen<'a>(&self, candidates: &[&'a Message]) -> Vec<&'a Message> {
        candidates
            .iter()
            .filter(|m| !self.seen.contains(&m.id))
            .copied()
            .collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.seen.contains(&id)
    }

    /// Empty the log. Used when a rejected approval requires the gate
    /// to be re-asked on the next run.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.index.clear();
        self.seen.clear();
    }

    pub fn get(&self) -> &[Message] {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
