//! Per-agent FIFO mailbox and drain state.

use std::collections::VecDeque;

use conclave_types::message::MailboxEntry;
use uuid::Uuid;

use crate::agent::generation::GenerationHandle;

/// Where an agent's drain loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// No drain task is running.
    Idle,
    /// A drain task has been spawned but has not started a generation.
    Scheduled,
    /// A generation is in flight.
    Generating,
}

/// Inbound entries for one agent plus its scheduling state.
///
/// Each mailbox has its own id. A drain task is bound to the id of the
/// mailbox it was spawned for and must leave any other mailbox alone, which
/// matters when an agent is removed and seated again while its old
/// generation is still winding down.
#[derive(Debug)]
pub struct Mailbox {
    id: Uuid,
    queue: VecDeque<MailboxEntry>,
    pub(crate) drain: DrainState,
    pub(crate) active: Option<GenerationHandle>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            queue: VecDeque::new(),
            drain: DrainState::Idle,
            active: None,
        }
    }

    pub fn push(&mut self, entry: MailboxEntry) {
        self.queue.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<MailboxEntry> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove every queued entry, returning their message ids.
    pub fn purge(&mut self) -> Vec<Uuid> {
        self.queue.drain(..).map(|e| e.message_id).collect()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the drain task bound to `drain_id` owns this mailbox.
    pub fn is_drained_by(&self, drain_id: Uuid) -> bool {
        self.id == drain_id
    }

    pub fn is_busy(&self) -> bool {
        self.drain != DrainState::Idle
    }

    /// Whether a drain task should be spawned now.
    pub fn needs_drain(&self) -> bool {
        self.drain == DrainState::Idle && !self.queue.is_empty()
    }

    pub fn active(&self) -> Option<&GenerationHandle> {
        self.active.as_ref()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::message::{Message, TurnMode};

    fn entry(text: &str) -> MailboxEntry {
        let msg = Message::user(Uuid::now_v7(), "you", text, vec![]);
        MailboxEntry::for_message(Uuid::now_v7(), &msg, TurnMode::Broadcast)
    }

    #[test]
    fn entries_are_fifo() {
        let mut mailbox = Mailbox::new();
        mailbox.push(entry("one"));
        mailbox.push(entry("two"));
        assert_eq!(mailbox.pop().unwrap().text, "one");
        assert_eq!(mailbox.pop().unwrap().text, "two");
        assert!(mailbox.pop().is_none());
    }

    #[test]
    fn needs_drain_only_when_idle_and_non_empty() {
        let mut mailbox = Mailbox::new();
        assert!(!mailbox.needs_drain());
        mailbox.push(entry("one"));
        assert!(mailbox.needs_drain());
        mailbox.drain = DrainState::Scheduled;
        assert!(!mailbox.needs_drain());
        assert!(mailbox.is_busy());
    }

    #[test]
    fn a_new_mailbox_is_not_owned_by_an_old_drain() {
        let old = Mailbox::new();
        let new = Mailbox::new();
        assert!(old.is_drained_by(old.id()));
        assert!(!new.is_drained_by(old.id()));
    }

    #[test]
    fn purge_empties_queue() {
        let mut mailbox = Mailbox::new();
        let first = entry("one");
        let first_id = first.message_id;
        mailbox.push(first);
        mailbox.push(entry("two"));
        let purged = mailbox.purge();
        assert_eq!(purged.len(), 2);
        assert_eq!(purged[0], first_id);
        assert!(mailbox.is_empty());
    }
}
