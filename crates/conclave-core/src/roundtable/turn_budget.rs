//! Per-agent reply budget between two user messages.
//!
//! Each agent's counter resets when a user message starts a new turn and
//! grows by one for every visible reply. An agent at or above the limit for
//! an entry's turn mode gets no further entries that turn.

use std::collections::HashMap;

use uuid::Uuid;

use conclave_types::config::TurnConfig;
use conclave_types::message::TurnMode;

/// Result of checking an agent against its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Below the limit for the mode.
    Ok,
    /// At or above the limit; entries are dropped silently.
    Exhausted,
}

/// Reply counters owned by the scheduler.
#[derive(Debug, Clone)]
pub struct TurnBudget {
    limits: TurnConfig,
    counts: HashMap<Uuid, u32>,
}

impl TurnBudget {
    pub fn new(limits: TurnConfig) -> Self {
        Self {
            limits,
            counts: HashMap::new(),
        }
    }

    /// The reply limit for a turn mode.
    pub fn limit(&self, mode: TurnMode) -> u32 {
        match mode {
            TurnMode::Broadcast => self.limits.broadcast_limit,
            TurnMode::Goal => self.limits.goal_limit,
        }
    }

    pub fn check(&self, agent_id: &Uuid, mode: TurnMode) -> BudgetStatus {
        if self.count(agent_id) >= self.limit(mode) {
            BudgetStatus::Exhausted
        } else {
            BudgetStatus::Ok
        }
    }

    pub fn allows(&self, agent_id: &Uuid, mode: TurnMode) -> bool {
        self.check(agent_id, mode) == BudgetStatus::Ok
    }

    /// Count one visible reply and return the new count.
    pub fn record_reply(&mut self, agent_id: &Uuid) -> u32 {
        let count = self.counts.entry(*agent_id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, agent_id: &Uuid) -> u32 {
        self.counts.get(agent_id).copied().unwrap_or(0)
    }

    /// Reset every counter; called when a user message is appended.
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn forget(&mut self, agent_id: &Uuid) {
        self.counts.remove(agent_id);
    }
}
