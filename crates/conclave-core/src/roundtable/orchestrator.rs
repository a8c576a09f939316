//! Round-table scheduler.
//!
//! `RoundTableOrchestrator` owns the one authoritative [`SchedulerState`] of
//! a round table: roster, timeline, per-agent mailboxes and drain states,
//! turn budget, summary state and turn mode, all behind a single async
//! mutex. Every agent drains its mailbox in its own tokio task, so agents
//! generate concurrently while each agent stays strictly serial. Agents
//! never touch each other's state; a reply reaches other agents only by
//! being enqueued into their mailboxes.
//!
//! Timeline writes go through to the [`RoundTableRepository`]. A failed
//! write is logged and published as `PersistenceFailed`; in-memory state is
//! never rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, Notify, broadcast};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use conclave_observe::genai_attrs::{GEN_AI_AGENT_ID, GEN_AI_OPERATION_NAME, OP_INVOKE_AGENT};
use conclave_types::config::EngineConfig;
use conclave_types::error::{RepositoryError, RoundTableError};
use conclave_types::event::{DropReason, RoundTableEvent};
use conclave_types::llm::{ChatMessage, CompletionRequest};
use conclave_types::message::{
    MailboxEntry, MediaAttachment, Message, Response, SenderKind, TurnMode,
};
use conclave_types::roundtable::{Participant, ParticipantOverrides, RoundTable, RoundTableStatus};

use crate::agent::context::ContextWindowBuilder;
use crate::agent::generation::{
    GenerationError, GenerationHandle, GenerationOutcome, GenerationSession,
};
use crate::agent::markers::{ReplyKind, classify_reply};
use crate::agent::prompt::FramingBuilder;
use crate::agent::summarizer::{ContextSummarizer, ConversationSummary, SummaryState};
use crate::event::EventBus;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::estimator::{CharEstimator, TokenEstimator};
use crate::llm::registry::ProviderRegistry;
use crate::llm::token_budget::TokenBudget;
use crate::repository::RoundTableRepository;
use crate::tool::{BoxToolRegistry, ToolNegotiator};

use super::mailbox::{DrainState, Mailbox};
use super::mention::{resolve_mentions, resolve_targets};
use super::timeline::Timeline;
use super::turn_budget::TurnBudget;

/// Sender name used for user messages unless overridden.
pub const DEFAULT_USER_NAME: &str = "user";

/// Everything the scheduler mutates, in one place.
struct SchedulerState {
    round_table: RoundTable,
    timeline: Timeline,
    mailboxes: HashMap<Uuid, Mailbox>,
    budget: TurnBudget,
    summary: SummaryState,
    turn_mode: TurnMode,
}

impl SchedulerState {
    /// Every mailbox empty and no drain task running.
    fn is_idle(&self) -> bool {
        self.mailboxes.values().all(|m| m.is_empty() && !m.is_busy())
    }

    /// Queue `message` for each target and return the `(agent, mailbox)`
    /// pairs whose drain task must be spawned. Out-of-budget targets are
    /// dropped silently.
    fn enqueue(
        &mut self,
        targets: &[Uuid],
        message: &Message,
        mode: TurnMode,
        events: &EventBus,
    ) -> Vec<(Uuid, Uuid)> {
        let mut ready = Vec::new();
        for target in targets {
            if !self.budget.allows(target, mode) {
                debug!(agent_id = %target, message_id = %message.id, "turn budget exhausted, entry dropped");
                events.publish(RoundTableEvent::EntryDropped {
                    agent_id: *target,
                    message_id: message.id,
                    reason: DropReason::BudgetExhausted,
                });
                continue;
            }
            let Some(mailbox) = self.mailboxes.get_mut(target) else {
                continue;
            };
            mailbox.push(MailboxEntry::for_message(*target, message, mode));
            if mailbox.needs_drain() {
                mailbox.drain = DrainState::Scheduled;
                ready.push((*target, mailbox.id()));
            }
        }
        ready
    }
}

/// One dequeued entry with everything its generation needs, snapshotted
/// under the scheduler lock.
struct Job {
    mailbox_id: Uuid,
    entry: MailboxEntry,
    handle: GenerationHandle,
    participant: Participant,
    round_table: RoundTable,
    provider: Arc<BoxLlmProvider>,
    budget: TokenBudget,
    history: Vec<Message>,
    summary: Option<ConversationSummary>,
    summarize: bool,
    started: Instant,
}

/// Drives one round table.
///
/// Cloning is cheap and every clone drives the same round table.
pub struct RoundTableOrchestrator<R: RoundTableRepository + 'static> {
    state: Arc<Mutex<SchedulerState>>,
    idle: Arc<Notify>,
    config: Arc<EngineConfig>,
    providers: Arc<ProviderRegistry>,
    repository: Arc<R>,
    tools: Option<Arc<ToolNegotiator>>,
    estimator: Arc<dyn TokenEstimator>,
    events: EventBus,
    user_name: Arc<str>,
}

impl<R: RoundTableRepository + 'static> Clone for RoundTableOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            idle: self.idle.clone(),
            config: self.config.clone(),
            providers: self.providers.clone(),
            repository: self.repository.clone(),
            tools: self.tools.clone(),
            estimator: self.estimator.clone(),
            events: self.events.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

impl<R: RoundTableRepository + 'static> RoundTableOrchestrator<R> {
    /// Start a fresh round table with an empty timeline.
    pub fn new(
        round_table: RoundTable,
        config: EngineConfig,
        providers: ProviderRegistry,
        repository: Arc<R>,
    ) -> Self {
        Self::restore(round_table, Vec::new(), config, providers, repository)
    }

    /// Rebuild a round table from its persisted timeline.
    ///
    /// Turn counters are replayed from the agent messages after the last
    /// user message.
    pub fn restore(
        round_table: RoundTable,
        messages: Vec<Message>,
        config: EngineConfig,
        providers: ProviderRegistry,
        repository: Arc<R>,
    ) -> Self {
        let timeline = Timeline::from_messages(round_table.id, messages);
        let mut budget = TurnBudget::new(config.turns);
        let turn_start = timeline
            .messages()
            .iter()
            .rposition(Message::is_user)
            .map_or(0, |i| i + 1);
        for message in &timeline.messages()[turn_start..] {
            if let Some(author) = message.sender_agent_id {
                budget.record_reply(&author);
            }
        }

        let mailboxes = round_table
            .roster()
            .iter()
            .map(|p| (p.agent_id, Mailbox::new()))
            .collect();
        let events = EventBus::new(config.event_capacity);

        debug!(
            round_table_id = %round_table.id,
            participants = round_table.roster().len(),
            messages = timeline.len(),
            "round table orchestrator ready"
        );

        let state = SchedulerState {
            round_table,
            timeline,
            mailboxes,
            budget,
            summary: SummaryState::default(),
            turn_mode: TurnMode::default(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            idle: Arc::new(Notify::new()),
            config: Arc::new(config),
            providers: Arc::new(providers),
            repository,
            tools: None,
            estimator: Arc::new(CharEstimator),
            events,
            user_name: Arc::from(DEFAULT_USER_NAME),
        }
    }

    /// Fetch a round table and its messages from the repository, then
    /// restore it.
    pub async fn load(
        repository: Arc<R>,
        round_table_id: &Uuid,
        config: EngineConfig,
        providers: ProviderRegistry,
    ) -> Result<Self, RepositoryError> {
        let round_table = repository
            .get_round_table(round_table_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let messages = repository.list_messages(round_table_id).await?;
        info!(round_table_id = %round_table_id, messages = messages.len(), "round table loaded");
        Ok(Self::restore(round_table, messages, config, providers, repository))
    }

    /// Enable two-phase tool negotiation for every generation.
    pub fn with_tool_registry(mut self, registry: BoxToolRegistry) -> Self {
        self.tools = Some(Arc::new(ToolNegotiator::new(Arc::new(registry))));
        self
    }

    pub fn with_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    /// Publish into an existing bus instead of a private one.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Arc::from(name.into());
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundTableEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Append a user message and route it.
    ///
    /// Starts a new turn: every agent's counter resets. The message goes to
    /// the mentioned participants, or to everyone when nobody is mentioned.
    pub async fn post_user_message(
        &self,
        text: impl Into<String>,
        media: Vec<MediaAttachment>,
    ) -> Result<Message, RoundTableError> {
        let text = text.into();
        let message = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            if !state.round_table.is_active() {
                return Err(RoundTableError::Closed);
            }

            let mentions = resolve_mentions(&text, state.round_table.roster(), None);
            let mut message = Message::user(state.round_table.id, &*self.user_name, text, mentions)
                .with_media(media);
            message.sequence = state.timeline.append(message.clone());
            state.budget.reset();

            let targets = resolve_targets(&message.mentions, state.round_table.roster(), None);
            info!(
                round_table_id = %message.round_table_id,
                sequence = message.sequence,
                targets = targets.len(),
                turn_mode = %state.turn_mode,
                "user message appended"
            );
            self.publish_appended(&message);

            let mode = state.turn_mode;
            let ready = state.enqueue(&targets, &message, mode, &self.events);
            self.spawn_drains(ready);
            message
        };

        self.persist("append_message", self.repository.append_message(&message).await);
        Ok(message)
    }

    /// Turn mode applied to entries created by later user messages.
    pub async fn set_turn_mode(&self, mode: TurnMode) {
        let mut state = self.state.lock().await;
        if state.turn_mode != mode {
            state.turn_mode = mode;
            info!(turn_mode = %mode, "turn mode changed");
            self.events
                .publish(RoundTableEvent::TurnModeChanged { turn_mode: mode });
        }
    }

    pub async fn turn_mode(&self) -> TurnMode {
        self.state.lock().await.turn_mode
    }

    /// Cancel `agent_id`'s in-flight generation, if any.
    ///
    /// Other agents and the rest of this agent's queue are unaffected.
    pub async fn cancel(&self, agent_id: &Uuid) -> bool {
        let state = self.state.lock().await;
        match state.mailboxes.get(agent_id).and_then(Mailbox::active) {
            Some(handle) if !handle.is_cancelled() => {
                info!(agent_id = %agent_id, message_id = %handle.message_id, "cancelling generation");
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn add_participant(&self, participant: Participant) -> Result<(), RoundTableError> {
        let mut state = self.state.lock().await;
        if !state.round_table.is_active() {
            return Err(RoundTableError::Closed);
        }
        let agent_id = participant.agent_id;
        let display_name = participant.display_name.clone();
        state.round_table.add_participant(participant)?;
        state.mailboxes.insert(agent_id, Mailbox::new());

        info!(agent_id = %agent_id, display_name = %display_name, "participant added");
        self.events.publish(RoundTableEvent::ParticipantAdded {
            agent_id,
            display_name,
        });
        Ok(())
    }

    /// Remove a participant, purging its queue and cancelling its in-flight
    /// generation.
    pub async fn remove_participant(&self, agent_id: &Uuid) -> Result<Participant, RoundTableError> {
        let mut state = self.state.lock().await;
        let participant = state.round_table.remove_participant(agent_id)?;
        if let Some(mut mailbox) = state.mailboxes.remove(agent_id) {
            for message_id in mailbox.purge() {
                self.events.publish(RoundTableEvent::EntryDropped {
                    agent_id: *agent_id,
                    message_id,
                    reason: DropReason::ParticipantRemoved,
                });
            }
            if let Some(handle) = mailbox.active() {
                handle.cancel();
            }
        }
        state.budget.forget(agent_id);

        info!(agent_id = %agent_id, display_name = %participant.display_name, "participant removed");
        self.events
            .publish(RoundTableEvent::ParticipantRemoved { agent_id: *agent_id });
        if state.is_idle() {
            self.idle.notify_waiters();
        }
        Ok(participant)
    }

    /// Replace a participant's per-round overrides and persist them.
    pub async fn update_overrides(
        &self,
        agent_id: &Uuid,
        overrides: ParticipantOverrides,
    ) -> Result<(), RoundTableError> {
        let round_table_id = {
            let mut state = self.state.lock().await;
            let participant = state
                .round_table
                .participant_mut(agent_id)
                .ok_or(RoundTableError::ParticipantNotFound(*agent_id))?;
            participant.overrides = overrides.clone();
            state.round_table.id
        };
        debug!(agent_id = %agent_id, "participant overrides updated");
        self.persist(
            "update_participant_overrides",
            self.repository
                .update_participant_overrides(&round_table_id, agent_id, &overrides)
                .await,
        );
        Ok(())
    }

    /// Attach an unselected response candidate to a message.
    pub async fn add_response(
        &self,
        message_id: &Uuid,
        response: Response,
    ) -> Result<Response, RoundTableError> {
        let response = self.state.lock().await.timeline.add_response(message_id, response)?;
        self.persist("append_response", self.repository.append_response(&response).await);
        Ok(response)
    }

    /// Select one response of a message, clearing any earlier selection.
    pub async fn select_response(
        &self,
        message_id: &Uuid,
        response_id: &Uuid,
    ) -> Result<(), RoundTableError> {
        self.state
            .lock()
            .await
            .timeline
            .select_response(message_id, response_id)?;
        self.events.publish(RoundTableEvent::ResponseSelected {
            message_id: *message_id,
            response_id: *response_id,
        });
        self.persist(
            "select_response",
            self.repository.select_response(message_id, response_id).await,
        );
        Ok(())
    }

    /// Close the round table: purge every mailbox and cancel every
    /// in-flight generation. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        if state.round_table.status == RoundTableStatus::Closed {
            return;
        }
        state.round_table.status = RoundTableStatus::Closed;
        for (agent_id, mailbox) in state.mailboxes.iter_mut() {
            for message_id in mailbox.purge() {
                self.events.publish(RoundTableEvent::EntryDropped {
                    agent_id: *agent_id,
                    message_id,
                    reason: DropReason::Closed,
                });
            }
            if let Some(handle) = mailbox.active() {
                handle.cancel();
            }
        }

        info!(round_table_id = %state.round_table.id, "round table closed");
        self.events.publish(RoundTableEvent::RoundTableClosed {
            round_table_id: state.round_table.id,
        });
        if state.is_idle() {
            self.idle.notify_waiters();
        }
    }

    /// Resolves once every mailbox is empty and no drain task is running.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.state.lock().await.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub async fn timeline(&self) -> Vec<Message> {
        self.state.lock().await.timeline.messages().to_vec()
    }

    pub async fn round_table(&self) -> RoundTable {
        self.state.lock().await.round_table.clone()
    }

    pub async fn queue_len(&self, agent_id: &Uuid) -> usize {
        self.state
            .lock()
            .await
            .mailboxes
            .get(agent_id)
            .map_or(0, Mailbox::len)
    }

    pub async fn is_busy(&self, agent_id: &Uuid) -> bool {
        self.state
            .lock()
            .await
            .mailboxes
            .get(agent_id)
            .is_some_and(Mailbox::is_busy)
    }

    /// Visible replies `agent_id` authored in the current turn.
    pub async fn turn_count(&self, agent_id: &Uuid) -> u32 {
        self.state.lock().await.budget.count(agent_id)
    }

    pub async fn summary(&self) -> Option<ConversationSummary> {
        self.state.lock().await.summary.summary.clone()
    }

    pub async fn active_handle(&self, agent_id: &Uuid) -> Option<GenerationHandle> {
        self.state
            .lock()
            .await
            .mailboxes
            .get(agent_id)
            .and_then(|m| m.active().cloned())
    }

    // -----------------------------------------------------------------------
    // Drain loop
    // -----------------------------------------------------------------------

    fn spawn_drains(&self, ready: Vec<(Uuid, Uuid)>) {
        for (agent_id, mailbox_id) in ready {
            tokio::spawn(self.clone().drain(agent_id, mailbox_id));
        }
    }

    fn drain(self, agent_id: Uuid, mailbox_id: Uuid) -> BoxFuture<'static, ()> {
        let span = info_span!(
            "round_table.drain",
            { GEN_AI_OPERATION_NAME } = OP_INVOKE_AGENT,
            { GEN_AI_AGENT_ID } = %agent_id,
        );
        async move {
            while let Some(mut job) = self.next_job(agent_id, mailbox_id).await {
                let outcome = self.run_job(&mut job).await;
                self.finish_job(job, outcome).await;
            }
        }
        .instrument(span)
        .boxed()
    }

    /// Dequeue the next runnable entry, or mark the agent idle.
    ///
    /// Returns `None` without touching anything once `mailbox_id` no longer
    /// names the agent's mailbox.
    async fn next_job(&self, agent_id: Uuid, mailbox_id: Uuid) -> Option<Job> {
        let mut guard = self.state.lock().await;
        loop {
            let state = &mut *guard;
            let mailbox = state
                .mailboxes
                .get_mut(&agent_id)
                .filter(|m| m.is_drained_by(mailbox_id))?;
            let Some(entry) = mailbox.pop() else {
                mailbox.drain = DrainState::Idle;
                mailbox.active = None;
                debug!(agent_id = %agent_id, "mailbox drained");
                if state.is_idle() {
                    self.idle.notify_waiters();
                }
                return None;
            };

            if !state.budget.allows(&agent_id, entry.turn_mode) {
                debug!(agent_id = %agent_id, message_id = %entry.message_id, "turn budget exhausted, entry dropped");
                self.events.publish(RoundTableEvent::EntryDropped {
                    agent_id,
                    message_id: entry.message_id,
                    reason: DropReason::BudgetExhausted,
                });
                continue;
            }

            let participant = state.round_table.participant(&agent_id)?.clone();
            let model = participant.effective_model().to_string();
            let Some(provider) = self.providers.resolve(&model) else {
                let error = GenerationError::NoProvider(model);
                warn!(agent_id = %agent_id, error = %error, "no provider for participant");
                self.events.publish(RoundTableEvent::GenerationFailed {
                    agent_id,
                    message_id: entry.message_id,
                    error: error.to_string(),
                });
                continue;
            };

            let budget = TokenBudget::from_capabilities(provider.capabilities(), &self.config.context);
            let history = state.timeline.messages().to_vec();
            let usage = ContextWindowBuilder::new(self.estimator.as_ref(), budget).timeline_usage(&history);
            let summarize =
                state
                    .summary
                    .should_summarize(history.len(), usage, &budget, &self.config.context);
            if summarize {
                state.summary.in_flight = true;
            }

            let handle = GenerationHandle::new(agent_id, entry.message_id);
            if let Some(mailbox) = state.mailboxes.get_mut(&agent_id) {
                mailbox.drain = DrainState::Generating;
                mailbox.active = Some(handle.clone());
            }

            return Some(Job {
                mailbox_id,
                entry,
                handle,
                participant,
                round_table: state.round_table.clone(),
                provider,
                budget,
                history,
                summary: state.summary.summary.clone(),
                summarize,
                started: Instant::now(),
            });
        }
    }

    async fn run_job(&self, job: &mut Job) -> Result<GenerationOutcome, GenerationError> {
        let agent_id = job.participant.agent_id;
        if job.summarize {
            job.summary = self.summarize(job).await;
        }

        let mut window = ContextWindowBuilder::new(self.estimator.as_ref(), job.budget).build(
            &job.history,
            &agent_id,
            job.summary.as_ref(),
            Some(&job.entry.message_id),
        );
        debug!(
            agent_id = %agent_id,
            history = window.included.len(),
            summary = window.summary_included,
            estimated_tokens = window.estimated_tokens,
            threshold = window.threshold,
            "context window built"
        );
        window.messages.push(final_turn(&job.entry));

        let tool_providers = match &self.tools {
            Some(negotiator) => negotiator.providers().await,
            None => Vec::new(),
        };
        let system = FramingBuilder::new(&job.round_table, &job.participant)
            .turn_mode(job.entry.turn_mode)
            .tool_providers(&tool_providers)
            .build();

        let generation = &self.config.generation;
        let request = CompletionRequest {
            model: job.participant.effective_model().to_string(),
            messages: window.messages,
            system: Some(system),
            max_tokens: generation
                .max_tokens
                .min(job.provider.capabilities().max_output_tokens),
            temperature: Some(generation.temperature),
            stream: generation.streaming,
            tools: Vec::new(),
            media_output_path: job.participant.overrides.media_output_path.clone(),
        };

        self.events.publish(RoundTableEvent::GenerationStarted {
            agent_id,
            message_id: job.entry.message_id,
            turn_mode: job.entry.turn_mode,
        });

        let session = GenerationSession::new(&job.provider, &job.handle, &self.events);
        match &self.tools {
            Some(negotiator) => negotiator.negotiate(&session, request, &self.events, agent_id).await,
            None => session.run(request).await,
        }
    }

    /// Summarize everything except the most recent entries with the
    /// requesting agent's provider. Returns the summary in effect afterwards.
    async fn summarize(&self, job: &Job) -> Option<ConversationSummary> {
        let agent_id = job.participant.agent_id;
        let context = &self.config.context;
        let (older, _) =
            ContextSummarizer::select_messages_to_summarize(&job.history, context.summary_keep_recent);
        let result = ContextSummarizer::summarize(
            &job.provider,
            older,
            job.participant.effective_model(),
            context.summary_max_words,
        )
        .await;

        let mut state = self.state.lock().await;
        state.summary.in_flight = false;
        match result {
            Ok(text) if !text.is_empty() => {
                let summary = ConversationSummary {
                    text,
                    covered_through: older.last().map_or(0, |m| m.sequence),
                    covered_messages: older.len(),
                };
                info!(
                    agent_id = %agent_id,
                    covered_messages = summary.covered_messages,
                    covered_through = summary.covered_through,
                    "conversation summarized"
                );
                state.summary.summary = Some(summary.clone());
                self.events.publish(RoundTableEvent::SummaryCreated {
                    round_table_id: state.round_table.id,
                    agent_id,
                    covered_messages: summary.covered_messages,
                });
                Some(summary)
            }
            Ok(_) => state.summary.summary.clone(),
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "summarization failed, continuing without summary");
                state.summary.summary.clone()
            }
        }
    }

    async fn finish_job(&self, job: Job, outcome: Result<GenerationOutcome, GenerationError>) {
        let agent_id = job.participant.agent_id;
        let message_id = job.entry.message_id;

        let appended = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let owned = state
                .mailboxes
                .get_mut(&agent_id)
                .filter(|m| m.is_drained_by(job.mailbox_id));
            let removed = match owned {
                Some(mailbox) => {
                    mailbox.active = None;
                    mailbox.drain = DrainState::Scheduled;
                    false
                }
                None => true,
            };
            let discard = removed || job.handle.is_cancelled() || !state.round_table.is_active();

            match outcome {
                Err(e) => {
                    warn!(agent_id = %agent_id, message_id = %message_id, error = %e, "generation failed");
                    self.events.publish(RoundTableEvent::GenerationFailed {
                        agent_id,
                        message_id,
                        error: e.to_string(),
                    });
                    None
                }
                Ok(GenerationOutcome::Completed(_)) if discard => {
                    self.publish_cancelled(agent_id, message_id);
                    None
                }
                Ok(GenerationOutcome::Cancelled) => {
                    self.publish_cancelled(agent_id, message_id);
                    None
                }
                Ok(GenerationOutcome::Completed(result)) => match classify_reply(&result.text) {
                    ReplyKind::Silent => {
                        debug!(agent_id = %agent_id, message_id = %message_id, "agent stayed silent");
                        self.events
                            .publish(RoundTableEvent::AgentSilent { agent_id, message_id });
                        None
                    }
                    ReplyKind::Visible { text, raised_hand } => {
                        Some(self.append_reply(state, &job, text, raised_hand, result.media))
                    }
                },
            }
        };

        if let Some(message) = appended {
            self.persist("append_message", self.repository.append_message(&message).await);
        }
    }

    /// Append a visible reply, count it against the author's budget, and
    /// route it to the participants it mentions.
    fn append_reply(
        &self,
        state: &mut SchedulerState,
        job: &Job,
        text: String,
        raised_hand: bool,
        media: Vec<MediaAttachment>,
    ) -> Message {
        let agent_id = job.participant.agent_id;
        let replies = state.budget.record_reply(&agent_id);
        let mentions = resolve_mentions(&text, state.round_table.roster(), Some(&agent_id));

        let mut message = Message::agent(
            state.round_table.id,
            agent_id,
            &job.participant.display_name,
            text,
            mentions,
        )
        .with_reply_to(job.entry.message_id)
        .with_raised_hand(raised_hand)
        .with_media(media);
        message.sequence = state.timeline.append(message.clone());

        info!(
            agent_id = %agent_id,
            sequence = message.sequence,
            mentions = message.mentions.len(),
            replies,
            raised_hand,
            "agent reply appended"
        );
        self.publish_appended(&message);
        self.events.publish(RoundTableEvent::GenerationCompleted {
            agent_id,
            message_id: job.entry.message_id,
            duration_ms: job.started.elapsed().as_millis() as u64,
        });

        let ready = state.enqueue(&message.mentions, &message, job.entry.turn_mode, &self.events);
        self.spawn_drains(ready);
        message
    }

    fn publish_cancelled(&self, agent_id: Uuid, message_id: Uuid) {
        info!(agent_id = %agent_id, message_id = %message_id, "generation cancelled");
        self.events
            .publish(RoundTableEvent::GenerationCancelled { agent_id, message_id });
    }

    fn publish_appended(&self, message: &Message) {
        self.events.publish(RoundTableEvent::MessageAppended {
            round_table_id: message.round_table_id,
            message: Box::new(message.clone()),
        });
    }

    fn persist(&self, operation: &str, result: Result<(), RepositoryError>) {
        if let Err(e) = result {
            warn!(operation, error = %e, "repository write failed");
            self.events.publish(RoundTableEvent::PersistenceFailed {
                operation: operation.to_string(),
                error: e.to_string(),
            });
        }
    }
}

impl<R: RoundTableRepository + 'static> std::fmt::Debug for RoundTableOrchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundTableOrchestrator")
            .field("tools", &self.tools.is_some())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// The entry being answered, as the last turn of the request.
fn final_turn(entry: &MailboxEntry) -> ChatMessage {
    let text = match entry.sender_kind {
        SenderKind::System => format!("[notice]: {}", entry.text),
        _ => format!("[{}]: {}", entry.sender_name, entry.text),
    };
    let mut turn = ChatMessage::user(text);
    turn.media = entry.media.clone();
    turn
}
