//! In-crate test doubles for the provider, tool registry, and repository
//! ports.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::Stream;
use futures_util::stream;
use uuid::Uuid;

use conclave_types::error::RepositoryError;
use conclave_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, StreamEvent,
    Usage,
};
use conclave_types::message::{Message, Response};
use conclave_types::roundtable::{ParticipantOverrides, RoundTable};
use conclave_types::tool::{ToolDefinition, ToolError, ToolProviderInfo};

use crate::agent::markers::SILENT_MARKER;
use crate::llm::provider::LlmProvider;
use crate::repository::RoundTableRepository;
use crate::tool::registry::ToolRegistry;

/// One scripted provider reply.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Stream(Vec<StreamEvent>),
    Fail(String),
    /// Never resolves; only cancellation ends it.
    Hang,
}

type Responder = dyn Fn(&CompletionRequest) -> Option<FakeReply> + Send + Sync;

/// Completion provider that replays a script.
///
/// Once the script is exhausted every call answers with the silence marker.
pub struct FakeProvider {
    name: String,
    capabilities: ProviderCapabilities,
    script: Mutex<VecDeque<FakeReply>>,
    responder: Option<Box<Responder>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

impl FakeProvider {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: ProviderCapabilities::default(),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self::with_script(
            replies
                .into_iter()
                .map(|r| FakeReply::Text(r.to_string()))
                .collect(),
        )
    }

    pub fn with_script(script: Vec<FakeReply>) -> Self {
        let provider = Self::named("fake");
        *provider.script.lock().unwrap() = script.into();
        provider
    }

    /// Answer from a closure first, falling back to the script when it
    /// returns `None`.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&CompletionRequest) -> Option<FakeReply> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn without_streaming(mut self) -> Self {
        self.capabilities.streaming = false;
        self
    }

    pub fn with_context_limit(mut self, tokens: u32) -> Self {
        self.capabilities.max_context_tokens = tokens;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.requests.clone()
    }

    fn next_reply(&self, request: &CompletionRequest) -> FakeReply {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reply) = self.responder.as_ref().and_then(|r| r(request)) {
            return reply;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FakeReply::Text(SILENT_MARKER.to_string()))
    }
}

fn response(text: String, model: &str) -> CompletionResponse {
    CompletionResponse {
        id: Uuid::now_v7().to_string(),
        content: text,
        reasoning: None,
        media: vec![],
        tool_calls: vec![],
        model: model.to_string(),
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
    }
}

impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let reply = self.next_reply(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            FakeReply::Text(text) => Ok(response(text, &request.model)),
            FakeReply::Stream(events) => {
                let text: String = events
                    .iter()
                    .filter_map(|e| match e {
                        StreamEvent::TextDelta { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                Ok(response(text, &request.model))
            }
            FakeReply::Fail(message) => Err(LlmError::Provider { message }),
            FakeReply::Hang => std::future::pending().await,
        }
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let reply = self.next_reply(&request);
        let delay = self.delay;
        let events: Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>> = match reply {
            FakeReply::Text(text) => Box::pin(stream::iter(vec![
                Ok(StreamEvent::Connected),
                Ok(StreamEvent::TextDelta { text }),
                Ok(StreamEvent::Done),
            ])),
            FakeReply::Stream(events) => Box::pin(stream::iter(events.into_iter().map(Ok))),
            FakeReply::Fail(message) => {
                Box::pin(stream::iter(vec![Err(LlmError::Provider { message })]))
            }
            FakeReply::Hang => Box::pin(stream::pending()),
        };
        match delay {
            Some(delay) => Box::pin(async_stream::stream! {
                tokio::time::sleep(delay).await;
                let mut events = events;
                while let Some(event) = futures_util::StreamExt::next(&mut events).await {
                    yield event;
                }
            }),
            None => events,
        }
    }
}

/// Shared call counters of a [`FakeToolRegistry`].
#[derive(Debug, Default)]
pub struct FakeToolStats {
    connects: AtomicUsize,
    enumerates: AtomicUsize,
}

impl FakeToolStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn enumerates(&self) -> usize {
        self.enumerates.load(Ordering::SeqCst)
    }
}

/// Tool registry with fixed providers; failing providers refuse to connect.
#[derive(Default)]
pub struct FakeToolRegistry {
    providers: Vec<(ToolProviderInfo, Option<Vec<ToolDefinition>>)>,
    stats: Arc<FakeToolStats>,
}

impl FakeToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, name: &str, tools: &[&str]) -> Self {
        let tools = tools
            .iter()
            .map(|t| ToolDefinition::new(*t, format!("{t} tool")))
            .collect();
        self.providers.push((info(name), Some(tools)));
        self
    }

    pub fn with_failing_provider(mut self, name: &str) -> Self {
        self.providers.push((info(name), None));
        self
    }

    pub fn stats(&self) -> Arc<FakeToolStats> {
        self.stats.clone()
    }
}

fn info(name: &str) -> ToolProviderInfo {
    ToolProviderInfo {
        name: name.to_string(),
        description: format!("{name} capability"),
    }
}

impl ToolRegistry for FakeToolRegistry {
    async fn enumerate(&self) -> Result<Vec<ToolProviderInfo>, ToolError> {
        self.stats.enumerates.fetch_add(1, Ordering::SeqCst);
        Ok(self.providers.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn connect(&self, provider: &str) -> Result<Vec<ToolDefinition>, ToolError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        match self.providers.iter().find(|(p, _)| p.name == provider) {
            Some((_, Some(tools))) => Ok(tools.clone()),
            Some((_, None)) => Err(ToolError::Connection {
                provider: provider.to_string(),
                message: "refused".to_string(),
            }),
            None => Err(ToolError::ProviderNotFound(provider.to_string())),
        }
    }
}

/// In-memory repository; `failing()` makes every write return an error.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<HashMap<Uuid, RoundTable>>,
    messages: Mutex<Vec<Message>>,
    responses: Mutex<Vec<Response>>,
    selections: Mutex<Vec<(Uuid, Uuid)>>,
    overrides: Mutex<Vec<(Uuid, ParticipantOverrides)>>,
    fail_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let repo = Self::default();
        repo.fail_writes.store(true, Ordering::SeqCst);
        repo
    }

    pub fn with_round_table(self, round_table: RoundTable, messages: Vec<Message>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(round_table.id, round_table);
        self.messages.lock().unwrap().extend(messages);
        self
    }

    pub fn stored_messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn stored_responses(&self) -> Vec<Response> {
        self.responses.lock().unwrap().clone()
    }

    pub fn stored_selections(&self) -> Vec<(Uuid, Uuid)> {
        self.selections.lock().unwrap().clone()
    }

    pub fn stored_overrides(&self) -> Vec<(Uuid, ParticipantOverrides)> {
        self.overrides.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Connection)
        } else {
            Ok(())
        }
    }
}

impl RoundTableRepository for MemoryRepository {
    async fn append_message(&self, message: &Message) -> Result<(), RepositoryError> {
        self.check()?;
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn append_response(&self, response: &Response) -> Result<(), RepositoryError> {
        self.check()?;
        self.responses.lock().unwrap().push(response.clone());
        Ok(())
    }

    async fn select_response(&self, message_id: &Uuid, response_id: &Uuid) -> Result<(), RepositoryError> {
        self.check()?;
        self.selections
            .lock()
            .unwrap()
            .push((*message_id, *response_id));
        Ok(())
    }

    async fn get_round_table(&self, round_table_id: &Uuid) -> Result<Option<RoundTable>, RepositoryError> {
        Ok(self.tables.lock().unwrap().get(round_table_id).cloned())
    }

    async fn list_messages(&self, round_table_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.round_table_id == *round_table_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.sequence);
        Ok(messages)
    }

    async fn update_participant_overrides(
        &self,
        _round_table_id: &Uuid,
        agent_id: &Uuid,
        overrides: &ParticipantOverrides,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        self.overrides
            .lock()
            .unwrap()
            .push((*agent_id, overrides.clone()));
        Ok(())
    }
}
