//! OpenTelemetry GenAI Semantic Convention attribute constants.
//!
//! The engine's `gen_ai.generate`, `summarize_context` and
//! `round_table.drain` spans use these field names. All constants are string slices usable in `tracing::span!`
//! and `tracing::info_span!` as `{ GEN_AI_REQUEST_MODEL } = ...`.

// --- Required attributes ---

/// The name of the operation being performed (e.g., "chat", "invoke_agent").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the completion provider.
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";

// --- Recommended attributes ---

/// The model ID requested.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The sampling temperature for the request.
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";

/// The maximum number of output tokens requested.
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";

/// Whether the request streamed.
pub const GEN_AI_REQUEST_STREAM: &str = "gen_ai.request.stream";

/// Number of tools bound to the request.
pub const GEN_AI_REQUEST_TOOLS: &str = "gen_ai.request.tools";

// --- Agent-specific attributes ---

/// The agent id of the participant generating.
pub const GEN_AI_AGENT_ID: &str = "gen_ai.agent.id";

// --- Operation name values ---

/// Standard chat completion operation.
pub const OP_CHAT: &str = "chat";

/// Agent invocation operation.
pub const OP_INVOKE_AGENT: &str = "invoke_agent";

/// Context summarization when the window fills up.
pub const OP_SUMMARIZE_CONTEXT: &str = "summarize_context";

/// A whole scripted round table run.
pub const OP_SIMULATE_ROUND_TABLE: &str = "simulate_round_table";
