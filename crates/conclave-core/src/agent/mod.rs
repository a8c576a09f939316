//! Per-agent generation machinery.
//!
//! - `FramingBuilder`: persona, roster and reply conventions as an XML-tagged system prompt
//! - `ContextWindowBuilder`: the shared timeline seen from one agent, bounded by its model budget
//! - `ContextSummarizer`: condenses older timeline entries once the window fills up
//! - `GenerationSession`: one streaming or single-shot completion with cooperative cancellation
//! - `markers`: silence, raise-hand and tool-request markers in reply text

pub mod context;
pub mod generation;
pub mod markers;
pub mod prompt;
pub mod summarizer;
