//! Context-window budget derived from a model's context limit.

use conclave_types::config::ContextConfig;
use conclave_types::llm::ProviderCapabilities;

/// History budget for one model.
///
/// `threshold` is the share of the context limit available to history
/// (70% by default). Summarization is advised once estimated usage passes
/// `summarize_ratio` of that threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    pub max_context_tokens: u32,
    pub threshold: u32,
    summarize_ratio: f64,
}

impl TokenBudget {
    pub fn new(max_context: u32, config: &ContextConfig) -> Self {
        let ratio = config.window_ratio.clamp(0.0, 1.0);
        Self {
            max_context_tokens: max_context,
            threshold: (f64::from(max_context) * ratio).floor() as u32,
            summarize_ratio: config.summarize_ratio.clamp(0.0, 1.0),
        }
    }

    /// Derive a budget from provider capabilities.
    pub fn from_capabilities(caps: &ProviderCapabilities, config: &ContextConfig) -> Self {
        Self::new(caps.max_context_tokens, config)
    }

    /// History tokens left after `used` tokens.
    pub fn remaining(&self, used: u32) -> u32 {
        self.threshold.saturating_sub(used)
    }

    /// Whether estimated history usage is high enough to summarize.
    pub fn should_summarize(&self, history_tokens: u32) -> bool {
        f64::from(history_tokens) > f64::from(self.threshold) * self.summarize_ratio
    }
}
