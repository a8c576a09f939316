//! Provider registry for runtime provider lookup.
//!
//! Maps model references to boxed completion providers, with an optional
//! default used when a participant's model has no dedicated entry.

use std::collections::HashMap;
use std::sync::Arc;

use super::box_provider::BoxLlmProvider;

/// Registry of available completion providers, indexed by model name.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<BoxLlmProvider>>,
    default: Option<Arc<BoxLlmProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default: None,
        }
    }

    /// Register a provider for the given model name.
    ///
    /// If a provider with this name already exists, it is replaced.
    pub fn register(&mut self, model: impl Into<String>, provider: BoxLlmProvider) {
        self.providers.insert(model.into(), Arc::new(provider));
    }

    /// Set the fallback provider used for unregistered models.
    pub fn set_default(&mut self, provider: BoxLlmProvider) {
        self.default = Some(Arc::new(provider));
    }

    /// Builder-style variant of [`set_default`](Self::set_default).
    pub fn with_default(mut self, provider: BoxLlmProvider) -> Self {
        self.set_default(provider);
        self
    }

    /// Look up the provider registered for exactly this model.
    pub fn get(&self, model: &str) -> Option<Arc<BoxLlmProvider>> {
        self.providers.get(model).cloned()
    }

    /// Resolve a model to a provider, falling back to the default.
    pub fn resolve(&self, model: &str) -> Option<Arc<BoxLlmProvider>> {
        self.get(model).or_else(|| self.default.clone())
    }

    /// List all registered model names, sorted.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
