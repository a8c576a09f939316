//! Completion provider abstractions for Conclave.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: model name to provider lookup
//! - `TokenBudget` / `TokenEstimator`: context window accounting

pub mod box_provider;
pub mod estimator;
pub mod provider;
pub mod registry;
pub mod token_budget;
