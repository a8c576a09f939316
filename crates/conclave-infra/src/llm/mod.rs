//! Completion provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined
//! in `conclave-core`.
//!
//! [`LlmProvider`]: conclave_core::llm::provider::LlmProvider

pub mod scripted;

pub use scripted::ScriptedProvider;
