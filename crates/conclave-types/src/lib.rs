//! Shared domain types for Conclave.
//!
//! This crate contains the core domain types used across the Conclave
//! round-table engine: RoundTable, Participant, Message, Response,
//! MailboxEntry, completion shapes, tool descriptors, events, and errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod roundtable;
pub mod tool;
