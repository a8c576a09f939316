//! Infrastructure layer for Conclave.
//!
//! Contains implementations of the ports defined in `conclave-core`: an
//! in-memory round-table repository, a scripted completion provider, and a
//! static tool registry. Also loads the engine configuration and scripted
//! scenarios from TOML.

pub mod config;
pub mod llm;
pub mod repository;
pub mod scenario;
pub mod tool;
