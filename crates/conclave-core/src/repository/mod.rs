//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (conclave-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod round_table;

pub use round_table::RoundTableRepository;
