//! Round-table scheduling and the ports it drives.
//!
//! This crate defines the "ports" (completion provider, tool registry,
//! repository traits) that the infrastructure layer implements. It depends
//! only on `conclave-types` -- never on `conclave-infra` or any IO crate.

pub mod agent;
pub mod event;
pub mod llm;
pub mod repository;
pub mod roundtable;
pub mod tool;

#[cfg(test)]
pub(crate) mod test_support;
