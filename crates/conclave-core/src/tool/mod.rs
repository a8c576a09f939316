//! External tool negotiation for round-table agents.
//!
//! - `ToolRegistry`: RPITIT port over enabled external tool providers
//! - `BoxToolRegistry`: object-safe wrapper for dynamic dispatch
//! - `ToolNegotiator`: two-phase tool augmentation around a generation

pub mod negotiator;
pub mod registry;

pub use negotiator::ToolNegotiator;
pub use registry::{BoxToolRegistry, ToolRegistry};
