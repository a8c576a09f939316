//! Tool registry implementations.

pub mod static_registry;

pub use static_registry::{StaticToolProvider, StaticToolRegistry};
