//! Event bus for round-table observers.
//!
//! Provides an `EventBus` that distributes `RoundTableEvent`s to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
