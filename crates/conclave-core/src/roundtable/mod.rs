pub mod mailbox;
pub mod mention;
pub mod orchestrator;
pub mod timeline;
pub mod turn_budget;

pub use orchestrator::RoundTableOrchestrator;
pub use timeline::Timeline;
