//! Event system for job lifecycle notifications.
//!
//! One event is published per state transition and exactly one outcome event
//! per job, on first entry into a terminal state. The upstream messaging
//! transport subscribes here; the orchestrator does not know or care whether
//! anyone is listening.

pub mod publisher;

pub use publisher::{EventPublisher, OrchestratorEvent};
