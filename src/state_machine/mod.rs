// State machine module for pipeline execution jobs
//
// Tracks one submitted execution request through its lifecycle with
// compare-and-set transition semantics, so the race between caller-initiated
// abort and backend-observed completion stays explicit and testable.

pub mod errors;
pub mod events;
pub mod job_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::JobEvent;
pub use job_state_machine::{JobStateMachine, Transition};
pub use states::JobState;
