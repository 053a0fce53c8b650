use crate::state_machine::states::JobState;

/// Errors raised while applying job state transitions
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    /// The event is not legal from the current state
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: JobState, event: &'static str },

    /// A transition was attempted out of a terminal state. This means the
    /// poll loop failed to retire the job and is an internal invariant
    /// violation, not a recoverable condition.
    #[error("Transition attempted on terminal state {state}")]
    TerminalState { state: JobState },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
