use crate::state_machine::StateMachineError;

/// Errors surfaced by the orchestrator facade.
///
/// Backend-observed failures (a pipeline erroring out, a fault while polling)
/// are not errors at this boundary; they reach the caller through the terminal
/// outcome notification instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Request rejected before any job state was created
    #[error("Validation error: {0}")]
    Validation(String),

    /// Job id is unknown or the job already reached a terminal state
    #[error("No such active job: {0}")]
    NotFound(String),

    /// The backend refused an operation on an existing job
    #[error("Backend error: {0}")]
    Backend(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StateMachineError> for OrchestratorError {
    fn from(err: StateMachineError) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
