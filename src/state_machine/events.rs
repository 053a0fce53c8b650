use crate::backend::JobStatus;
use serde::{Deserialize, Serialize};

/// Events that can trigger job state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// All prerequisite jobs reached a successful terminal state
    PrerequisitesSatisfied,
    /// A prerequisite job failed; the dependent job resolves without submission
    PrerequisiteFailed(String),
    /// The backend accepted the submission and returned a handle
    Submitted,
    /// The backend permanently rejected the submission
    SubmissionRejected(String),
    /// A poll observed the given backend status
    StatusObserved(JobStatus),
    /// The backend malfunctioned or consecutive transient poll failures
    /// crossed the configured threshold
    Fault(String),
    /// Caller requested the job be stopped
    Abort,
}

impl JobEvent {
    /// String representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PrerequisitesSatisfied => "prerequisites_satisfied",
            Self::PrerequisiteFailed(_) => "prerequisite_failed",
            Self::Submitted => "submitted",
            Self::SubmissionRejected(_) => "submission_rejected",
            Self::StatusObserved(_) => "status_observed",
            Self::Fault(_) => "fault",
            Self::Abort => "abort",
        }
    }

    /// Extract the error detail if this event carries one
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::PrerequisiteFailed(msg)
            | Self::SubmissionRejected(msg)
            | Self::Fault(msg) => Some(msg),
            _ => None,
        }
    }
}
