use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for an orchestrated pipeline execution job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, prerequisites not yet satisfied
    Pending,
    /// Prerequisite gate passed, submission to the backend in progress
    Submitting,
    /// Accepted by the backend and being polled for progress
    Running,
    /// Pipeline finished successfully
    Succeeded,
    /// Pipeline failed, or submission was permanently rejected
    Failed,
    /// Backend malfunction or poll-failure threshold exceeded
    Faulted,
    /// Execution stopped on caller request
    Aborted,
}

impl JobState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Faulted | Self::Aborted
        )
    }

    /// Check if this is an active state (the poll loop still owns the job)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Running)
    }

    /// Check if a dependent job gated on this state may be submitted
    pub fn satisfies_prerequisite(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitting => write!(f, "submitting"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Faulted => write!(f, "faulted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "submitting" => Ok(Self::Submitting),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "faulted" => Ok(Self::Faulted),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Faulted.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Submitting.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn test_prerequisite_satisfaction() {
        assert!(JobState::Succeeded.satisfies_prerequisite());
        assert!(!JobState::Failed.satisfies_prerequisite());
        assert!(!JobState::Faulted.satisfies_prerequisite());
        assert!(!JobState::Aborted.satisfies_prerequisite());
        assert!(!JobState::Running.satisfies_prerequisite());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(JobState::Submitting.to_string(), "submitting");
        assert_eq!("succeeded".parse::<JobState>().unwrap(), JobState::Succeeded);
        assert!("cancelled".parse::<JobState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&JobState::Faulted).unwrap();
        assert_eq!(json, "\"faulted\"");
        let parsed: JobState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JobState::Faulted);
    }
}
