//! # Backend Clients
//!
//! Polymorphic capability over the execution services that actually run
//! pipelines. Three variants exist: a REST service submitted to and polled
//! over HTTP, a Signal service observed through namespaced keys on a shared
//! store, and a no-I/O simulation used in tests and demos.
//!
//! Exactly one variant is constructed at startup from validated
//! configuration; everything downstream works against the [`BackendClient`]
//! trait object.

pub mod rest;
pub mod signal;
pub mod simulation;

pub use rest::RestBackend;
pub use signal::SignalBackend;
pub use simulation::SimulationBackend;

use crate::orchestration::types::ExecutionRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend variant a job was submitted to, fixed for the job's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Rest,
    Signal,
    Simulation,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => write!(f, "rest"),
            Self::Signal => write!(f, "signal"),
            Self::Simulation => write!(f, "simulation"),
        }
    }
}

/// Canonical status vocabulary shared by all backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Executing,
    Completed,
    Error,
    Aborted,
}

impl JobStatus {
    /// Check if the backend considers the job finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Aborted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Executing => write!(f, "executing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

/// Opaque handle to a job living on a backend.
///
/// `id` is unique within the backend's namespace. `status_url` is only
/// populated by the REST variant, which polls a per-job URL returned at
/// submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub status_url: Option<String>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status_url: None,
        }
    }

    pub fn with_status_url(id: impl Into<String>, status_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status_url: Some(status_url.into()),
        }
    }
}

/// Errors from submit/abort calls against a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend refused the request; retrying will not help
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    /// The backend could not be reached; the operation may be retried
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with something the client cannot interpret
    #[error("Backend protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Check whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Errors from polling a job's status
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Network trouble or timeout; retried by the poll loop up to the
    /// configured threshold
    #[error("Transient poll failure: {0}")]
    Transient(String),

    /// The backend reports a malformed or unknown job; the job faults
    #[error("Permanent poll failure: {0}")]
    Permanent(String),
}

/// Capability implemented by every execution service variant.
///
/// Submit hands the request to the service and returns a handle; poll reads
/// the job's current status; abort asks the service to stop the job.
/// Transient failures are reported, never retried internally — retry policy
/// belongs to the poll loop.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Which variant this client is
    fn kind(&self) -> BackendKind;

    /// Hand an execution request to the backend
    async fn submit(&self, request: &ExecutionRequest) -> Result<JobHandle, BackendError>;

    /// Read the current status of a submitted job
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, PollError>;

    /// Ask the backend to stop a submitted job
    async fn abort(&self, handle: &JobHandle) -> Result<(), BackendError>;
}
