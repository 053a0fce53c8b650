//! Core value types shared across the orchestration components.

use crate::state_machine::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier the orchestrator assigns to a job at creation.
///
/// The backend's own identifier lives inside the job's handle; this one is
/// returned from `execute` so jobs still gated on prerequisites are already
/// addressable for abort.
pub type JobId = String;

/// Immutable pipeline-execution request submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Pipeline document reference, e.g. a YAML pipeline URL
    pub pipeline: String,
    /// Opaque query parameters for the data catalog
    #[serde(default)]
    pub data_query: serde_json::Value,
    /// Jobs that must succeed before this one may be submitted
    #[serde(default)]
    pub prerequisites: Vec<JobId>,
    /// Override for the output dataset type, passed through to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dataset_type: Option<String>,
}

impl ExecutionRequest {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            data_query: serde_json::Value::Null,
            prerequisites: Vec::new(),
            output_dataset_type: None,
        }
    }

    pub fn with_data_query(mut self, data_query: serde_json::Value) -> Self {
        self.data_query = data_query;
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<JobId>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_output_dataset_type(mut self, dataset_type: impl Into<String>) -> Self {
        self.output_dataset_type = Some(dataset_type.into());
        self
    }
}

/// Final outcome of one orchestrated job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    /// Terminal state the job finished in
    pub state: JobState,
    pub error_detail: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// One state change of a tracked job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTransition {
    pub job_id: JobId,
    pub old_state: JobState,
    pub new_state: JobState,
    pub timestamp: DateTime<Utc>,
    pub error_detail: Option<String>,
}
