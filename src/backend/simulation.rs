//! No-I/O backend for tests and demos.
//!
//! Recognizes exactly three pipeline identifiers: `true.yaml` always reaches
//! a successful completion, `false.yaml` always errors, and `fault.yaml`
//! models an internal execution-service malfunction (distinct from a
//! pipeline failure). All other submitted parameters are accepted but
//! ignored; unknown pipeline identifiers are rejected at submission.

use super::{BackendClient, BackendError, BackendKind, JobHandle, JobStatus, PollError};
use crate::orchestration::types::ExecutionRequest;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

pub const PIPELINE_SUCCEEDS: &str = "true.yaml";
pub const PIPELINE_FAILS: &str = "false.yaml";
pub const PIPELINE_FAULTS: &str = "fault.yaml";

#[derive(Debug)]
struct SimulatedJob {
    pipeline: String,
    polls_remaining: u32,
}

/// Backend variant that simulates execution without any network or store I/O
#[derive(Debug)]
pub struct SimulationBackend {
    jobs: DashMap<String, SimulatedJob>,
    /// How many polls report `executing` before the terminal status appears
    polls_until_done: u32,
}

impl SimulationBackend {
    pub fn new() -> Self {
        Self::with_polls_until_done(1)
    }

    /// Configure how many non-terminal polls each job reports first, so
    /// callers can observe the executing phase.
    pub fn with_polls_until_done(polls_until_done: u32) -> Self {
        Self {
            jobs: DashMap::new(),
            polls_until_done,
        }
    }

    /// Number of jobs currently simulated
    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for SimulationBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulation
    }

    async fn submit(&self, request: &ExecutionRequest) -> Result<JobHandle, BackendError> {
        if ![PIPELINE_SUCCEEDS, PIPELINE_FAILS, PIPELINE_FAULTS]
            .contains(&request.pipeline.as_str())
        {
            return Err(BackendError::Rejected(format!(
                "Unknown simulated pipeline: {}",
                request.pipeline
            )));
        }

        let id = format!("{}-{}", request.pipeline, Uuid::new_v4());
        self.jobs.insert(
            id.clone(),
            SimulatedJob {
                pipeline: request.pipeline.clone(),
                polls_remaining: self.polls_until_done,
            },
        );
        info!(job_id = %id, pipeline = %request.pipeline, "Simulated submission accepted");
        Ok(JobHandle::new(id))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, PollError> {
        let pipeline = {
            let mut entry = self
                .jobs
                .get_mut(&handle.id)
                .ok_or_else(|| PollError::Permanent(format!("No such job id: {}", handle.id)))?;
            if entry.polls_remaining > 0 {
                entry.polls_remaining -= 1;
                return Ok(JobStatus::Executing);
            }
            entry.pipeline.clone()
        };

        self.jobs.remove(&handle.id);
        match pipeline.as_str() {
            PIPELINE_SUCCEEDS => Ok(JobStatus::Completed),
            PIPELINE_FAILS => Ok(JobStatus::Error),
            PIPELINE_FAULTS => Err(PollError::Permanent(
                "Simulation cannot contact execution service".into(),
            )),
            other => Err(PollError::Permanent(format!(
                "Unknown simulated pipeline: {other}"
            ))),
        }
    }

    async fn abort(&self, handle: &JobHandle) -> Result<(), BackendError> {
        match self.jobs.remove(&handle.id) {
            Some(_) => {
                info!(job_id = %handle.id, "Simulated job aborted");
                Ok(())
            }
            None => Err(BackendError::Rejected(format!(
                "No such job id: {}",
                handle.id
            ))),
        }
    }
}
