//! Signal backend variant.
//!
//! Submits and observes jobs through namespaced keys on a shared store,
//! using `redis::aio::ConnectionManager` for async multiplexed connections.
//! The store has no request/response correlation, so a status key that does
//! not exist yet is read as `queued` for a bounded grace period after
//! submission; absence beyond that is a fault.
//!
//! Key scheme: `jobs:{index}:{job_id}:status` holds the canonical status
//! vocabulary, `jobs:{index}:{job_id}:descriptor` holds the submitted
//! request. Writes are namespaced by the configured deployment index.

use super::{BackendClient, BackendError, BackendKind, JobHandle, JobStatus, PollError};
use crate::orchestration::types::ExecutionRequest;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

fn status_key(index: u32, job_id: &str) -> String {
    format!("jobs:{index}:{job_id}:status")
}

fn descriptor_key(index: u32, job_id: &str) -> String {
    format!("jobs:{index}:{job_id}:descriptor")
}

/// Interpret one status-key read.
///
/// A present value must parse as the canonical vocabulary. An absent key
/// reads as `queued` while the submission is younger than the grace period;
/// beyond that, or for a job with no recorded submission time, absence is a
/// permanent fault.
fn interpret_status(
    raw: Option<&str>,
    job_id: &str,
    submission_age: Option<Duration>,
    absence_grace: Duration,
) -> Result<JobStatus, PollError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|e| PollError::Permanent(format!("Unrecognized status value: {e}"))),
        None => match submission_age {
            // Not an error while the service has not picked the job up yet
            Some(age) if age <= absence_grace => Ok(JobStatus::Queued),
            _ => Err(PollError::Permanent(format!(
                "Status key for job {job_id} absent beyond grace period"
            ))),
        },
    }
}

/// Submission timestamps backing the grace-period decision.
///
/// Entries past the grace period can no longer change any poll result, so
/// they are pruned opportunistically on every submit and poll; jobs the
/// orchestrator retires without a final poll do not accumulate here.
#[derive(Debug, Clone, Default)]
struct SubmissionTracker {
    entries: DashMap<String, Instant>,
}

impl SubmissionTracker {
    fn record(&self, job_id: &str) {
        self.entries.insert(job_id.to_owned(), Instant::now());
    }

    fn age(&self, job_id: &str) -> Option<Duration> {
        self.entries.get(job_id).map(|t| t.elapsed())
    }

    fn forget(&self, job_id: &str) {
        self.entries.remove(job_id);
    }

    fn prune(&self, max_age: Duration) {
        self.entries.retain(|_, t| t.elapsed() <= max_age);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Backend client for a key/value-signaled execution service
#[derive(Clone)]
pub struct SignalBackend {
    connection_manager: redis::aio::ConnectionManager,
    index: u32,
    absence_grace: Duration,
    submissions: SubmissionTracker,
}

impl std::fmt::Debug for SignalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBackend")
            .field("index", &self.index)
            .field("absence_grace", &self.absence_grace)
            .field("tracked_submissions", &self.submissions.len())
            .finish()
    }
}

impl SignalBackend {
    /// Connect to the shared store at `store_address`, scoping all keys to
    /// the given deployment index.
    pub async fn connect(
        store_address: &str,
        index: u32,
        absence_grace: Duration,
    ) -> Result<Self, BackendError> {
        let client = redis::Client::open(store_address).map_err(|e| {
            BackendError::Unreachable(format!("Failed to create store client: {e}"))
        })?;
        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                BackendError::Unreachable(format!("Failed to connect to store: {e}"))
            })?;

        debug!(index = index, "Signal backend connected");
        Ok(Self {
            connection_manager,
            index,
            absence_grace,
            submissions: SubmissionTracker::default(),
        })
    }
}

#[async_trait]
impl BackendClient for SignalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Signal
    }

    async fn submit(&self, request: &ExecutionRequest) -> Result<JobHandle, BackendError> {
        self.submissions.prune(self.absence_grace);

        let job_id = Uuid::new_v4().to_string();
        let descriptor = serde_json::to_string(request)
            .map_err(|e| BackendError::Protocol(format!("Unserializable request: {e}")))?;

        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(descriptor_key(self.index, &job_id))
            .arg(&descriptor)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| BackendError::Unreachable(format!("Store SET failed: {e}")))?;

        self.submissions.record(&job_id);
        info!(job_id = %job_id, index = self.index, "Job descriptor written");
        Ok(JobHandle::new(job_id))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, PollError> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(status_key(self.index, &handle.id))
            .query_async(&mut conn)
            .await
            .map_err(|e| PollError::Transient(format!("Store GET failed: {e}")))?;

        self.submissions.prune(self.absence_grace);
        let status = interpret_status(
            raw.as_deref(),
            &handle.id,
            self.submissions.age(&handle.id),
            self.absence_grace,
        )?;
        if status.is_terminal() {
            self.submissions.forget(&handle.id);
        }
        Ok(status)
    }

    async fn abort(&self, handle: &JobHandle) -> Result<(), BackendError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(status_key(self.index, &handle.id))
            .arg(JobStatus::Aborted.to_string())
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| BackendError::Unreachable(format!("Store SET failed: {e}")))?;

        self.submissions.forget(&handle.id);
        info!(job_id = %handle.id, "Abort status written");
        Ok(())
    }
}
