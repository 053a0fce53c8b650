use crate::backend::{BackendKind, JobHandle};
use crate::orchestration::types::{ExecutionRequest, JobId};
use crate::state_machine::{JobState, JobStateMachine};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// One orchestrated execution request.
///
/// Owned by the orchestrator's active-job table for exactly one
/// execute/abort cycle; the poll loop shares it read-only through `Arc`.
/// All mutable lifecycle state lives in the embedded state machine; the
/// backend handle is written once at submission.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    request: ExecutionRequest,
    backend_kind: BackendKind,
    created_at: DateTime<Utc>,
    machine: JobStateMachine,
    handle: Mutex<Option<JobHandle>>,
}

impl Job {
    pub fn new(request: ExecutionRequest, backend_kind: BackendKind) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            machine: JobStateMachine::new(id.clone()),
            id,
            request,
            backend_kind,
            created_at: Utc::now(),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn request(&self) -> &ExecutionRequest {
        &self.request
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn machine(&self) -> &JobStateMachine {
        &self.machine
    }

    /// Current state snapshot
    pub fn state(&self) -> JobState {
        self.machine.state()
    }

    /// Record the handle the backend assigned at submission
    pub fn set_handle(&self, handle: JobHandle) {
        *self.handle.lock() = Some(handle);
    }

    /// Backend handle, once submitted
    pub fn handle(&self) -> Option<JobHandle> {
        self.handle.lock().clone()
    }
}
