use super::{
    errors::{StateMachineError, StateMachineResult},
    events::JobEvent,
    states::JobState,
};
use crate::backend::JobStatus;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// A state change that was actually applied
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: JobState,
    pub to: JobState,
    /// Error detail carried by the triggering event, if any
    pub error_detail: Option<String>,
    /// True exactly once per job: on the first entry into a terminal state
    pub deliver_outcome: bool,
}

/// Bookkeeping mutated atomically with each transition
#[derive(Debug)]
struct Bookkeeping {
    state: JobState,
    last_polled_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    poll_failures: u32,
    outcome_delivered: bool,
}

/// Thread-safe lifecycle tracker for one submitted execution request.
///
/// Transitions use compare-and-set semantics: an event is applied only when
/// the current state still equals the pre-state the writer observed. The
/// writer losing a race (abort against a poll-observed completion, or two
/// concurrent polls) gets `Ok(None)` and must not act further on the job.
#[derive(Debug)]
pub struct JobStateMachine {
    job_id: String,
    inner: Mutex<Bookkeeping>,
}

impl JobStateMachine {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            inner: Mutex::new(Bookkeeping {
                state: JobState::default(),
                last_polled_at: None,
                last_error: None,
                poll_failures: 0,
                outcome_delivered: false,
            }),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current state snapshot
    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    /// Last error recorded against this job, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Timestamp of the most recent successful poll
    pub fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_polled_at
    }

    /// Current count of consecutive transient poll failures
    pub fn poll_failures(&self) -> u32 {
        self.inner.lock().poll_failures
    }

    /// Record a successful poll: stamps `last_polled_at` and resets the
    /// consecutive-failure counter.
    pub fn record_poll_success(&self) {
        let mut inner = self.inner.lock();
        inner.last_polled_at = Some(Utc::now());
        inner.poll_failures = 0;
    }

    /// Record a transient poll failure and return the new consecutive count
    pub fn record_poll_failure(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.poll_failures += 1;
        inner.poll_failures
    }

    /// Attempt a compare-and-set transition.
    ///
    /// Returns `Ok(Some(transition))` when applied, `Ok(None)` when the
    /// current state no longer matches `expected` (the caller lost a race
    /// and must no-op), and an error when the event is illegal from
    /// `expected` — including any attempt to leave a terminal state.
    pub fn apply(
        &self,
        expected: JobState,
        event: &JobEvent,
    ) -> StateMachineResult<Option<Transition>> {
        let mut inner = self.inner.lock();
        if inner.state != expected {
            return Ok(None);
        }

        let target = Self::determine_target_state(expected, event)?;
        inner.state = target;
        if let Some(msg) = event.error_message() {
            inner.last_error = Some(msg.to_owned());
        }

        let deliver_outcome = target.is_terminal() && !inner.outcome_delivered;
        if deliver_outcome {
            inner.outcome_delivered = true;
        }

        Ok(Some(Transition {
            from: expected,
            to: target,
            error_detail: inner.last_error.clone(),
            deliver_outcome,
        }))
    }

    /// Determine the target state for an event from a given state
    fn determine_target_state(
        current: JobState,
        event: &JobEvent,
    ) -> StateMachineResult<JobState> {
        if current.is_terminal() {
            return Err(StateMachineError::TerminalState { state: current });
        }

        let target = match (current, event) {
            // Prerequisite gate
            (JobState::Pending, JobEvent::PrerequisitesSatisfied) => JobState::Submitting,
            (JobState::Pending, JobEvent::PrerequisiteFailed(_)) => JobState::Failed,

            // Submission
            (JobState::Submitting, JobEvent::Submitted) => JobState::Running,
            (JobState::Submitting, JobEvent::SubmissionRejected(_)) => JobState::Failed,

            // Backend observation
            (JobState::Running, JobEvent::StatusObserved(status)) => match status {
                JobStatus::Queued | JobStatus::Executing => JobState::Running,
                JobStatus::Completed => JobState::Succeeded,
                JobStatus::Error => JobState::Failed,
                JobStatus::Aborted => JobState::Aborted,
            },
            (JobState::Running, JobEvent::Fault(_)) => JobState::Faulted,

            // Caller-initiated abort from any non-terminal state
            (_, JobEvent::Abort) => JobState::Aborted,

            (from, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from,
                    event: event.event_type(),
                })
            }
        };

        Ok(target)
    }
}
