use crate::backend::{BackendClient, PollError, RestBackend, SignalBackend, SimulationBackend};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::events::{EventPublisher, OrchestratorEvent};
use crate::orchestration::job::Job;
use crate::orchestration::poll_loop::PollLoop;
use crate::orchestration::prerequisites::{PrerequisiteResolver, Readiness};
use crate::orchestration::types::{ExecutionRequest, JobId, JobOutcome, JobTransition};
use crate::state_machine::{JobEvent, JobState, Transition};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared state and transition plumbing used by both the facade and the
/// poll loop.
///
/// The facade is the sole writer of caller-triggered transitions (abort);
/// the poll loop is the sole writer of backend-observed ones. Both funnel
/// through [`OrchestratorCore::apply_event`], which publishes transition
/// events and retires jobs on first entry into a terminal state.
pub(crate) struct OrchestratorCore {
    pub(crate) backend: Arc<dyn BackendClient>,
    pub(crate) jobs: Arc<DashMap<JobId, Arc<Job>>>,
    outcomes: Arc<DashMap<JobId, JobState>>,
    pub(crate) resolver: PrerequisiteResolver,
    publisher: EventPublisher,
    poll_failure_threshold: u32,
}

impl OrchestratorCore {
    fn new(backend: Arc<dyn BackendClient>, poll_failure_threshold: u32) -> Self {
        let jobs: Arc<DashMap<JobId, Arc<Job>>> = Arc::new(DashMap::new());
        let outcomes: Arc<DashMap<JobId, JobState>> = Arc::new(DashMap::new());
        Self {
            resolver: PrerequisiteResolver::new(jobs.clone(), outcomes.clone()),
            backend,
            jobs,
            outcomes,
            publisher: EventPublisher::default(),
            poll_failure_threshold,
        }
    }

    /// Apply a compare-and-set transition and handle its consequences.
    ///
    /// Returns the applied transition, or `None` when the writer lost a
    /// state race (a silent no-op). A transition rejected by the state
    /// machine is an internal invariant violation and is logged as fatal
    /// for the operator; it is never surfaced to the caller.
    pub(crate) fn apply_event(
        &self,
        job: &Arc<Job>,
        expected: JobState,
        event: &JobEvent,
    ) -> Option<Transition> {
        match job.machine().apply(expected, event) {
            Ok(Some(transition)) => {
                if transition.from != transition.to {
                    debug!(
                        job_id = %job.id(),
                        from = %transition.from,
                        to = %transition.to,
                        event = event.event_type(),
                        "Job state transition"
                    );
                    self.publisher
                        .publish(OrchestratorEvent::Transition(JobTransition {
                            job_id: job.id().clone(),
                            old_state: transition.from,
                            new_state: transition.to,
                            timestamp: Utc::now(),
                            error_detail: transition.error_detail.clone(),
                        }));
                }
                if transition.deliver_outcome {
                    self.retire(job, &transition);
                }
                Some(transition)
            }
            Ok(None) => {
                debug!(
                    job_id = %job.id(),
                    event = event.event_type(),
                    "Transition lost a state race, ignoring"
                );
                None
            }
            Err(err) => {
                error!(
                    job_id = %job.id(),
                    event = event.event_type(),
                    error = %err,
                    "FATAL: job state machine invariant violated"
                );
                None
            }
        }
    }

    /// Remove a terminal job from the active set, record its outcome for
    /// prerequisite queries, and deliver the one-shot outcome notification.
    fn retire(&self, job: &Arc<Job>, transition: &Transition) {
        self.jobs.remove(job.id());
        self.outcomes.insert(job.id().clone(), transition.to);
        info!(
            job_id = %job.id(),
            state = %transition.to,
            error_detail = transition.error_detail.as_deref(),
            "Job reached terminal state"
        );
        self.publisher.publish(OrchestratorEvent::Outcome(JobOutcome {
            job_id: job.id().clone(),
            state: transition.to,
            error_detail: transition.error_detail.clone(),
            finished_at: Utc::now(),
        }));
    }

    /// Evaluate the prerequisite gate for a pending job and submit it if
    /// the gate passes.
    pub(crate) async fn gate(&self, job: &Arc<Job>) {
        match self.resolver.check_ready(&job.request().prerequisites) {
            Readiness::Ready => {
                if self
                    .apply_event(job, JobState::Pending, &JobEvent::PrerequisitesSatisfied)
                    .is_some()
                {
                    self.submit(job).await;
                }
            }
            Readiness::Failed { failed_id, state } => {
                self.apply_event(
                    job,
                    JobState::Pending,
                    &JobEvent::PrerequisiteFailed(format!(
                        "Prerequisite job {failed_id} resolved {state}"
                    )),
                );
            }
            Readiness::NotReady { blocking } => {
                debug!(
                    job_id = %job.id(),
                    blocking = ?blocking,
                    "Prerequisites not yet satisfied"
                );
            }
        }
    }

    /// Submit (or re-submit) a job in the submitting state. Transient
    /// submission failures are retried on later passes, bounded by the same
    /// consecutive-failure threshold the poll path uses.
    pub(crate) async fn submit(&self, job: &Arc<Job>) {
        match self.backend.submit(job.request()).await {
            Ok(handle) => {
                debug!(job_id = %job.id(), backend_job_id = %handle.id, "Submission accepted");
                job.set_handle(handle);
                self.apply_event(job, JobState::Submitting, &JobEvent::Submitted);
            }
            Err(err) if err.is_transient() => {
                let failures = job.machine().record_poll_failure();
                warn!(
                    job_id = %job.id(),
                    failures = failures,
                    error = %err,
                    "Transient submission failure"
                );
                if failures > self.poll_failure_threshold {
                    self.apply_event(
                        job,
                        JobState::Submitting,
                        &JobEvent::SubmissionRejected(format!(
                            "Backend unreachable after {failures} submission attempts: {err}"
                        )),
                    );
                }
            }
            Err(err) => {
                self.apply_event(
                    job,
                    JobState::Submitting,
                    &JobEvent::SubmissionRejected(err.to_string()),
                );
            }
        }
    }

    /// Poll one running job and feed the observation into its state machine
    pub(crate) async fn poll_job(&self, job: &Arc<Job>) {
        let Some(handle) = job.handle() else {
            error!(job_id = %job.id(), "FATAL: running job has no backend handle");
            self.apply_event(
                job,
                JobState::Running,
                &JobEvent::Fault("Running job has no backend handle".into()),
            );
            return;
        };

        match self.backend.poll(&handle).await {
            Ok(status) => {
                job.machine().record_poll_success();
                self.apply_event(job, JobState::Running, &JobEvent::StatusObserved(status));
            }
            Err(PollError::Transient(msg)) => {
                let failures = job.machine().record_poll_failure();
                warn!(
                    job_id = %job.id(),
                    failures = failures,
                    threshold = self.poll_failure_threshold,
                    error = %msg,
                    "Transient poll failure"
                );
                if failures > self.poll_failure_threshold {
                    self.apply_event(
                        job,
                        JobState::Running,
                        &JobEvent::Fault(format!(
                            "{failures} consecutive transient poll failures: {msg}"
                        )),
                    );
                }
            }
            Err(PollError::Permanent(msg)) => {
                self.apply_event(job, JobState::Running, &JobEvent::Fault(msg));
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.publisher.subscribe()
    }
}

/// Public entry point for pipeline execution requests.
///
/// Owns the active-job table and a single periodic poll loop for the
/// lifetime of the process; [`Orchestrator::shutdown`] stops the loop and
/// waits for any in-flight polling pass to finish.
pub struct Orchestrator {
    core: Arc<OrchestratorCore>,
    shutdown: Arc<Notify>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the backend named by the configuration and start orchestrating
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;

        let backend: Arc<dyn BackendClient> = match config.backend_kind() {
            crate::backend::BackendKind::Simulation => Arc::new(SimulationBackend::new()),
            crate::backend::BackendKind::Rest => {
                let url = config.endpoint_url.as_deref().unwrap_or_default();
                Arc::new(
                    RestBackend::new(url, config.request_timeout())
                        .map_err(|e| OrchestratorError::Validation(e.to_string()))?,
                )
            }
            crate::backend::BackendKind::Signal => {
                let address = config.store_address.as_deref().unwrap_or_default();
                Arc::new(
                    SignalBackend::connect(address, config.index, config.signal_absence_grace())
                        .await
                        .map_err(|e| OrchestratorError::Backend(e.to_string()))?,
                )
            }
        };

        Ok(Self::with_backend(&config, backend))
    }

    /// Start orchestrating against an already-constructed backend client
    pub fn with_backend(config: &OrchestratorConfig, backend: Arc<dyn BackendClient>) -> Self {
        let core = Arc::new(OrchestratorCore::new(
            backend,
            config.poll_failure_threshold,
        ));
        let shutdown = Arc::new(Notify::new());
        let poll_loop = PollLoop::new(core.clone(), config.poll_interval(), shutdown.clone());
        let poll_task = tokio::spawn(poll_loop.run());

        info!(
            backend = %core.backend.kind(),
            poll_interval_secs = config.poll_interval_secs,
            poll_failure_threshold = config.poll_failure_threshold,
            "Orchestrator started"
        );

        Self {
            core,
            shutdown,
            poll_task: Mutex::new(Some(poll_task)),
        }
    }

    /// Accept a pipeline-execution request.
    ///
    /// Returns the orchestrator-assigned job id. Fails with a validation
    /// error when the pipeline identifier is empty or the backend is
    /// unreachable at submission time; a permanent backend rejection or a
    /// failed prerequisite instead resolves the job to its failed terminal
    /// state and delivers the outcome notification.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<JobId> {
        if request.pipeline.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "Pipeline identifier must not be empty".into(),
            ));
        }

        let job = Arc::new(Job::new(request, self.core.backend.kind()));
        self.core.jobs.insert(job.id().clone(), job.clone());
        info!(
            job_id = %job.id(),
            pipeline = %job.request().pipeline,
            prerequisites = job.request().prerequisites.len(),
            "Execution request accepted"
        );

        match self.core.resolver.check_ready(&job.request().prerequisites) {
            Readiness::Ready => {
                if self
                    .core
                    .apply_event(&job, JobState::Pending, &JobEvent::PrerequisitesSatisfied)
                    .is_some()
                {
                    match self.core.backend.submit(job.request()).await {
                        Ok(handle) => {
                            job.set_handle(handle);
                            self.core
                                .apply_event(&job, JobState::Submitting, &JobEvent::Submitted);
                        }
                        Err(err) if err.is_transient() => {
                            // The job never reached the backend; reject the
                            // request outright instead of leaving it queued.
                            self.core.jobs.remove(job.id());
                            return Err(OrchestratorError::Validation(format!(
                                "Backend unreachable at submission: {err}"
                            )));
                        }
                        Err(err) => {
                            self.core.apply_event(
                                &job,
                                JobState::Submitting,
                                &JobEvent::SubmissionRejected(err.to_string()),
                            );
                        }
                    }
                }
            }
            Readiness::Failed { failed_id, state } => {
                self.core.apply_event(
                    &job,
                    JobState::Pending,
                    &JobEvent::PrerequisiteFailed(format!(
                        "Prerequisite job {failed_id} resolved {state}"
                    )),
                );
            }
            Readiness::NotReady { blocking } => {
                debug!(
                    job_id = %job.id(),
                    blocking = ?blocking,
                    "Job waiting on prerequisites"
                );
            }
        }

        Ok(job.id().clone())
    }

    /// Abort a tracked job.
    ///
    /// Unknown and already-terminal job ids yield a not-found error; a
    /// backend refusing the abort yields a backend error. Losing the race
    /// against a concurrent poll-observed completion leaves that outcome in
    /// place and reports not-found.
    pub async fn abort(&self, job_id: &str) -> Result<()> {
        let job = self
            .core
            .jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrchestratorError::NotFound(job_id.to_owned()))?;

        // A job can go terminal between the lookup and its retirement from
        // the active set; such a job must not reach the backend.
        let current = job.state();
        if current.is_terminal() {
            return Err(OrchestratorError::NotFound(format!(
                "Job {job_id} already reached {current}"
            )));
        }

        if let Some(handle) = job.handle() {
            self.core
                .backend
                .abort(&handle)
                .await
                .map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        }

        loop {
            let current = job.state();
            if current.is_terminal() {
                return Err(OrchestratorError::NotFound(format!(
                    "Job {job_id} already reached {current}"
                )));
            }
            if self
                .core
                .apply_event(&job, current, &JobEvent::Abort)
                .is_some()
            {
                return Ok(());
            }
            // Lost a race; re-read the state and try again unless terminal
        }
    }

    /// Subscribe to transition and outcome notifications
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.core.subscribe()
    }

    /// Current state of a job, active or retired
    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        self.core
            .jobs
            .get(job_id)
            .map(|entry| entry.value().state())
            .or_else(|| self.core.outcomes.get(job_id).map(|entry| *entry.value()))
    }

    /// Number of jobs the poll loop currently owns
    pub fn active_job_count(&self) -> usize {
        self.core.jobs.len()
    }

    /// Run one polling pass immediately, outside the periodic schedule.
    /// Intended for embedders that drive polling manually and for tests.
    pub async fn poll_once(&self) {
        PollLoop::run_pass_on(&self.core).await;
    }

    /// Stop the poll loop and wait for any in-flight pass to finish
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        let task = self.poll_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "Poll loop task ended abnormally");
            }
        }
        info!("Orchestrator stopped");
    }
}
