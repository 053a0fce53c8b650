//! End-to-end orchestrator tests against the simulation backend and a
//! scripted backend double.

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline_orchestrator::backend::{
    BackendClient, BackendError, BackendKind, JobHandle, JobStatus, PollError, SimulationBackend,
};
use pipeline_orchestrator::config::OrchestratorConfig;
use pipeline_orchestrator::orchestration::{ExecutionRequest, Orchestrator};
use pipeline_orchestrator::{JobOutcome, JobState, OrchestratorError, OrchestratorEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scripted poll behavior for the backend double
#[derive(Debug, Clone, Copy)]
enum ScriptedPoll {
    Status(JobStatus),
    Transient,
    Permanent,
}

/// Backend double that counts submissions and replays a poll script
struct ScriptedBackend {
    submits: AtomicUsize,
    polls: Mutex<VecDeque<ScriptedPoll>>,
}

impl ScriptedBackend {
    fn new(script: Vec<ScriptedPoll>) -> Self {
        Self {
            submits: AtomicUsize::new(0),
            polls: Mutex::new(script.into_iter().collect()),
        }
    }

    fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulation
    }

    async fn submit(&self, _request: &ExecutionRequest) -> Result<JobHandle, BackendError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle::new(format!("scripted-{n}")))
    }

    async fn poll(&self, _handle: &JobHandle) -> Result<JobStatus, PollError> {
        match self.polls.lock().pop_front() {
            Some(ScriptedPoll::Status(status)) => Ok(status),
            Some(ScriptedPoll::Transient) => {
                Err(PollError::Transient("connection timed out".into()))
            }
            Some(ScriptedPoll::Permanent) => Err(PollError::Permanent("unknown job".into())),
            None => Ok(JobStatus::Executing),
        }
    }

    async fn abort(&self, _handle: &JobHandle) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Orchestrator with a quiesced timer; passes are driven by `poll_once`
fn manual_orchestrator(backend: Arc<dyn BackendClient>) -> Orchestrator {
    let config = OrchestratorConfig {
        poll_interval_secs: 3600.0,
        simulation: true,
        ..OrchestratorConfig::default()
    };
    Orchestrator::with_backend(&config, backend)
}

async fn next_outcome(events: &mut broadcast::Receiver<OrchestratorEvent>) -> JobOutcome {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for an outcome event")
            .expect("event channel closed");
        if let OrchestratorEvent::Outcome(outcome) = event {
            return outcome;
        }
    }
}

#[tokio::test]
async fn simulation_success_pipeline_succeeds() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::new()));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("true.yaml"))
        .await
        .unwrap();
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Running));

    orchestrator.poll_once().await; // executing
    orchestrator.poll_once().await; // completed

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Succeeded));
    assert_eq!(orchestrator.active_job_count(), 0);
}

#[tokio::test]
async fn simulation_failure_pipeline_fails() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::with_polls_until_done(0)));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("false.yaml"))
        .await
        .unwrap();
    orchestrator.poll_once().await;

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Failed));
}

#[tokio::test]
async fn simulation_fault_pipeline_faults() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::with_polls_until_done(0)));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("fault.yaml"))
        .await
        .unwrap();
    orchestrator.poll_once().await;

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.state, JobState::Faulted);
    assert!(outcome.error_detail.is_some());
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Faulted));
}

#[tokio::test]
async fn unknown_simulated_pipeline_resolves_failed() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::new()));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("mystery.yaml"))
        .await
        .unwrap();

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(outcome.state, JobState::Failed);
}

#[tokio::test]
async fn empty_pipeline_identifier_is_rejected() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::new()));
    let err = orchestrator
        .execute(ExecutionRequest::new("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));
    assert_eq!(orchestrator.active_job_count(), 0);
}

#[tokio::test]
async fn terminal_notification_is_emitted_exactly_once() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::with_polls_until_done(0)));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("true.yaml"))
        .await
        .unwrap();

    // Extra passes after the terminal transition must not replay anything
    for _ in 0..4 {
        orchestrator.poll_once().await;
    }

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(outcome.state, JobState::Succeeded);

    let extra = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            if let Ok(OrchestratorEvent::Outcome(o)) = events.recv().await {
                return o;
            }
        }
    })
    .await;
    assert!(extra.is_err(), "second outcome event observed: {extra:?}");
}

#[tokio::test]
async fn failed_prerequisite_fails_dependent_without_submission() {
    let backend = Arc::new(ScriptedBackend::new(vec![ScriptedPoll::Status(
        JobStatus::Error,
    )]));
    let orchestrator = manual_orchestrator(backend.clone());
    let mut events = orchestrator.subscribe();

    let upstream = orchestrator
        .execute(ExecutionRequest::new("upstream.yaml"))
        .await
        .unwrap();
    orchestrator.poll_once().await;
    assert_eq!(next_outcome(&mut events).await.state, JobState::Failed);
    assert_eq!(backend.submit_count(), 1);

    let dependent = orchestrator
        .execute(ExecutionRequest::new("dependent.yaml").with_prerequisites(vec![upstream]))
        .await
        .unwrap();

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, dependent);
    assert_eq!(outcome.state, JobState::Failed);
    assert!(outcome.error_detail.unwrap().contains("Prerequisite"));
    // The dependent job never reached the backend
    assert_eq!(backend.submit_count(), 1);
}

#[tokio::test]
async fn dependent_job_submits_after_prerequisite_succeeds() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedPoll::Status(JobStatus::Completed),
        ScriptedPoll::Status(JobStatus::Completed),
    ]));
    let orchestrator = manual_orchestrator(backend.clone());
    let mut events = orchestrator.subscribe();

    let upstream = orchestrator
        .execute(ExecutionRequest::new("upstream.yaml"))
        .await
        .unwrap();

    // Dependent arrives while the prerequisite is still running
    let dependent = orchestrator
        .execute(ExecutionRequest::new("dependent.yaml").with_prerequisites(vec![upstream.clone()]))
        .await
        .unwrap();
    assert_eq!(orchestrator.job_state(&dependent), Some(JobState::Pending));
    assert_eq!(backend.submit_count(), 1);

    orchestrator.poll_once().await; // upstream completes
    assert_eq!(next_outcome(&mut events).await.job_id, upstream);

    // Pass ordering over the active set is arbitrary, so the dependent may
    // gate in the same pass the upstream completed in or the next one.
    for _ in 0..3 {
        orchestrator.poll_once().await;
    }

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, dependent);
    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(backend.submit_count(), 2);
}

#[tokio::test]
async fn abort_is_acknowledged_once_then_not_found() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::with_polls_until_done(
        u32::MAX,
    )));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("true.yaml"))
        .await
        .unwrap();

    orchestrator.abort(&job_id).await.unwrap();
    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.state, JobState::Aborted);

    let err = orchestrator.abort(&job_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn abort_of_unknown_job_is_not_found() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::new()));
    let err = orchestrator.abort("no-such-job").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn transient_poll_failures_below_threshold_keep_job_running() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
    ]));
    let orchestrator = manual_orchestrator(backend);

    let job_id = orchestrator
        .execute(ExecutionRequest::new("pipeline.yaml"))
        .await
        .unwrap();

    for _ in 0..3 {
        orchestrator.poll_once().await;
    }
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Running));
}

#[tokio::test]
async fn crossing_the_transient_failure_threshold_faults_the_job() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
    ]));
    let orchestrator = manual_orchestrator(backend);
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("pipeline.yaml"))
        .await
        .unwrap();

    for _ in 0..4 {
        orchestrator.poll_once().await;
    }

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(outcome.state, JobState::Faulted);
    assert!(outcome
        .error_detail
        .unwrap()
        .contains("consecutive transient poll failures"));
}

#[tokio::test]
async fn successful_poll_resets_the_failure_counter() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
        ScriptedPoll::Status(JobStatus::Executing),
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
        ScriptedPoll::Transient,
    ]));
    let orchestrator = manual_orchestrator(backend);

    let job_id = orchestrator
        .execute(ExecutionRequest::new("pipeline.yaml"))
        .await
        .unwrap();

    // 2 failures, a success, then 3 more failures: never over the threshold
    for _ in 0..6 {
        orchestrator.poll_once().await;
    }
    assert_eq!(orchestrator.job_state(&job_id), Some(JobState::Running));
}

#[tokio::test]
async fn permanent_poll_failure_faults_immediately() {
    let backend = Arc::new(ScriptedBackend::new(vec![ScriptedPoll::Permanent]));
    let orchestrator = manual_orchestrator(backend);
    let mut events = orchestrator.subscribe();

    orchestrator
        .execute(ExecutionRequest::new("pipeline.yaml"))
        .await
        .unwrap();
    orchestrator.poll_once().await;

    assert_eq!(next_outcome(&mut events).await.state, JobState::Faulted);
}

#[tokio::test]
async fn poll_completion_racing_abort_yields_one_terminal_state() {
    let backend = Arc::new(ScriptedBackend::new(vec![ScriptedPoll::Status(
        JobStatus::Completed,
    )]));
    let orchestrator = Arc::new(manual_orchestrator(backend));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("pipeline.yaml"))
        .await
        .unwrap();

    let poller = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.poll_once().await })
    };
    let aborter = {
        let orchestrator = orchestrator.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move { orchestrator.abort(&job_id).await })
    };
    let (_, abort_result) = tokio::join!(poller, aborter);

    // Whichever writer won, there is exactly one terminal state and one
    // outcome notification.
    let outcome = next_outcome(&mut events).await;
    assert!(outcome.state.is_terminal());
    match abort_result.unwrap() {
        Ok(()) => assert_eq!(outcome.state, JobState::Aborted),
        Err(OrchestratorError::NotFound(_)) => assert_eq!(outcome.state, JobState::Succeeded),
        Err(other) => panic!("unexpected abort error: {other}"),
    }

    let extra = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            if let Ok(OrchestratorEvent::Outcome(o)) = events.recv().await {
                return o;
            }
        }
    })
    .await;
    assert!(extra.is_err(), "second outcome event observed: {extra:?}");
}

#[tokio::test]
async fn periodic_poll_loop_drives_jobs_without_manual_passes() {
    let config = OrchestratorConfig {
        poll_interval_secs: 0.02,
        simulation: true,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::with_backend(&config, Arc::new(SimulationBackend::new()));
    let mut events = orchestrator.subscribe();

    let job_id = orchestrator
        .execute(ExecutionRequest::new("true.yaml"))
        .await
        .unwrap();

    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(outcome.state, JobState::Succeeded);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_poll_loop() {
    let orchestrator = manual_orchestrator(Arc::new(SimulationBackend::new()));
    tokio::time::timeout(Duration::from_secs(5), orchestrator.shutdown())
        .await
        .expect("shutdown did not complete");
}
