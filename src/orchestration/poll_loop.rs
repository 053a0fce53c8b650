use crate::orchestration::job::Job;
use crate::orchestration::orchestrator::OrchestratorCore;
use crate::state_machine::JobState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Periodic, cancellable driver of backend observation.
///
/// A single task runs one pass per configured interval; a pass always runs
/// to completion before the next is scheduled, so two polling passes never
/// overlap and no job sees duplicate in-flight poll requests. On the Signal
/// backend this fixed-interval pass is the safety net that guarantees every
/// running job is checked even when store notifications are missed.
pub(crate) struct PollLoop {
    core: Arc<OrchestratorCore>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl PollLoop {
    pub(crate) fn new(
        core: Arc<OrchestratorCore>,
        interval: Duration,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            core,
            interval,
            shutdown,
        }
    }

    pub(crate) async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Poll loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = self.shutdown.notified() => {
                    debug!("Shutdown notification received");
                    break;
                }
            }
            Self::run_pass_on(&self.core).await;
        }

        info!("Poll loop stopped");
    }

    /// One polling pass: gate pending jobs, retry transiently failed
    /// submissions, poll every running job.
    pub(crate) async fn run_pass_on(core: &Arc<OrchestratorCore>) {
        // Snapshot the active set so job retirement during the pass cannot
        // invalidate the iteration.
        let jobs: Vec<Arc<Job>> = core.jobs.iter().map(|entry| entry.value().clone()).collect();

        for job in jobs {
            match job.state() {
                JobState::Pending => core.gate(&job).await,
                JobState::Submitting => core.submit(&job).await,
                JobState::Running => core.poll_job(&job).await,
                terminal => {
                    // Terminal jobs are retired atomically with their final
                    // transition; finding one here means that failed.
                    error!(
                        job_id = %job.id(),
                        state = %terminal,
                        "FATAL: terminal job still in active set, removing"
                    );
                    core.jobs.remove(job.id());
                }
            }
        }
    }
}
