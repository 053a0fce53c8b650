use crate::orchestration::job::Job;
use crate::orchestration::types::JobId;
use crate::state_machine::JobState;
use dashmap::DashMap;
use std::sync::Arc;

/// Result of evaluating a request's prerequisite gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// All prerequisites reached a successful terminal state
    Ready,
    /// Some prerequisites have not finished yet
    NotReady { blocking: Vec<JobId> },
    /// A prerequisite finished unsuccessfully; the dependent request must
    /// resolve failed without ever being submitted
    Failed { failed_id: JobId, state: JobState },
}

/// Read-only readiness gate over the orchestrator's job tables.
///
/// Prerequisites may complete in any order; readiness requires all of them
/// to be successful. Identifiers the orchestrator has never seen count as
/// blocking, since the prerequisite may simply not have been submitted yet.
#[derive(Debug, Clone)]
pub struct PrerequisiteResolver {
    active: Arc<DashMap<JobId, Arc<Job>>>,
    outcomes: Arc<DashMap<JobId, JobState>>,
}

impl PrerequisiteResolver {
    pub fn new(
        active: Arc<DashMap<JobId, Arc<Job>>>,
        outcomes: Arc<DashMap<JobId, JobState>>,
    ) -> Self {
        Self { active, outcomes }
    }

    /// Evaluate the gate for the given prerequisite job ids.
    ///
    /// An empty list is trivially ready. Prerequisite failure is not
    /// retried: the first unsuccessful terminal prerequisite wins.
    pub fn check_ready(&self, prerequisites: &[JobId]) -> Readiness {
        let mut blocking = Vec::new();

        for id in prerequisites {
            let state = self
                .outcomes
                .get(id)
                .map(|entry| *entry.value())
                .or_else(|| self.active.get(id).map(|entry| entry.value().state()));

            match state {
                Some(state) if state.satisfies_prerequisite() => {}
                Some(state) if state.is_terminal() => {
                    return Readiness::Failed {
                        failed_id: id.clone(),
                        state,
                    };
                }
                _ => blocking.push(id.clone()),
            }
        }

        if blocking.is_empty() {
            Readiness::Ready
        } else {
            Readiness::NotReady { blocking }
        }
    }
}
