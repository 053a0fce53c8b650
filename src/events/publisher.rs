use crate::orchestration::types::{JobOutcome, JobTransition};
use tokio::sync::broadcast;

/// Notifications delivered to the upstream transport
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// A tracked job changed state
    Transition(JobTransition),
    /// A job entered a terminal state; emitted exactly once per job
    Outcome(JobOutcome),
}

/// Publisher for job lifecycle notifications
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error; the
    /// orchestrator keeps emitting whether or not a transport is attached.
    pub fn publish(&self, event: OrchestratorEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
