//! # Pipeline Orchestrator
//!
//! Command-and-control adapter that accepts pipeline-execution requests from
//! an upstream scheduler and drives them to completion on a pluggable
//! back-end execution service, tracking job state, polling for progress, and
//! reporting terminal outcomes.
//!
//! ## Architecture
//!
//! Pipeline execution itself is entirely delegated to the backend. This
//! crate orchestrates one job per request: it resolves prerequisite-job
//! dependency chains before submission, talks to the backend through a
//! polymorphic [`backend::BackendClient`], tracks the job's lifecycle with a
//! compare-and-set [`state_machine::JobStateMachine`], and emits one
//! notification per state transition plus exactly one terminal outcome.
//!
//! Three backend variants exist: a REST service submitted to and polled over
//! HTTP, a Signal service observed through namespaced keys on a shared
//! store (selected by a reserved deployment index), and a no-I/O simulation
//! for tests and demos.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeline_orchestrator::config::OrchestratorConfig;
//! use pipeline_orchestrator::orchestration::{ExecutionRequest, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::simulation()).await?;
//! let mut events = orchestrator.subscribe();
//!
//! let job_id = orchestrator
//!     .execute(ExecutionRequest::new("true.yaml"))
//!     .await?;
//! println!("Tracking job {job_id}");
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod state_machine;

pub use backend::{BackendClient, BackendError, BackendKind, JobHandle, JobStatus, PollError};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use events::{EventPublisher, OrchestratorEvent};
pub use orchestration::{ExecutionRequest, JobId, JobOutcome, JobTransition, Orchestrator};
pub use state_machine::{JobEvent, JobState, JobStateMachine};
