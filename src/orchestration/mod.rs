//! # Pipeline Execution Orchestration
//!
//! The command-and-control core: accepts execute/abort requests, gates them
//! on prerequisite jobs, drives submissions to the configured backend, and
//! tracks each job's lifecycle until its terminal outcome is delivered.
//!
//! ## Core Components
//!
//! - **Orchestrator**: public facade for execute/abort and notifications
//! - **PollLoop**: single periodic task feeding backend observations into
//!   job state machines
//! - **PrerequisiteResolver**: readiness gate over prerequisite job states
//! - **Job**: one orchestrated execution request and its state machine

pub mod job;
pub mod orchestrator;
pub mod poll_loop;
pub mod prerequisites;
pub mod types;

pub use job::Job;
pub use orchestrator::Orchestrator;
pub use prerequisites::{PrerequisiteResolver, Readiness};
pub use types::{ExecutionRequest, JobId, JobOutcome, JobTransition};
