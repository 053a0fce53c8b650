//! # Orchestrator Configuration
//!
//! Process-wide configuration resolved once at startup and read-only
//! afterwards. Which backend variant is constructed follows from the
//! deployment index: one reserved index selects the Signal (shared-store)
//! service, every other index selects the REST service, and the simulation
//! flag overrides both for I/O-free operation.

use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deployment index reserved for the Signal (shared-store) backend.
/// All other index values select the REST backend.
pub const SIGNAL_BACKEND_INDEX: u32 = 99;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

fn default_poll_interval_secs() -> f64 {
    5.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_failure_threshold() -> u32 {
    3
}

fn default_absence_grace_secs() -> u64 {
    30
}

/// Process-wide orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// URL of the REST execution service endpoint
    pub endpoint_url: Option<String>,

    /// Address of the shared store for the Signal backend
    pub store_address: Option<String>,

    /// Deployment index; [`SIGNAL_BACKEND_INDEX`] selects the Signal backend
    #[serde(default)]
    pub index: u32,

    /// Time between status polls for executing pipelines (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Bound on every individual backend request (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Consecutive transient poll failures tolerated before a job faults
    #[serde(default = "default_poll_failure_threshold")]
    pub poll_failure_threshold: u32,

    /// How long a missing Signal status key still reads as queued (seconds)
    #[serde(default = "default_absence_grace_secs")]
    pub signal_absence_grace_secs: u64,

    /// Disable all backend I/O and simulate execution
    #[serde(default)]
    pub simulation: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            store_address: None,
            index: 0,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_failure_threshold: default_poll_failure_threshold(),
            signal_absence_grace_secs: default_absence_grace_secs(),
            simulation: false,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from an optional file plus `ORCHESTRATOR_*`
    /// environment overrides, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("ORCHESTRATOR"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Convenience configuration for simulation mode (tests and demos)
    pub fn simulation() -> Self {
        Self {
            simulation: true,
            ..Self::default()
        }
    }

    /// Which backend variant this deployment runs against
    pub fn backend_kind(&self) -> BackendKind {
        if self.simulation {
            BackendKind::Simulation
        } else if self.index == SIGNAL_BACKEND_INDEX {
            BackendKind::Signal
        } else {
            BackendKind::Rest
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn signal_absence_grace(&self) -> Duration {
        Duration::from_secs(self.signal_absence_grace_secs)
    }

    /// Reject configurations the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.poll_interval_secs <= 0.0 {
            return Err(ConfigurationError::Invalid(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }
        match self.backend_kind() {
            BackendKind::Rest if self.endpoint_url.is_none() => {
                Err(ConfigurationError::Invalid(
                    "endpoint_url is required for the REST backend".into(),
                ))
            }
            BackendKind::Signal if self.store_address.is_none() => {
                Err(ConfigurationError::Invalid(
                    "store_address is required for the Signal backend".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}
