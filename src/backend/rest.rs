//! REST-polled backend variant.
//!
//! Submits jobs with an HTTP POST against the configured endpoint and polls
//! the per-job status URL the service hands back. Every call carries a
//! bounded request timeout; timeouts and 5xx responses are reported as
//! transient so the poll loop applies its retry policy, while 4xx responses
//! are permanent.

use super::{BackendClient, BackendError, BackendKind, JobHandle, JobStatus, PollError};
use crate::orchestration::types::ExecutionRequest;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    pipeline: &'a str,
    data_query: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dataset_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
    status_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

/// Backend client for a REST job-execution service
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    endpoint_url: String,
}

impl RestBackend {
    /// Build a client against `endpoint_url` with the given per-request timeout
    pub fn new(endpoint_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Protocol(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint_url: endpoint_url.trim_end_matches('/').to_owned(),
        })
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/job/{job_id}", self.endpoint_url)
    }
}

fn classify_send_error(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() {
        BackendError::Unreachable(err.to_string())
    } else {
        BackendError::Protocol(err.to_string())
    }
}

fn classify_error_status(status: StatusCode, body: &str) -> BackendError {
    if status.is_server_error() {
        BackendError::Unreachable(format!("HTTP {status}: {body}"))
    } else {
        BackendError::Rejected(format!("HTTP {status}: {body}"))
    }
}

fn classify_poll_status(status: StatusCode, body: &str) -> PollError {
    if status.is_server_error() {
        PollError::Transient(format!("HTTP {status}: {body}"))
    } else {
        PollError::Permanent(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl BackendClient for RestBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    async fn submit(&self, request: &ExecutionRequest) -> Result<JobHandle, BackendError> {
        let body = SubmitBody {
            pipeline: &request.pipeline,
            data_query: &request.data_query,
            output_dataset_type: request.output_dataset_type.as_deref(),
        };
        let url = format!("{}/job", self.endpoint_url);
        debug!(url = %url, pipeline = %request.pipeline, "POST job submission");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_status(status, &body));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("Malformed submit response: {e}")))?;

        info!(job_id = %parsed.job_id, status_url = %parsed.status_url, "Job submitted");
        Ok(JobHandle::with_status_url(parsed.job_id, parsed.status_url))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, PollError> {
        let url = handle.status_url.as_deref().ok_or_else(|| {
            PollError::Permanent(format!("Job {} has no status URL", handle.id))
        })?;
        debug!(job_id = %handle.id, url = %url, "GET job status");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                PollError::Transient(e.to_string())
            } else {
                PollError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_poll_status(status, &body));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| PollError::Permanent(format!("Malformed status response: {e}")))?;
        Ok(parsed.status)
    }

    async fn abort(&self, handle: &JobHandle) -> Result<(), BackendError> {
        let url = self.job_url(&handle.id);
        info!(job_id = %handle.id, url = %url, "DELETE job");

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_status(status, &body));
        }
        Ok(())
    }
}
