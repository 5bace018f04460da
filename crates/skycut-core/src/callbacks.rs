//! Callback protocol from the work queue back into the job stores.
//!
//! Three fixed messages advance a job's phase: started, completed, and
//! failed. Callbacks never return an error to the queue; failures are
//! logged and swallowed so the queue does not redeliver, and the store
//! itself drops stale or out-of-order messages.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::models::{JobError, JobResult};
use crate::storage::WorkerJobStore;
use crate::time;

/// The failure shape delivered by the work queue.
///
/// The queue exposes a failure only as an exception type and a message
/// string, so structured task errors have to be recovered by parsing the
/// message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEnvelope {
    /// Exception type name reported by the worker
    #[serde(rename = "type")]
    pub error_type: String,

    /// Exception message, possibly a serialized structured error
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct StructuredTaskError {
    error_code: String,
    message: String,
    #[serde(default)]
    detail: Option<String>,
}

impl FailureEnvelope {
    /// Reconstitute the structured job error from the envelope.
    pub fn into_job_error(self) -> JobError {
        if self.error_type == "TaskError" {
            match serde_json::from_str::<StructuredTaskError>(&self.message) {
                Ok(error) => JobError {
                    error_code: error.error_code,
                    message: error.message,
                    detail: error.detail,
                },
                Err(_) => JobError {
                    error_code: "unknown_error".to_string(),
                    message: self.message,
                    detail: None,
                },
            }
        } else {
            JobError {
                error_code: "unknown_error".to_string(),
                message: "Unknown error executing task".to_string(),
                detail: Some(format!("{}: {}", self.error_type, self.message)),
            }
        }
    }
}

/// Entry points invoked by the work queue infrastructure.
#[derive(Clone)]
pub struct JobCallbackHandler {
    store: Arc<dyn WorkerJobStore>,
}

impl JobCallbackHandler {
    pub fn new(store: Arc<dyn WorkerJobStore>) -> Self {
        Self { store }
    }

    /// A worker picked up the job.
    pub async fn job_started(
        &self,
        job_id: &str,
        message_id: &str,
        timestamp: DateTime<Utc>,
    ) {
        info!(job_id, message_id, "Job started");
        if let Err(e) = self.store.mark_started(job_id, message_id, timestamp).await {
            error!(job_id, error = %e, "Failed to record job start");
        }
    }

    /// A worker finished the job and reported its results.
    pub async fn job_completed(
        &self,
        job_id: &str,
        message_id: &str,
        results: Vec<JobResult>,
    ) {
        info!(job_id, message_id, "Job completed");
        let end_time = time::now();
        if let Err(e) = self
            .store
            .mark_completed(job_id, message_id, end_time, &results)
            .await
        {
            error!(job_id, error = %e, "Failed to record job completion");
        }
    }

    /// A worker failed the job.
    pub async fn job_failed(&self, job_id: &str, message_id: &str, envelope: FailureEnvelope) {
        let error = envelope.into_job_error();
        warn!(
            job_id,
            message_id,
            error_code = %error.error_code,
            error = %error.message,
            "Job failed"
        );
        let end_time = time::now();
        if let Err(e) = self
            .store
            .mark_errored(job_id, message_id, end_time, &error)
            .await
        {
            error!(job_id, error = %e, "Failed to record job failure");
        }
    }
}
