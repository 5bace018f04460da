//! Storage layer for UWS jobs.
//!
//! Two narrow surfaces over the same tables: the frontend store carries the
//! full CRUD and dispatch-side transitions, and the worker store carries
//! only the mutations driven by work-queue callbacks. Workers never see the
//! frontend surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Availability, ExecutionPhase, Job, JobDescription, JobError, JobResult};
use crate::Result;

pub mod postgres;

#[cfg(feature = "testing")]
pub mod memory;

pub use postgres::{PgFrontendStore, PgWorkerStore};

#[cfg(feature = "testing")]
pub use memory::MemoryJobStore;

/// Frontend job store - full transactional CRUD and phase transitions.
#[async_trait]
pub trait FrontendJobStore<P: Send + Sync>: Send + Sync {
    /// Create a new pending job.
    ///
    /// `execution_duration` and `lifetime` are in seconds; the destruction
    /// time is `lifetime` past the creation time.
    async fn add(
        &self,
        owner: &str,
        run_id: Option<&str>,
        params: &P,
        execution_duration: Option<i64>,
        lifetime: i64,
    ) -> Result<Job<P>>;

    /// Retrieve a job with parameters and results fully hydrated.
    async fn get(&self, job_id: &str) -> Result<Job<P>>;

    /// List the jobs for one owner, newest first.
    async fn list_jobs(
        &self,
        owner: &str,
        phases: Option<&[ExecutionPhase]>,
        after: Option<DateTime<Utc>>,
        count: Option<i64>,
    ) -> Result<Vec<JobDescription>>;

    /// Hard-delete a job and its results.
    async fn delete(&self, job_id: &str) -> Result<()>;

    /// Change the destruction time of a job.
    async fn update_destruction(
        &self,
        job_id: &str,
        destruction: DateTime<Utc>,
    ) -> Result<()>;

    /// Change the execution duration (seconds) of a job.
    async fn update_execution_duration(&self, job_id: &str, duration: i64) -> Result<()>;

    /// Record dispatch to the work queue, moving the job to `queued`.
    ///
    /// Idempotent for the same `(job_id, message_id)` pair; any other call
    /// outside the `pending` or `held` phases is an invalid transition.
    async fn mark_queued(&self, job_id: &str, message_id: &str) -> Result<()>;

    /// Probe whether the underlying storage answers a trivial read.
    async fn availability(&self) -> Availability;
}

/// Worker-side job store - the mutations driven by callbacks.
///
/// All three operations are no-ops when the stored message id does not
/// match (a stale callback) or when the job has already moved past the
/// transition, so redelivery is always safe.
#[async_trait]
pub trait WorkerJobStore: Send + Sync {
    /// Record the start of execution, moving `queued` to `executing`.
    async fn mark_started(
        &self,
        job_id: &str,
        message_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<()>;

    /// Record successful completion together with its results.
    async fn mark_completed(
        &self,
        job_id: &str,
        message_id: &str,
        end_time: DateTime<Utc>,
        results: &[JobResult],
    ) -> Result<()>;

    /// Record a failure.
    async fn mark_errored(
        &self,
        job_id: &str,
        message_id: &str,
        end_time: DateTime<Utc>,
        error: &JobError,
    ) -> Result<()>;
}
