//! Service layer for UWS jobs.
//!
//! Encapsulates the machinery of dispatching and tracking jobs without
//! assuming what the jobs do or what outputs they return. Workers do not
//! use this layer; they talk to the worker-side store through the callback
//! protocol.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::UwsConfig;
use crate::models::{Availability, ExecutionPhase, Job, JobDescription, JobUpdate};
use crate::policy::Policy;
use crate::signing::UrlSigner;
use crate::storage::FrontendJobStore;
use crate::{Error, Result};

/// Dispatch and track UWS jobs.
pub struct JobService<P: Send + Sync> {
    config: UwsConfig,
    policy: Arc<dyn Policy<P>>,
    store: Arc<dyn FrontendJobStore<P>>,
    signer: Arc<dyn UrlSigner>,
}

impl<P: Send + Sync> JobService<P> {
    pub fn new(
        config: UwsConfig,
        policy: Arc<dyn Policy<P>>,
        store: Arc<dyn FrontendJobStore<P>>,
        signer: Arc<dyn UrlSigner>,
    ) -> Self {
        Self {
            config,
            policy,
            store,
            signer,
        }
    }

    /// Check whether the service is up.
    ///
    /// Currently this only checks the database. Eventually it should push
    /// an end-to-end probe through the job execution system.
    pub async fn availability(&self) -> Availability {
        self.store.availability().await
    }

    /// Create a pending job.
    ///
    /// This does not start execution; that is done separately with
    /// `start`.
    pub async fn create(&self, user: &str, params: P, run_id: Option<&str>) -> Result<Job<P>> {
        self.policy.validate_params(&params)?;
        self.store
            .add(
                user,
                run_id,
                &params,
                self.config.execution_duration,
                self.config.lifetime,
            )
            .await
    }

    /// Delete a job.
    ///
    /// The UWS standard says that deleting a job should stop the
    /// in-progress work, but the work queue provides no way to do that.
    /// Settle for deleting the record, which makes any later callback for
    /// this job a no-op.
    pub async fn delete(&self, user: &str, job_id: &str) -> Result<()> {
        let job = self.store.get(job_id).await?;
        if job.owner != user {
            return Err(Error::permission_denied(job_id));
        }
        self.store.delete(job_id).await
    }

    /// Retrieve a job, optionally long-polling for a phase change.
    ///
    /// `wait` is the maximum number of seconds to block; negative means
    /// the configured maximum. Waiting is honored only while the job is in
    /// an active phase. The baseline phase is `wait_phase` when given,
    /// otherwise the phase observed at the start of the poll. With
    /// `wait_for_completion` the poll instead runs until the job leaves
    /// the active phases, which is the building block for the sync API.
    ///
    /// Polling uses exponential backoff against the database (100 ms
    /// growing by 1.5x), clamped so the final sleep lands on the deadline.
    pub async fn get(
        &self,
        user: &str,
        job_id: &str,
        wait: Option<i64>,
        wait_phase: Option<ExecutionPhase>,
        wait_for_completion: bool,
    ) -> Result<Job<P>> {
        let mut job = self.store.get(job_id).await?;
        if job.owner != user {
            return Err(Error::permission_denied(job_id));
        }

        // If waiting for a status change was requested and is meaningful,
        // do so, capping the wait time at the configured maximum timeout.
        if let Some(mut wait) = wait.filter(|&w| w != 0) {
            if job.phase.is_active() {
                if wait < 0 || wait > self.config.wait_timeout {
                    wait = self.config.wait_timeout;
                }
                let deadline = Utc::now() + chrono::Duration::seconds(wait);
                let baseline = wait_phase.unwrap_or(job.phase);

                let not_done = |job: &Job<P>| {
                    if wait_for_completion {
                        job.phase.is_active()
                    } else {
                        job.phase == baseline
                    }
                };

                let mut delay = 0.1_f64;
                while not_done(&job) {
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    job = self.store.get(job_id).await?;
                    let now = Utc::now();
                    if now >= deadline {
                        break;
                    }
                    delay *= 1.5;
                    let remaining = (deadline - now).num_milliseconds() as f64 / 1000.0;
                    if delay > remaining {
                        delay = remaining;
                    }
                }
            }
        }

        // Convert result URLs to signed URLs.
        if let Some(results) = job.results.as_mut() {
            for result in results {
                result.url = self.signer.sign(&result.url, result.mime_type.as_deref())?;
            }
        }

        Ok(job)
    }

    /// Wait for a job to complete and return the URL of its first result.
    ///
    /// Used to implement sync routes that return a single result.
    pub async fn get_first_result(&self, user: &str, job_id: &str) -> Result<String> {
        let job = self
            .get(user, job_id, Some(self.config.sync_timeout), None, true)
            .await?;

        if !matches!(job.phase, ExecutionPhase::Completed | ExecutionPhase::Error) {
            warn!(job_id, run_id = job.run_id.as_deref(), "Job timed out");
            return Err(Error::SyncTimeout(format!(
                "Job did not complete in {}s",
                self.config.sync_timeout
            )));
        }
        if let Some(error) = job.error {
            warn!(
                job_id,
                run_id = job.run_id.as_deref(),
                error_code = %error.error_code,
                error = %error.message,
                "Job failed"
            );
            return Err(Error::Task(error));
        }
        let Some(results) = job.results.filter(|r| !r.is_empty()) else {
            warn!(job_id, run_id = job.run_id.as_deref(), "Job returned no results");
            return Err(Error::task(
                "no_results",
                "Job did not return any results",
                None,
            ));
        };

        Ok(results[0].url.clone())
    }

    /// List the jobs for a particular user, newest first.
    pub async fn list_jobs(
        &self,
        user: &str,
        phases: Option<&[ExecutionPhase]>,
        after: Option<DateTime<Utc>>,
        count: Option<i64>,
    ) -> Result<Vec<JobDescription>> {
        self.store.list_jobs(user, phases, after, count).await
    }

    /// Update the mutable fields of a job.
    ///
    /// Each requested value is passed through the policy, and a stored
    /// field changes only when the accepted value differs from it.
    pub async fn update(&self, user: &str, job_id: &str, update: &JobUpdate) -> Result<()> {
        if let Some(duration) = update.execution_duration {
            if duration <= 0 {
                return Err(Error::validation("execution_duration must be at least 1s"));
            }
        }

        let job = self.store.get(job_id).await?;
        if job.owner != user {
            return Err(Error::permission_denied(job_id));
        }
        if let Some(requested) = update.destruction_time {
            let destruction = self.policy.validate_destruction(requested, &job);
            if destruction != job.destruction_time {
                self.store.update_destruction(job_id, destruction).await?;
            }
        }
        if let Some(requested) = update.execution_duration {
            let duration = self.policy.validate_execution_duration(requested, &job);
            if Some(duration) != job.execution_duration {
                self.store.update_execution_duration(job_id, duration).await?;
            }
        }
        Ok(())
    }

    /// Start execution of a job.
    ///
    /// Returns the message identifier assigned by the work queue.
    pub async fn start(&self, user: &str, job_id: &str) -> Result<String> {
        let job = self.store.get(job_id).await?;
        if job.owner != user {
            return Err(Error::permission_denied(job_id));
        }
        if !matches!(job.phase, ExecutionPhase::Pending | ExecutionPhase::Held) {
            return Err(Error::InvalidPhase(format!(
                "Cannot start job in phase {}",
                job.phase
            )));
        }
        let message_id = self.policy.dispatch(&job).await?;
        self.store.mark_queued(job_id, &message_id).await?;
        Ok(message_id)
    }
}
