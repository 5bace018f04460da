//! In-memory job store for tests.
//!
//! Mirrors the transition rules of the PostgreSQL stores over a mutex-held
//! map so that service and API tests can run without a database. Not
//! intended for production use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Availability, ExecutionPhase, Job, JobDescription, JobError, JobResult};
use crate::storage::{FrontendJobStore, WorkerJobStore};
use crate::{time, Error, Result};

struct MemoryState<P> {
    next_id: i64,
    jobs: HashMap<i64, Job<P>>,
}

/// A memory-backed store implementing both store surfaces.
pub struct MemoryJobStore<P> {
    state: Mutex<MemoryState<P>>,
}

impl<P> MemoryJobStore<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                jobs: HashMap::new(),
            }),
        }
    }
}

impl<P> Default for MemoryJobStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_job_id(job_id: &str) -> Result<i64> {
    job_id
        .parse::<i64>()
        .map_err(|_| Error::UnknownJob(job_id.to_string()))
}

#[async_trait]
impl<P> FrontendJobStore<P> for MemoryJobStore<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn add(
        &self,
        owner: &str,
        run_id: Option<&str>,
        params: &P,
        execution_duration: Option<i64>,
        lifetime: i64,
    ) -> Result<Job<P>> {
        let creation_time = time::now();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let job = Job {
            job_id: id.to_string(),
            owner: owner.to_string(),
            phase: ExecutionPhase::Pending,
            run_id: run_id.map(str::to_string),
            creation_time,
            start_time: None,
            end_time: None,
            destruction_time: creation_time + chrono::Duration::seconds(lifetime),
            execution_duration,
            quote: None,
            message_id: None,
            error: None,
            parameters: params.clone(),
            results: None,
        };
        state.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Job<P>> {
        let id = parse_job_id(job_id)?;
        let state = self.state.lock().unwrap();
        state
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))
    }

    async fn list_jobs(
        &self,
        owner: &str,
        phases: Option<&[ExecutionPhase]>,
        after: Option<DateTime<Utc>>,
        count: Option<i64>,
    ) -> Result<Vec<JobDescription>> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<&Job<P>> = state
            .jobs
            .values()
            .filter(|job| job.owner == owner)
            .filter(|job| phases.map_or(true, |phases| phases.contains(&job.phase)))
            .filter(|job| after.map_or(true, |after| job.creation_time > after))
            .collect();
        jobs.sort_by(|a, b| {
            let a_id: i64 = a.job_id.parse().unwrap_or(0);
            let b_id: i64 = b.job_id.parse().unwrap_or(0);
            (b.creation_time, b_id).cmp(&(a.creation_time, a_id))
        });
        if let Some(count) = count {
            jobs.truncate(count.max(0) as usize);
        }
        Ok(jobs.into_iter().map(|job| job.description()).collect())
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        state
            .jobs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))
    }

    async fn update_destruction(
        &self,
        job_id: &str,
        destruction: DateTime<Utc>,
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        job.destruction_time = destruction;
        Ok(())
    }

    async fn update_execution_duration(&self, job_id: &str, duration: i64) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        job.execution_duration = Some(duration);
        Ok(())
    }

    async fn mark_queued(&self, job_id: &str, message_id: &str) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        match job.phase {
            ExecutionPhase::Pending | ExecutionPhase::Held => {
                job.phase = ExecutionPhase::Queued;
                job.message_id = Some(message_id.to_string());
                Ok(())
            }
            ExecutionPhase::Queued if job.message_id.as_deref() == Some(message_id) => Ok(()),
            phase => Err(Error::InvalidPhase(format!(
                "Cannot queue job {} in phase {}",
                job_id, phase
            ))),
        }
    }

    async fn availability(&self) -> Availability {
        Availability::up()
    }
}

#[async_trait]
impl<P> WorkerJobStore for MemoryJobStore<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn mark_started(
        &self,
        job_id: &str,
        message_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(());
        };
        if job.message_id.as_deref() != Some(message_id) {
            return Ok(());
        }
        if job.phase != ExecutionPhase::Queued {
            debug!(job_id, phase = %job.phase, "Ignoring started callback in phase");
            return Ok(());
        }
        job.phase = ExecutionPhase::Executing;
        job.start_time = Some(start_time);
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        message_id: &str,
        end_time: DateTime<Utc>,
        results: &[JobResult],
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(());
        };
        if job.message_id.as_deref() != Some(message_id) {
            return Ok(());
        }
        if job.phase != ExecutionPhase::Executing {
            debug!(job_id, phase = %job.phase, "Ignoring completed callback in phase");
            return Ok(());
        }
        job.phase = ExecutionPhase::Completed;
        job.end_time = Some(end_time);
        if !results.is_empty() {
            job.results = Some(results.to_vec());
        }
        Ok(())
    }

    async fn mark_errored(
        &self,
        job_id: &str,
        message_id: &str,
        end_time: DateTime<Utc>,
        error: &JobError,
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(());
        };
        if job.message_id.as_deref() != Some(message_id) {
            return Ok(());
        }
        if job.phase != ExecutionPhase::Queued && job.phase != ExecutionPhase::Executing {
            debug!(job_id, phase = %job.phase, "Ignoring failed callback in phase");
            return Ok(());
        }
        job.phase = ExecutionPhase::Error;
        job.end_time = Some(end_time);
        job.error = Some(error.clone());
        Ok(())
    }
}
