//! PostgreSQL implementation of the UWS job stores.
//!
//! Jobs are numbered by a database sequence, so a single control-plane
//! process per database is assumed. Parameters are stored as JSONB and
//! re-hydrated through the caller-supplied parameter type. Every
//! read-modify-write runs inside a transaction; connections are pinned to
//! `REPEATABLE READ` in `crate::db`.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::models::{Availability, ExecutionPhase, Job, JobDescription, JobError, JobResult};
use crate::storage::{FrontendJobStore, WorkerJobStore};
use crate::{time, Error, Result};

/// Parse an external job id into the database key.
///
/// Anything that does not look like a job id maps to `UnknownJob` rather
/// than a validation error, so probing with garbage ids behaves like
/// probing with absent ones.
fn parse_job_id(job_id: &str) -> Result<i64> {
    job_id
        .parse::<i64>()
        .map_err(|_| Error::UnknownJob(job_id.to_string()))
}

fn job_from_row<P: DeserializeOwned>(row: &PgRow) -> Result<Job<P>> {
    let id: i64 = row.try_get("id")?;
    let phase: String = row.try_get("phase")?;
    let phase = ExecutionPhase::from_str(&phase)
        .ok_or_else(|| Error::Other(format!("Job {} has unknown phase {}", id, phase)))?;
    let parameters: serde_json::Value = row.try_get("parameters")?;
    let error_code: Option<String> = row.try_get("error_code")?;
    let error = match error_code {
        Some(error_code) => Some(JobError {
            error_code,
            message: row.try_get("error_message")?,
            detail: row.try_get("error_detail")?,
        }),
        None => None,
    };
    Ok(Job {
        job_id: id.to_string(),
        owner: row.try_get("owner")?,
        phase,
        run_id: row.try_get("run_id")?,
        creation_time: row.try_get("creation_time")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        destruction_time: row.try_get("destruction_time")?,
        execution_duration: row.try_get("execution_duration")?,
        quote: row.try_get("quote")?,
        message_id: row.try_get("message_id")?,
        error,
        parameters: serde_json::from_value(parameters)?,
        results: None,
    })
}

fn result_from_row(row: &PgRow) -> Result<JobResult> {
    Ok(JobResult {
        result_id: row.try_get("result_id")?,
        url: row.try_get("url")?,
        size: row.try_get("size")?,
        mime_type: row.try_get("mime_type")?,
    })
}

/// Frontend store backed by PostgreSQL.
pub struct PgFrontendStore<P> {
    pool: PgPool,
    _params: PhantomData<fn() -> P>,
}

impl<P> PgFrontendStore<P> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _params: PhantomData,
        }
    }
}

#[async_trait]
impl<P> FrontendJobStore<P> for PgFrontendStore<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
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
        let destruction_time = creation_time + chrono::Duration::seconds(lifetime);
        let parameters = serde_json::to_value(params)?;

        let row = sqlx::query(
            r#"
            INSERT INTO uws_jobs
                (owner, run_id, phase, creation_time, destruction_time,
                 execution_duration, parameters)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(run_id)
        .bind(ExecutionPhase::Pending.as_str())
        .bind(creation_time)
        .bind(destruction_time)
        .bind(execution_duration)
        .bind(&parameters)
        .fetch_one(&self.pool)
        .await?;
        let id: i64 = row.try_get("id")?;

        Ok(Job {
            job_id: id.to_string(),
            owner: owner.to_string(),
            phase: ExecutionPhase::Pending,
            run_id: run_id.map(str::to_string),
            creation_time,
            start_time: None,
            end_time: None,
            destruction_time,
            execution_duration,
            quote: None,
            message_id: None,
            error: None,
            parameters: serde_json::from_value(parameters)?,
            results: None,
        })
    }

    async fn get(&self, job_id: &str) -> Result<Job<P>> {
        let id = parse_job_id(job_id)?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM uws_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        let mut job = job_from_row::<P>(&row)?;

        let rows = sqlx::query(
            "SELECT result_id, url, size, mime_type FROM uws_job_results \
             WHERE job_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        if !rows.is_empty() {
            let results = rows
                .iter()
                .map(result_from_row)
                .collect::<Result<Vec<_>>>()?;
            job.results = Some(results);
        }
        Ok(job)
    }

    async fn list_jobs(
        &self,
        owner: &str,
        phases: Option<&[ExecutionPhase]>,
        after: Option<DateTime<Utc>>,
        count: Option<i64>,
    ) -> Result<Vec<JobDescription>> {
        let mut sql = String::from(
            "SELECT id, owner, phase, run_id, creation_time FROM uws_jobs WHERE owner = $1",
        );
        let mut bind_idx = 1;

        if phases.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND phase = ANY(${})", bind_idx));
        }
        if after.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND creation_time > ${}", bind_idx));
        }
        sql.push_str(" ORDER BY creation_time DESC, id DESC");
        if count.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" LIMIT ${}", bind_idx));
        }

        let mut query = sqlx::query(&sql).bind(owner);
        if let Some(phases) = phases {
            let phases: Vec<String> = phases.iter().map(|p| p.as_str().to_string()).collect();
            query = query.bind(phases);
        }
        if let Some(after) = after {
            query = query.bind(after);
        }
        if let Some(count) = count {
            query = query.bind(count);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let phase: String = row.try_get("phase")?;
                let phase = ExecutionPhase::from_str(&phase).ok_or_else(|| {
                    Error::Other(format!("Job {} has unknown phase {}", id, phase))
                })?;
                Ok(JobDescription {
                    job_id: id.to_string(),
                    owner: row.try_get("owner")?,
                    phase,
                    run_id: row.try_get("run_id")?,
                    creation_time: row.try_get("creation_time")?,
                })
            })
            .collect()
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let result = sqlx::query("DELETE FROM uws_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UnknownJob(job_id.to_string()));
        }
        Ok(())
    }

    async fn update_destruction(
        &self,
        job_id: &str,
        destruction: DateTime<Utc>,
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let result = sqlx::query("UPDATE uws_jobs SET destruction_time = $2 WHERE id = $1")
            .bind(id)
            .bind(destruction)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UnknownJob(job_id.to_string()));
        }
        Ok(())
    }

    async fn update_execution_duration(&self, job_id: &str, duration: i64) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let result = sqlx::query("UPDATE uws_jobs SET execution_duration = $2 WHERE id = $1")
            .bind(id)
            .bind(duration)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UnknownJob(job_id.to_string()));
        }
        Ok(())
    }

    async fn mark_queued(&self, job_id: &str, message_id: &str) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT phase, message_id FROM uws_jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))?;
        let phase: String = row.try_get("phase")?;
        let stored_message_id: Option<String> = row.try_get("message_id")?;

        match phase.as_str() {
            "pending" | "held" => {
                sqlx::query(
                    "UPDATE uws_jobs SET phase = $2, message_id = $3 WHERE id = $1",
                )
                .bind(id)
                .bind(ExecutionPhase::Queued.as_str())
                .bind(message_id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(())
            }
            "queued" if stored_message_id.as_deref() == Some(message_id) => {
                tx.commit().await?;
                Ok(())
            }
            _ => Err(Error::InvalidPhase(format!(
                "Cannot queue job {} in phase {}",
                job_id, phase
            ))),
        }
    }

    async fn availability(&self) -> Availability {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Availability::up(),
            Err(e) => Availability::down(e.to_string()),
        }
    }
}

/// Worker store backed by PostgreSQL.
///
/// Used only by the callback protocol; callers rely on these operations
/// never failing on stale or duplicate deliveries.
#[derive(Clone)]
pub struct PgWorkerStore {
    pool: PgPool,
}

impl PgWorkerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// The current phase and stored message id of a locked job row, or `None`
/// when the job has been deleted.
async fn lock_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: i64,
) -> Result<Option<(String, Option<String>)>> {
    let row = sqlx::query("SELECT phase, message_id FROM uws_jobs WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    match row {
        Some(row) => Ok(Some((row.try_get("phase")?, row.try_get("message_id")?))),
        None => Ok(None),
    }
}

#[async_trait]
impl WorkerJobStore for PgWorkerStore {
    async fn mark_started(
        &self,
        job_id: &str,
        message_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<()> {
        let id = parse_job_id(job_id)?;
        let mut tx = self.pool.begin().await?;

        let Some((phase, stored_message_id)) = lock_job(&mut tx, id).await? else {
            debug!(job_id, "Ignoring started callback for deleted job");
            return Ok(());
        };
        if stored_message_id.as_deref() != Some(message_id) {
            warn!(job_id, message_id, "Ignoring started callback with stale message id");
            return Ok(());
        }
        if phase != "queued" {
            debug!(job_id, phase, "Ignoring started callback in phase");
            return Ok(());
        }

        sqlx::query("UPDATE uws_jobs SET phase = $2, start_time = $3 WHERE id = $1")
            .bind(id)
            .bind(ExecutionPhase::Executing.as_str())
            .bind(start_time)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let Some((phase, stored_message_id)) = lock_job(&mut tx, id).await? else {
            debug!(job_id, "Ignoring completed callback for deleted job");
            return Ok(());
        };
        if stored_message_id.as_deref() != Some(message_id) {
            warn!(job_id, message_id, "Ignoring completed callback with stale message id");
            return Ok(());
        }
        if phase != "executing" {
            debug!(job_id, phase, "Ignoring completed callback in phase");
            return Ok(());
        }

        sqlx::query("UPDATE uws_jobs SET phase = $2, end_time = $3 WHERE id = $1")
            .bind(id)
            .bind(ExecutionPhase::Completed.as_str())
            .bind(end_time)
            .execute(&mut *tx)
            .await?;
        for result in results {
            sqlx::query(
                "INSERT INTO uws_job_results (job_id, result_id, url, size, mime_type) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(&result.result_id)
            .bind(&result.url)
            .bind(result.size)
            .bind(&result.mime_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let Some((phase, stored_message_id)) = lock_job(&mut tx, id).await? else {
            debug!(job_id, "Ignoring failed callback for deleted job");
            return Ok(());
        };
        if stored_message_id.as_deref() != Some(message_id) {
            warn!(job_id, message_id, "Ignoring failed callback with stale message id");
            return Ok(());
        }
        if phase != "queued" && phase != "executing" {
            debug!(job_id, phase, "Ignoring failed callback in phase");
            return Ok(());
        }

        sqlx::query(
            "UPDATE uws_jobs SET phase = $2, end_time = $3, error_code = $4, \
             error_message = $5, error_detail = $6 WHERE id = $1",
        )
        .bind(id)
        .bind(ExecutionPhase::Error.as_str())
        .bind(end_time)
        .bind(&error.error_code)
        .bind(&error.message)
        .bind(&error.detail)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
