//! Database pool creation and schema management.
//!
//! All connections are pinned to `REPEATABLE READ` so that the
//! read-modify-write sequences in the stores observe consistent snapshots.

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use url::Url;

use crate::config::DatabaseConfig;
use crate::{Error, Result};

/// Create a connection pool for the UWS database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| Error::Config(format!("Invalid database URL: {}", e)))?;
    if let Some(password) = &config.password {
        url.set_password(Some(password))
            .map_err(|_| Error::Config("Cannot set database password".to_string()))?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(
                    "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                )
                .execute(&mut *conn)
                .await?;
                Ok(())
            })
        })
        .connect(url.as_str())
        .await?;
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS uws_jobs (
        id BIGSERIAL PRIMARY KEY,
        owner VARCHAR(64) NOT NULL,
        run_id VARCHAR(64),
        phase VARCHAR(16) NOT NULL,
        message_id VARCHAR(64),
        creation_time TIMESTAMPTZ NOT NULL,
        start_time TIMESTAMPTZ,
        end_time TIMESTAMPTZ,
        destruction_time TIMESTAMPTZ NOT NULL,
        execution_duration BIGINT,
        quote TIMESTAMPTZ,
        error_code VARCHAR(64),
        error_message TEXT,
        error_detail TEXT,
        parameters JSONB NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS uws_jobs_by_owner
        ON uws_jobs (owner, creation_time DESC, id DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS uws_job_results (
        id BIGSERIAL PRIMARY KEY,
        job_id BIGINT NOT NULL REFERENCES uws_jobs (id) ON DELETE CASCADE,
        result_id VARCHAR(64) NOT NULL,
        url TEXT NOT NULL,
        size BIGINT,
        mime_type VARCHAR(64),
        UNIQUE (job_id, result_id)
    )
    "#,
];

/// Database schema manager
pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    /// Create a new migrator instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the UWS schema if it does not exist.
    pub async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema initialized");
        Ok(())
    }

    /// Drop all UWS tables, then recreate the schema.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS uws_job_results")
            .execute(&self.pool)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS uws_jobs")
            .execute(&self.pool)
            .await?;
        info!("Dropped existing database schema");
        self.initialize().await
    }
}
