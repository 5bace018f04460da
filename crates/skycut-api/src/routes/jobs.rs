//! Handlers for the UWS job API.
//!
//! The async API lives under `/api/cutout/jobs` and the sync API under
//! `/api/cutout/sync`. Create, start, and sync requests answer with 303
//! redirects: to the job resource for the async routes and to the signed
//! first-result URL for the sync route.

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use url::form_urlencoded;

use skycut_core::cutout::CutoutParameters;
use skycut_core::models::{ExecutionPhase, Job, JobDescription, JobUpdate};
use skycut_core::{time, Error, ErrorLocation};

use super::job_url;
use crate::error::{job_path_error, ApiError};
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Information required to create a new job.
#[derive(Debug, Deserialize)]
pub struct CutoutJobCreate {
    /// Parameters of the job
    pub parameters: CutoutParameters,

    /// Automatically start the job after creating it
    #[serde(default)]
    pub start: bool,

    /// Opaque string provided by the client, recorded with the job
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Body for the route to start a job.
///
/// Required only to force the input to be JSON and thus force a CORS
/// check, preventing CSRF that would otherwise be possible with a bodyless
/// POST with any content type.
#[derive(Debug, Deserialize)]
pub struct JobStart {
    pub start: bool,
}

#[derive(Debug, Deserialize)]
pub struct GetJobQuery {
    /// Maximum number of seconds to wait for a phase change, or -1 to wait
    /// as long as the server permits
    pub wait: Option<i64>,

    /// Initial phase for waiting; returns immediately if the phase has
    /// already changed
    pub phase: Option<String>,
}

/// Synchronously request a cutout.
///
/// Creates and starts a job, waits for it, and redirects to the resulting
/// image at the underlying object store.
pub async fn post_sync(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(create): Json<CutoutJobCreate>,
) -> Result<Response, ApiError> {
    let job = state
        .job_service
        .create(&user, create.parameters, create.run_id.as_deref())
        .await?;
    info!(job_id = %job.job_id, run_id = job.run_id.as_deref(), "Created job");
    state.job_service.start(&user, &job.job_id).await?;
    info!(job_id = %job.job_id, run_id = job.run_id.as_deref(), "Started job");
    let url = state.job_service.get_first_result(&user, &job.job_id).await?;
    Ok((StatusCode::SEE_OTHER, [(LOCATION, url)]).into_response())
}

/// List the jobs of the current user, most recently created first.
pub async fn get_job_list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<JobDescription>>, ApiError> {
    let query = parse_query_pairs(raw.as_deref().unwrap_or(""))?;
    let phases = if query.phases.is_empty() {
        None
    } else {
        Some(query.phases.as_slice())
    };
    let jobs = state
        .job_service
        .list_jobs(&user, phases, query.after, query.last)
        .await?;
    Ok(Json(jobs))
}

/// Create a new async job, redirecting to the job resource.
pub async fn create_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Json(create): Json<CutoutJobCreate>,
) -> Result<Response, ApiError> {
    let job = state
        .job_service
        .create(&user, create.parameters, create.run_id.as_deref())
        .await?;
    info!(job_id = %job.job_id, run_id = job.run_id.as_deref(), "Created job");
    if create.start {
        state
            .job_service
            .start(&user, &job.job_id)
            .await
            .map_err(job_path_error)?;
        info!(job_id = %job.job_id, run_id = job.run_id.as_deref(), "Started job");
    }
    let url = job_url(&headers, &job.job_id);
    Ok((StatusCode::SEE_OTHER, [(LOCATION, url)]).into_response())
}

/// Job details, optionally long-polling for a phase change.
pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(job_id): Path<String>,
    Query(query): Query<GetJobQuery>,
) -> Result<Json<Job<CutoutParameters>>, ApiError> {
    let wait_phase = match query.phase.as_deref() {
        Some(value) => Some(ExecutionPhase::from_str(value).ok_or_else(|| {
            ApiError::from(Error::validation(format!("Unknown phase {}", value)))
                .at(ErrorLocation::Query, "phase")
        })?),
        None => None,
    };
    let job = state
        .job_service
        .get(&user, &job_id, query.wait, wait_phase, false)
        .await
        .map_err(job_path_error)?;
    Ok(Json(job))
}

/// Delete a job.
pub async fn delete_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .job_service
        .delete(&user, &job_id)
        .await
        .map_err(job_path_error)?;
    info!(job_id = %job_id, "Deleted job");
    Ok(StatusCode::NO_CONTENT)
}

/// Update a job's destruction time or execution duration.
pub async fn patch_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(job_id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<Job<CutoutParameters>>, ApiError> {
    state
        .job_service
        .update(&user, &job_id, &update)
        .await
        .map_err(|error| match error {
            Error::Validation(_) => {
                ApiError::from(error).at(ErrorLocation::Body, "execution_duration")
            }
            error => job_path_error(error),
        })?;
    let job = state
        .job_service
        .get(&user, &job_id, None, None, false)
        .await
        .map_err(job_path_error)?;
    Ok(Json(job))
}

/// Start a job, redirecting to the job resource.
pub async fn job_start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    Json(start): Json<JobStart>,
) -> Result<Response, ApiError> {
    if !start.start {
        return Err(
            ApiError::from(Error::validation("start must be true"))
                .at(ErrorLocation::Body, "start"),
        );
    }
    state
        .job_service
        .start(&user, &job_id)
        .await
        .map_err(job_path_error)?;
    info!(job_id = %job_id, "Started job");
    let url = job_url(&headers, &job_id);
    Ok((StatusCode::SEE_OTHER, [(LOCATION, url)]).into_response())
}

struct JobListQuery {
    phases: Vec<ExecutionPhase>,
    after: Option<DateTime<Utc>>,
    last: Option<i64>,
}

/// Parse the job-list query string by hand.
///
/// The `phase` key repeats, which `Query` cannot express.
fn parse_query_pairs(raw: &str) -> Result<JobListQuery, ApiError> {
    let mut query = JobListQuery {
        phases: Vec::new(),
        after: None,
        last: None,
    };
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "phase" => {
                let phase = ExecutionPhase::from_str(&value).ok_or_else(|| {
                    ApiError::from(Error::validation(format!("Unknown phase {}", value)))
                        .at(ErrorLocation::Query, "phase")
                })?;
                query.phases.push(phase);
            }
            "after" => {
                let after = time::parse_isodatetime(&value).ok_or_else(|| {
                    ApiError::from(Error::validation(format!("Invalid date {}", value)))
                        .at(ErrorLocation::Query, "after")
                })?;
                query.after = Some(after);
            }
            "last" => {
                let last = value.parse::<i64>().map_err(|_| {
                    ApiError::from(Error::validation(format!("Invalid count {}", value)))
                        .at(ErrorLocation::Query, "last")
                })?;
                query.last = Some(last);
            }
            _ => {}
        }
    }
    Ok(query)
}
