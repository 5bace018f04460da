//! HTTP routes for the cutout service.

use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod index;
pub mod jobs;

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/cutout", get(index::get_index))
        .route("/api/cutout/availability", get(index::get_availability))
        .route("/api/cutout/capabilities", get(index::get_capabilities))
        .route("/api/cutout/sync", post(jobs::post_sync))
        .route(
            "/api/cutout/jobs",
            get(jobs::get_job_list).post(jobs::create_job),
        )
        .route(
            "/api/cutout/jobs/:job_id",
            get(jobs::get_job)
                .patch(jobs::patch_job)
                .delete(jobs::delete_job),
        )
        .route("/api/cutout/jobs/:job_id/start", post(jobs::job_start))
        .with_state(state)
}

/// External base URL of the current request.
///
/// Skycut deploys behind an ingress that terminates TLS, so the request
/// seen by the application is plain HTTP; redirect targets must honor
/// `X-Forwarded-Proto` and the `Host` header to point back at the external
/// address.
pub fn request_base(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

/// External URL of a job resource.
pub fn job_url(headers: &HeaderMap, job_id: &str) -> String {
    format!("{}/api/cutout/jobs/{}", request_base(headers), job_id)
}
