//! Handlers for the service root: metadata, availability, capabilities.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use skycut_core::models::Availability;

use super::request_base;
use crate::state::AppState;

/// Application metadata returned from the external root.
#[derive(Debug, Serialize)]
pub struct Index {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

pub async fn get_index() -> Json<Index> {
    Json(Index {
        name: "cutout",
        version: skycut_core::VERSION,
        description: env!("CARGO_PKG_DESCRIPTION"),
    })
}

/// VOSI-availability resource for the image cutout service.
pub async fn get_availability(State(state): State<AppState>) -> Json<Availability> {
    Json(state.job_service.availability().await)
}

/// Capabilities for the SODA service.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub availability_url: String,
    pub capabilities_url: String,
    pub soda_sync_url: String,
    pub soda_async_url: String,
}

/// VOSI-capabilities resource for the image cutout service.
pub async fn get_capabilities(headers: HeaderMap) -> Json<Capabilities> {
    let base = request_base(&headers);
    Json(Capabilities {
        availability_url: format!("{}/api/cutout/availability", base),
        capabilities_url: format!("{}/api/cutout/capabilities", base),
        soda_sync_url: format!("{}/api/cutout/sync", base),
        soda_async_url: format!("{}/api/cutout/jobs", base),
    })
}
