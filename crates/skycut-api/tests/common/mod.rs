//! Shared fixtures for the API tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use skycut_api::{build_router, AppState};
use skycut_core::callbacks::JobCallbackHandler;
use skycut_core::config::{SigningConfig, UwsConfig};
use skycut_core::cutout::CutoutParameters;
use skycut_core::models::{Job, JobResult};
use skycut_core::policy::Policy;
use skycut_core::queue::{Dispatcher, JobSubmission, RecordingWorkQueue};
use skycut_core::signing::HmacUrlSigner;
use skycut_core::storage::MemoryJobStore;
use skycut_core::{JobService, Result};

/// Policy that accepts all changes, unlike the production cutout policy.
pub struct PermissivePolicy {
    dispatcher: Dispatcher,
}

#[async_trait]
impl Policy<CutoutParameters> for PermissivePolicy {
    fn validate_params(&self, _params: &CutoutParameters) -> Result<()> {
        Ok(())
    }

    fn validate_destruction(
        &self,
        requested: DateTime<Utc>,
        _job: &Job<CutoutParameters>,
    ) -> DateTime<Utc> {
        requested
    }

    fn validate_execution_duration(
        &self,
        requested: i64,
        _job: &Job<CutoutParameters>,
    ) -> i64 {
        requested
    }

    async fn dispatch(&self, job: &Job<CutoutParameters>) -> Result<String> {
        self.dispatcher.dispatch(job).await
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryJobStore<CutoutParameters>>,
    pub queue: Arc<RecordingWorkQueue>,
    pub handler: JobCallbackHandler,
}

pub fn uws_config() -> UwsConfig {
    UwsConfig {
        execution_duration: Some(600),
        lifetime: 24 * 60 * 60,
        wait_timeout: 1,
        sync_timeout: 2,
    }
}

pub fn test_app(config: UwsConfig) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(RecordingWorkQueue::new());
    let policy = Arc::new(PermissivePolicy {
        dispatcher: Dispatcher::new(queue.clone(), "cutout"),
    });
    let signer = Arc::new(HmacUrlSigner::new(&SigningConfig {
        base_url: "https://example.com".to_string(),
        service_account: "signer@example.com".to_string(),
        secret: "squeamish ossifrage".to_string(),
        url_lifetime: 15 * 60,
    }));
    let job_service = Arc::new(JobService::new(config, policy, store.clone(), signer));
    let handler = JobCallbackHandler::new(store.clone());
    TestApp {
        app: build_router(AppState::new(job_service)),
        store,
        queue,
        handler,
    }
}

/// The standard single-circle cutout request body.
pub fn cutout_parameters() -> Value {
    json!({
        "ids": ["1:2:band:value"],
        "stencils": [{
            "type": "circle",
            "center": {"ra": 0.0, "dec": -2.0},
            "radius": 2.0,
        }],
    })
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example.com");
        if let Some(user) = user {
            builder = builder.header("X-Auth-Request-User", user);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Wait for the next submission to show up on the recording queue.
    pub async fn next_submission(&self) -> JobSubmission {
        wait_for_submission(&self.queue).await
    }

    /// Run a background worker that completes the next submitted job.
    pub fn complete_next_job(&self, results: Vec<JobResult>) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            let submission = wait_for_submission(&queue).await;
            handler
                .job_started(
                    &submission.job_id,
                    &submission.message_id,
                    skycut_core::time::now(),
                )
                .await;
            handler
                .job_completed(&submission.job_id, &submission.message_id, results)
                .await;
        })
    }

    /// Run a background worker that fails the next submitted job.
    pub fn fail_next_job(
        &self,
        error_type: &str,
        message: &str,
    ) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let handler = self.handler.clone();
        let envelope = skycut_core::callbacks::FailureEnvelope {
            error_type: error_type.to_string(),
            message: message.to_string(),
        };
        tokio::spawn(async move {
            let submission = wait_for_submission(&queue).await;
            handler
                .job_started(
                    &submission.job_id,
                    &submission.message_id,
                    skycut_core::time::now(),
                )
                .await;
            handler
                .job_failed(&submission.job_id, &submission.message_id, envelope)
                .await;
        })
    }
}

async fn wait_for_submission(queue: &RecordingWorkQueue) -> JobSubmission {
    for _ in 0..100 {
        if let Some(submission) = queue.submissions().into_iter().next() {
            return submission;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no submission arrived");
}

/// Decode a JSON response body.
pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
