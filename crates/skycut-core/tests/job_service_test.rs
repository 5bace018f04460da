//! Tests for the UWS job service.

mod common;

use std::sync::Arc;

use chrono::Duration;

use skycut_core::callbacks::{FailureEnvelope, JobCallbackHandler};
use skycut_core::models::{ExecutionPhase, JobResult, JobUpdate};
use skycut_core::Error;

use common::{harness, frozen_harness, uws_config, TrivialParameters};

#[tokio::test]
async fn test_create_and_get() {
    let h = harness(uws_config());
    let job = h
        .service
        .create("user", TrivialParameters::new("bar"), Some("some-run-id"))
        .await
        .unwrap();
    assert_eq!(job.job_id, "1");
    assert_eq!(job.phase, ExecutionPhase::Pending);
    assert_eq!(job.execution_duration, Some(600));
    assert_eq!(
        job.destruction_time,
        job.creation_time + Duration::hours(24)
    );
    assert!(job.start_time.is_none());
    assert!(job.results.is_none());

    let fetched = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(fetched.owner, "user");
    assert_eq!(fetched.run_id.as_deref(), Some("some-run-id"));
    assert_eq!(fetched.parameters, TrivialParameters::new("bar"));

    // Another user cannot see the job even though it exists.
    let error = h
        .service
        .get("other", "1", None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::PermissionDenied(_)));

    // A missing job is reported as unknown.
    let error = h
        .service
        .get("user", "2", None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownJob(_)));
}

#[tokio::test]
async fn test_start() {
    let h = harness(uws_config());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();

    let error = h.service.start("other", "1").await.unwrap_err();
    assert!(matches!(error, Error::PermissionDenied(_)));

    let message_id = h.service.start("user", "1").await.unwrap();
    let submissions = h.queue.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].message_id, message_id);
    assert_eq!(submissions[0].job_id, "1");
    assert_eq!(submissions[0].timeout_ms, Some(600_000));

    let job = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(job.phase, ExecutionPhase::Queued);

    // A queued job cannot be started again.
    let error = h.service.start("user", "1").await.unwrap_err();
    assert!(matches!(error, Error::InvalidPhase(_)));
}

#[tokio::test]
async fn test_full_lifecycle() {
    let h = harness(uws_config());
    let handler = JobCallbackHandler::new(h.store.clone());
    let job = h
        .service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    let message_id = h.service.start("user", "1").await.unwrap();

    handler
        .job_started("1", &message_id, skycut_core::time::now())
        .await;
    let executing = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(executing.phase, ExecutionPhase::Executing);
    assert!(executing.start_time.is_some());
    assert!(executing.end_time.is_none());

    handler
        .job_completed(
            "1",
            &message_id,
            vec![JobResult {
                result_id: "cutout".to_string(),
                url: "s3://some-bucket/some/path".to_string(),
                size: None,
                mime_type: Some("application/fits".to_string()),
            }],
        )
        .await;

    let completed = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(completed.phase, ExecutionPhase::Completed);
    let start_time = completed.start_time.unwrap();
    let end_time = completed.end_time.unwrap();
    assert!(end_time >= start_time);
    assert!(start_time >= job.creation_time);
    assert!(completed.error.is_none());

    // The persistent result URL is rewritten to a signed URL.
    let results = completed.results.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result_id, "cutout");
    assert!(results[0].url.starts_with("https://example.com/some/path?"));
    assert!(results[0].url.contains("signature="));
}

#[tokio::test]
async fn test_update() {
    let h = harness(uws_config());
    let job = h
        .service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();

    let update = JobUpdate {
        destruction_time: Some(job.creation_time + Duration::hours(48)),
        execution_duration: Some(1200),
    };
    h.service.update("user", "1", &update).await.unwrap();
    let updated = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(
        updated.destruction_time,
        job.creation_time + Duration::hours(48)
    );
    assert_eq!(updated.execution_duration, Some(1200));

    // Zero execution duration is invalid, not a silent no-op.
    let update = JobUpdate {
        destruction_time: None,
        execution_duration: Some(0),
    };
    let error = h.service.update("user", "1", &update).await.unwrap_err();
    assert!(matches!(error, Error::Validation(_)));

    let error = h
        .service
        .update("other", "1", &JobUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn test_update_clamped_by_policy() {
    let h = frozen_harness(uws_config());
    let job = h
        .service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();

    // The frozen policy returns the current values, so nothing changes.
    let update = JobUpdate {
        destruction_time: Some(job.creation_time + Duration::hours(48)),
        execution_duration: Some(1200),
    };
    h.service.update("user", "1", &update).await.unwrap();
    let unchanged = h.service.get("user", "1", None, None, false).await.unwrap();
    assert_eq!(unchanged.destruction_time, job.destruction_time);
    assert_eq!(unchanged.execution_duration, Some(600));
}

#[tokio::test]
async fn test_list_jobs() {
    let h = harness(uws_config());
    for id in ["bar", "baz", "foo"] {
        h.service
            .create("user", TrivialParameters::new(id), None)
            .await
            .unwrap();
    }
    h.service
        .create("otheruser", TrivialParameters::new("other"), None)
        .await
        .unwrap();

    // Newest first, with the job id as tie-breaker for equal timestamps.
    let jobs = h.service.list_jobs("user", None, None, None).await.unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, ["3", "2", "1"]);
    assert!(jobs.iter().all(|j| j.owner == "user"));

    // Limit by count.
    let jobs = h
        .service
        .list_jobs("user", None, None, Some(1))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "3");

    // Filter by creation time.
    let threshold = jobs[0].creation_time - Duration::hours(1);
    let jobs = h
        .service
        .list_jobs("user", None, Some(threshold), None)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 3);
    let threshold = jobs[0].creation_time + Duration::hours(1);
    let jobs = h
        .service
        .list_jobs("user", None, Some(threshold), None)
        .await
        .unwrap();
    assert!(jobs.is_empty());

    // Filter by phase.
    h.service.start("user", "2").await.unwrap();
    let jobs = h
        .service
        .list_jobs(
            "user",
            Some(&[ExecutionPhase::Queued, ExecutionPhase::Executing]),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "2");
    assert_eq!(jobs[0].phase, ExecutionPhase::Queued);
}

#[tokio::test]
async fn test_delete() {
    let h = harness(uws_config());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    let message_id = h.service.start("user", "1").await.unwrap();

    let error = h.service.delete("other", "1").await.unwrap_err();
    assert!(matches!(error, Error::PermissionDenied(_)));

    h.service.delete("user", "1").await.unwrap();
    let error = h
        .service
        .get("user", "1", None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownJob(_)));

    // Deletion does not cancel the worker; its eventual callbacks are
    // no-ops.
    let handler = JobCallbackHandler::new(h.store.clone());
    handler
        .job_started("1", &message_id, skycut_core::time::now())
        .await;
    handler
        .job_failed(
            "1",
            &message_id,
            FailureEnvelope {
                error_type: "TaskError".to_string(),
                message: "ignored".to_string(),
            },
        )
        .await;
    let error = h
        .service
        .get("user", "1", None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::UnknownJob(_)));
}

#[tokio::test]
async fn test_sync_facade() {
    let h = harness(uws_config());
    let handler = JobCallbackHandler::new(h.store.clone());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    let message_id = h.service.start("user", "1").await.unwrap();

    // Simulate a worker finishing while the facade waits.
    let worker = tokio::spawn({
        let handler = handler.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            handler
                .job_started("1", &message_id, skycut_core::time::now())
                .await;
            handler
                .job_completed(
                    "1",
                    &message_id,
                    vec![JobResult {
                        result_id: "cutout".to_string(),
                        url: "s3://some-bucket/some/path".to_string(),
                        size: None,
                        mime_type: Some("application/fits".to_string()),
                    }],
                )
                .await;
        }
    });

    let url = h.service.get_first_result("user", "1").await.unwrap();
    assert!(url.starts_with("https://example.com/some/path?"));
    worker.await.unwrap();
}

#[tokio::test]
async fn test_sync_timeout() {
    let h = harness(uws_config());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    h.service.start("user", "1").await.unwrap();

    // No worker ever reports, so the facade times out after sync_timeout.
    let error = h.service.get_first_result("user", "1").await.unwrap_err();
    assert!(matches!(error, Error::SyncTimeout(_)));
}

#[tokio::test]
async fn test_sync_task_error() {
    let h = harness(uws_config());
    let handler = JobCallbackHandler::new(h.store.clone());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    let message_id = h.service.start("user", "1").await.unwrap();

    handler
        .job_started("1", &message_id, skycut_core::time::now())
        .await;
    handler
        .job_failed(
            "1",
            &message_id,
            FailureEnvelope {
                error_type: "TaskError".to_string(),
                message: r#"{"error_code": "usage_error", "message": "Something failed"}"#
                    .to_string(),
            },
        )
        .await;

    let error = h.service.get_first_result("user", "1").await.unwrap_err();
    match error {
        Error::Task(error) => {
            assert_eq!(error.error_code, "usage_error");
            assert_eq!(error.message, "Something failed");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_sync_no_results() {
    let h = harness(uws_config());
    let handler = JobCallbackHandler::new(h.store.clone());
    h.service
        .create("user", TrivialParameters::new("bar"), None)
        .await
        .unwrap();
    let message_id = h.service.start("user", "1").await.unwrap();

    handler
        .job_started("1", &message_id, skycut_core::time::now())
        .await;
    handler.job_completed("1", &message_id, vec![]).await;

    let error = h.service.get_first_result("user", "1").await.unwrap_err();
    match error {
        Error::Task(error) => assert_eq!(error.error_code, "no_results"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_availability() {
    let h = harness(uws_config());
    let availability = h.service.availability().await;
    assert!(availability.available);
}
