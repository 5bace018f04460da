//! Tests for sync cutout requests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use skycut_core::models::JobResult;

use common::{cutout_parameters, response_json, test_app, uws_config};

#[tokio::test]
async fn test_sync() {
    let app = test_app(uws_config());
    let worker = app.complete_next_job(vec![JobResult {
        result_id: "cutout".to_string(),
        url: "s3://some-bucket/some/path".to_string(),
        size: None,
        mime_type: Some("application/fits".to_string()),
    }]);

    let response = app
        .request(
            "POST",
            "/api/cutout/sync",
            Some("someone"),
            Some(json!({"parameters": cutout_parameters()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["Location"].to_str().unwrap();
    assert!(location.starts_with("https://example.com/some/path?"));
    assert!(location.contains("signature="));
    worker.await.unwrap();
}

#[tokio::test]
async fn test_sync_timeout() {
    let app = test_app(uws_config());

    // No worker ever reports back, so the request fails after the
    // configured sync timeout.
    let response = app
        .request(
            "POST",
            "/api/cutout/sync",
            Some("someone"),
            Some(json!({"parameters": cutout_parameters()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["detail"][0]["type"], "sync_timeout");
}

#[tokio::test]
async fn test_sync_task_error() {
    let app = test_app(uws_config());
    let worker = app.fail_next_job(
        "TaskError",
        r#"{"error_code": "usage_error", "message": "Something failed"}"#,
    );

    let response = app
        .request(
            "POST",
            "/api/cutout/sync",
            Some("someone"),
            Some(json!({"parameters": cutout_parameters()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["detail"][0]["type"], "usage_error");
    assert_eq!(body["detail"][0]["msg"], "Something failed");
    worker.await.unwrap();
}

#[tokio::test]
async fn test_sync_bad_parameters() {
    let app = test_app(uws_config());
    let bad_stencils = [
        json!({}),
        json!({"type": "pos", "center": {"ra": 0.0, "dec": 0.0}, "radius": 1.0}),
        json!({"type": "polygon", "vertices": [{"ra": 1.0, "dec": 2.0}]}),
        json!({
            "type": "polygon",
            "vertices": [{"ra": 1.0, "dec": 2.0}, {"ra": 2.0, "dec": 3.0}],
        }),
    ];
    for stencil in bad_stencils {
        let response = app
            .request(
                "POST",
                "/api/cutout/sync",
                Some("someone"),
                Some(json!({
                    "parameters": {"ids": ["1:2:a:b"], "stencils": [stencil]},
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
