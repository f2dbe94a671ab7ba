use std::time::Duration;

use serde_json::json;
use upload_engine::{ClientSettings, FailureKind, HttpBackend, UploadBackend};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    })
    .expect("backend")
}

#[tokio::test]
async fn job_status_returns_raw_payload() {
    let server = MockServer::start().await;
    let payload = json!({
        "status": "processing",
        "progress": {"percent": 40, "step": "Parsing rows"},
        "unknown": {"ignored": true}
    });
    Mock::given(method("GET"))
        .and(path("/api/jobs/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let raw = backend_for(&server)
        .job_status("job-42")
        .await
        .expect("status ok");
    assert_eq!(raw, payload);
}

#[tokio::test]
async fn job_status_uses_configured_template() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/status/abc/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(ClientSettings {
        base_url: server.uri(),
        job_status_path: "/v2/status/{job_id}/detail".to_string(),
        ..ClientSettings::default()
    })
    .unwrap();
    let raw = backend.job_status("abc").await.expect("status ok");
    assert_eq!(raw["status"], "completed");
}

#[tokio::test]
async fn job_id_is_encoded_as_a_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/batch%207%2Fa+b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .expect(1)
        .mount(&server)
        .await;

    let raw = backend_for(&server)
        .job_status("batch 7/a+b")
        .await
        .expect("status ok");
    assert_eq!(raw["status"], "queued");
}

#[tokio::test]
async fn missing_job_endpoint_is_status_error() {
    let server = MockServer::start().await;

    let err = backend_for(&server).job_status("nope").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn non_json_status_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
        .mount(&server)
        .await;

    let err = backend_for(&server).job_status("j").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidResponse);
}

#[tokio::test]
async fn slow_status_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(ClientSettings {
        base_url: server.uri(),
        status_timeout: Duration::from_millis(50),
        ..ClientSettings::default()
    })
    .unwrap();
    let err = backend.job_status("slow").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}
