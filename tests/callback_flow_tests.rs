// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end callback listener and orchestration tests.
//!
//! A mocked provider stands in for Strava; the listener, token exchange and
//! pagination all run for real against it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

use strava_export::config::Config;
use strava_export::error::AppError;
use strava_export::routes::create_router;
use strava_export::services::ingest;
use strava_export::services::strava::{StravaClient, PAGE_SIZE};
use strava_export::services::JsonExportSink;
use strava_export::{AppState, CancelFlag, ListenerState};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(export_dir: &TempDir) -> Config {
    Config {
        port: 0,
        callback_timeout_secs: 30,
        export_dir: export_dir.path().to_path_buf(),
        ..Config::default()
    }
}

fn strava_for(provider: &MockServer) -> StravaClient {
    StravaClient::new("test_client_id".to_string(), "test_secret".to_string())
        .with_oauth_base(format!("{}/oauth", provider.uri()))
        .with_api_base(format!("{}/api/v3", provider.uri()))
        .with_page_delay(Duration::ZERO)
}

fn page_of(start: u64, len: usize) -> Vec<Value> {
    (0..len as u64)
        .map(|i| json!({ "id": start + i, "sport_type": "Run" }))
        .collect()
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-access",
            "refresh_token": "test-refresh",
            "expires_at": 1754500000_i64,
        })))
        .mount(server)
        .await;
}

async fn mount_athlete_endpoint(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "username": "testuser",
            "firstname": "Test",
            "lastname": "User",
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_callback_with_code_runs_full_pipeline() {
    let provider = MockServer::start().await;
    mount_token_endpoint(&provider).await;
    mount_athlete_endpoint(&provider).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "sport_type": "Run" },
            { "id": 2, "sport_type": "Ride" },
            { "id": 3, "sport_type": "Run" },
        ])))
        .expect(1)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let addr = ingestor.local_addr();
    let run = tokio::spawn(ingestor.wait_for_callback());

    let response = reqwest::get(format!("http://{addr}/?code=test-code"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Authorization successful"));
    assert!(body.contains("3 activities exported"));

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.athlete_label, "testuser");
    assert!(!report.is_partial());
    assert_eq!(
        report.by_category,
        vec![("Run".to_string(), 2), ("Ride".to_string(), 1)]
    );

    // The export file holds the raw records, in order
    let exported: Vec<Value> = serde_json::from_str(
        &std::fs::read_to_string(&report.export_path).unwrap(),
    )
    .unwrap();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported[0]["id"], 1);
}

#[tokio::test]
async fn test_callback_without_code_reports_missing_code() {
    let provider = MockServer::start().await;
    // The exchanger must never be called without a code
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let addr = ingestor.local_addr();
    let run = tokio::spawn(ingestor.wait_for_callback());

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("No authorization code received"));

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::CallbackMissingCode));
}

#[tokio::test]
async fn test_provider_error_redirect_ends_the_run() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let addr = ingestor.local_addr();
    let run = tokio::spawn(ingestor.wait_for_callback());

    let response = reqwest::get(format!("http://{addr}/?error=access_denied"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    match run.await.unwrap().unwrap_err() {
        AppError::CallbackDenied(error) => assert_eq!(error, "access_denied"),
        other => panic!("expected CallbackDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_exchange_consumes_the_code_and_ends_the_run() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid code"))
        .expect(1)
        .mount(&provider)
        .await;
    // No token means no activity fetch may happen
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let addr = ingestor.local_addr();
    let run = tokio::spawn(ingestor.wait_for_callback());

    let response = reqwest::get(format!("http://{addr}/?code=already-used"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);

    match run.await.unwrap().unwrap_err() {
        AppError::AuthExchange { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(body, "invalid code");
        }
        other => panic!("expected AuthExchange, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pagination_failure_is_downgraded_to_partial_success() {
    let provider = MockServer::start().await;
    mount_token_endpoint(&provider).await;
    mount_athlete_endpoint(&provider).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0, PAGE_SIZE as usize)))
        .expect(1)
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let addr = ingestor.local_addr();
    let run = tokio::spawn(ingestor.wait_for_callback());

    let response = reqwest::get(format!("http://{addr}/?code=test-code"))
        .await
        .unwrap();
    // Partial success still answers the browser positively
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("partial"));

    let report = run.await.unwrap().unwrap();
    assert!(report.is_partial());
    assert_eq!(report.total, PAGE_SIZE as usize);
    assert!(matches!(
        report.pagination_error,
        Some(AppError::PageFetch { page: 2, .. })
    ));

    // The partial collection was exported anyway
    let exported: Vec<Value> = serde_json::from_str(
        &std::fs::read_to_string(&report.export_path).unwrap(),
    )
    .unwrap();
    assert_eq!(exported.len(), PAGE_SIZE as usize);
}

#[tokio::test]
async fn test_authorize_url_targets_the_bound_port() {
    let provider = MockServer::start().await;
    let export_dir = TempDir::new().unwrap();

    let ingestor = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();
    let port = ingestor.local_addr().port();

    let url = ingestor.authorize_url();
    assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
    assert!(url.contains("client_id=test_client_id"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("approval_prompt=force"));
    assert!(url.contains("scope=read%2Cactivity%3Aread_all"));

    let redirect = urlencoding::encode(&format!("http://localhost:{port}")).into_owned();
    assert!(url.contains(&redirect));
}

#[tokio::test]
async fn test_timeout_resolves_the_run_and_releases_the_port() {
    let provider = MockServer::start().await;
    let export_dir = TempDir::new().unwrap();

    let mut config = test_config(&export_dir);
    config.callback_timeout_secs = 1;

    let ingestor = ingest::bind(config, strava_for(&provider)).await.unwrap();
    let addr = ingestor.local_addr();

    let err = ingestor.wait_for_callback().await.unwrap_err();
    assert!(matches!(err, AppError::CallbackTimeout(1)));

    // The port must be free again once the run resolves
    std::net::TcpListener::bind(addr).expect("port should be released");
}

#[tokio::test]
async fn test_second_run_on_a_held_port_fails_fast() {
    let provider = MockServer::start().await;
    let export_dir = TempDir::new().unwrap();

    let first = ingest::bind(test_config(&export_dir), strava_for(&provider))
        .await
        .unwrap();

    let mut config = test_config(&export_dir);
    config.port = first.local_addr().port();

    let err = ingest::bind(config, strava_for(&provider)).await.unwrap_err();
    assert!(matches!(err, AppError::Bind { .. }));
}

#[tokio::test]
async fn test_extra_callback_is_answered_but_not_signalled() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&provider)
        .await;

    let export_dir = TempDir::new().unwrap();
    // A run that already consumed its one interaction
    let state = Arc::new(AppState {
        config: test_config(&export_dir),
        strava: strava_for(&provider),
        sink: JsonExportSink::new(export_dir.path()),
        listener: Mutex::new(ListenerState::Processing),
        cancel: CancelFlag::new(),
    });

    let app = create_router(state);
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/?code=duplicate")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
}
