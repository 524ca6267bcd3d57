//! End-to-end tests for the worker pool lifecycle.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use predict_loadtest::client::{build_client, ClientConfig};
use predict_loadtest::config::RunConfig;
use predict_loadtest::errors::LoadTestError;
use predict_loadtest::payload::PayloadSequence;
use predict_loadtest::scheduler::{LoadTestRun, PoolState};

async fn predict_server(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

fn load_test(server: &MockServer, workers: usize, duration: Duration) -> LoadTestRun {
    let config = RunConfig::new(&format!("{}/predict", server.uri()), workers, duration).unwrap();
    let client = build_client(&ClientConfig::from(&config)).unwrap();
    LoadTestRun::new(config, client)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_worker_against_ten_millisecond_target() {
    let server = predict_server(
        ResponseTemplate::new(200)
            .set_body_json(json!({"prediction": 0}))
            .set_delay(Duration::from_millis(10)),
    )
    .await;

    let mut run = load_test(&server, 1, Duration::from_secs(1));
    let outcome = run.run().await.unwrap();
    let report = outcome.report();

    assert_eq!(run.state(), PoolState::Stopped);
    assert_eq!(report.failed_requests, 0, "errors: {:?}", report.errors);
    // About 10ms per request back to back gives roughly 90 to 100 in one
    // second. The lower bound leaves room for scheduler jitter but fails a
    // pool that loses a quarter of the run.
    assert!(
        (75..=110).contains(&report.successful_requests),
        "successful requests: {}",
        report.successful_requests
    );
    assert!(
        report.latency.median >= Duration::from_millis(10)
            && report.latency.median < Duration::from_millis(25),
        "median: {:?}",
        report.latency.median
    );
    assert!(report.duration >= Duration::from_secs(1));
    assert_eq!(report.success_rate, 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_records_after_drain() {
    let server =
        predict_server(ResponseTemplate::new(200).set_body_json(json!({"prediction": 1}))).await;

    let mut run = load_test(&server, 8, Duration::from_millis(500));
    let outcome = run.run().await.unwrap();

    let first = outcome.report();
    // Every request a worker sent was recorded before the drain completed.
    assert_eq!(outcome.requests_sent, first.total_requests);
    assert_eq!(outcome.panicked_workers, 0);
    assert!(first.total_requests > 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = outcome.report();
    assert_eq!(first, second);
    assert_eq!(outcome.statistics.total_count(), first.total_requests);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_target_still_runs_to_completion() {
    let server =
        predict_server(ResponseTemplate::new(500).set_body_string("internal error")).await;

    let mut run = load_test(&server, 2, Duration::from_millis(500));
    let outcome = run.run().await.unwrap();
    let report = outcome.report();

    assert_eq!(report.successful_requests, 0);
    assert!(report.failed_requests > 0);
    assert_eq!(report.success_rate, 0.0);
    assert_eq!(report.latency.median, Duration::ZERO);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].detail, "HTTP 500: internal error");
    assert_eq!(report.errors[0].count, report.failed_requests);
}

#[tokio::test]
async fn zero_duration_drains_immediately() {
    let server =
        predict_server(ResponseTemplate::new(200).set_body_json(json!({"prediction": 1}))).await;

    let mut run = load_test(&server, 4, Duration::ZERO);
    let outcome = run.run().await.unwrap();
    let report = outcome.report();

    // A worker may have started at most one request before seeing the signal.
    assert!(report.total_requests <= 4, "total: {}", report.total_requests);
    assert_eq!(outcome.requests_sent, report.total_requests);
    assert_eq!(run.state(), PoolState::Stopped);
}

#[tokio::test]
async fn run_cannot_be_restarted() {
    let server =
        predict_server(ResponseTemplate::new(200).set_body_json(json!({"prediction": 1}))).await;

    let mut run = load_test(&server, 1, Duration::ZERO);
    run.run().await.unwrap();

    let err = run.run().await.unwrap_err();
    assert!(matches!(err, LoadTestError::AlreadyStarted));
}

#[tokio::test]
async fn worker_cycles_through_payloads_in_order() {
    let server = predict_server(
        ResponseTemplate::new(200)
            .set_body_json(json!({"prediction": 1}))
            .set_delay(Duration::from_millis(5)),
    )
    .await;

    let mut run = load_test(&server, 1, Duration::from_millis(300));
    run.run().await.unwrap();

    let payloads = PayloadSequence::samples();
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() > payloads.len(), "only {} requests", requests.len());

    for (index, request) in requests.iter().enumerate() {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(&body, payloads.get(index), "request {}", index);
    }
}

#[tokio::test]
async fn unreachable_target_records_request_errors() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = RunConfig::new(
        &format!("http://127.0.0.1:{}/predict", port),
        2,
        Duration::from_millis(200),
    )
    .unwrap();
    let client = build_client(&ClientConfig::from(&config)).unwrap();

    let outcome = LoadTestRun::new(config, client).run().await.unwrap();
    let report = outcome.report();

    assert_eq!(report.successful_requests, 0);
    assert!(report.failed_requests > 0);
    assert!(report
        .errors
        .iter()
        .all(|e| e.detail.starts_with("request error: ")));
}
