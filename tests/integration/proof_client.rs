//! End-to-end tests of the HTTP proof client and the job against the mock
//! attestation service.

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use por_runner::client::{ProofClient, RemoteProofClient};
use por_runner::config::AppConfig;
use por_runner::datasource::ExchangeManager;
use por_runner::engine::{ConfigSource, Job};
use por_runner::params::ParamMap;
use por_runner::scheduler::is_timeout_error;
use por_runner::types::PorError;

use crate::mock_attestor::{MockAttestor, Reply};

/// A config with one Binance account. Env names are unique per test so
/// parallel tests do not race on the environment.
fn config_for(attestor: &MockAttestor, prefix: &str) -> AppConfig {
    std::env::set_var(format!("{prefix}_KEY"), "test-api-key");
    std::env::set_var(format!("{prefix}_SECRET"), "test-api-secret");
    std::env::set_var(format!("{prefix}_TOKEN"), "test-token");

    let toml = format!(
        r#"
[exchanges.binance]
accounts = [{{ label = "main", api_key_env = "{prefix}_KEY", api_secret_env = "{prefix}_SECRET" }}]

[app]
endpoint = "{endpoint}/"
token_env = "{prefix}_TOKEN"
project_id = "p-42"
request_timeout_secs = 5
"#,
        endpoint = attestor.endpoint,
    );
    AppConfig::parse(&toml).unwrap()
}

#[tokio::test]
async fn test_run_submits_signed_requests_and_returns_fixture() {
    let attestor = MockAttestor::start().await;
    attestor.push_run(Reply::fixture(r#"{"vkey":"0xabc","publicValues":"0x01"}"#));
    let cfg = config_for(&attestor, "PC_RUN");

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let ds = Arc::new(ExchangeManager::from_config(&cfg.exchanges).unwrap());
    let result = client.run(&ParamMap::for_exchanges(ds)).await.unwrap();

    let fixture = result.decode_fixture().unwrap();
    assert_eq!(fixture["vkey"], "0xabc");

    let bodies = attestor.run_bodies();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["projectId"], "p-42");

    // Only the configured exchange produces requests.
    let requests = body["requests"].as_object().unwrap();
    assert!(requests.contains_key("binanceSpot"));
    assert!(requests.contains_key("binanceUsdSFuture"));
    assert!(requests.contains_key("binanceUnified"));
    assert!(!requests.contains_key("asterSpot"));
    assert_eq!(requests["binanceUnified"].as_array().unwrap().len(), 2);

    let spot = &requests["binanceSpot"][0];
    assert_eq!(spot["method"], "GET");
    assert_eq!(spot["headers"]["X-MBX-APIKEY"], "test-api-key");
    assert!(spot["url"].as_str().unwrap().contains("signature="));

    assert_eq!(attestor.auth_headers(), vec![Some("Bearer test-token".to_string())]);
}

#[tokio::test]
async fn test_structured_timeout_is_classified() {
    let attestor = MockAttestor::start().await;
    attestor.push_run(Reply::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "proof generation timed out",
        Some("timeout"),
    ));
    let cfg = config_for(&attestor, "PC_TIMEOUT");

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let err = client.run(&ParamMap::new()).await.unwrap_err();

    assert_eq!(err.message(), "proof generation timed out");
    assert!(is_timeout_error(&err));
}

#[tokio::test]
async fn test_other_error_code_is_not_timeout() {
    let attestor = MockAttestor::start().await;
    attestor.push_run(Reply::error(StatusCode::BAD_REQUEST, "bad signature", Some("invalid_request")));
    let cfg = config_for(&attestor, "PC_OTHER");

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let err = client.run(&ParamMap::new()).await.unwrap_err();

    assert!(matches!(err, PorError::Remote { .. }));
    assert!(!is_timeout_error(&err));
}

#[tokio::test]
async fn test_gateway_timeout_without_body_code() {
    let attestor = MockAttestor::start().await;
    attestor.push_run(Reply::error(StatusCode::GATEWAY_TIMEOUT, "upstream", None));
    let cfg = config_for(&attestor, "PC_GATEWAY");

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let err = client.run(&ParamMap::new()).await.unwrap_err();
    assert!(is_timeout_error(&err));
}

#[tokio::test]
async fn test_slow_service_is_classified_as_timeout() {
    let attestor = MockAttestor::start().await;
    attestor.set_run_delay(Duration::from_secs(5));
    let mut cfg = config_for(&attestor, "PC_SLOW");
    cfg.app.request_timeout_secs = 1;

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let err = client.run(&ParamMap::new()).await.unwrap_err();

    assert!(matches!(err, PorError::Remote { .. }));
    assert!(is_timeout_error(&err));
}

#[tokio::test]
async fn test_unreachable_service_is_remote_error() {
    let cfg = AppConfig::parse("[app]\nendpoint = \"http://127.0.0.1:9\"\nrequest_timeout_secs = 2\n").unwrap();
    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let err = client.run(&ParamMap::new()).await.unwrap_err();
    assert!(matches!(err, PorError::Remote { .. }));
}

#[tokio::test]
async fn test_withdraw_reports_success() {
    let attestor = MockAttestor::start().await;
    let cfg = config_for(&attestor, "PC_WITHDRAW");
    let client = RemoteProofClient::new(&cfg.app).unwrap();

    assert!(!client.try_withdraw_balance().await.unwrap());
    attestor.set_withdraw_success(true);
    assert!(client.try_withdraw_balance().await.unwrap());
    assert_eq!(attestor.withdraw_calls(), 2);
}

#[tokio::test]
async fn test_job_against_mock_attestor() {
    let attestor = MockAttestor::start().await;
    attestor.push_run(Reply::fixture(r#"{"vkey":"0x01"}"#));
    attestor.push_run(Reply::error(StatusCode::INTERNAL_SERVER_ERROR, "slow", Some("timeout")));
    let cfg = config_for(&attestor, "PC_JOB");

    let client = RemoteProofClient::new(&cfg.app).unwrap();
    let job = Job::new(ConfigSource::Fixed(cfg), Arc::new(client), Duration::from_secs(60));

    let fixture = job.run_once().await.unwrap();
    assert_eq!(fixture["vkey"], "0x01");

    let err = job.run_for_scheduler().await.unwrap_err();
    assert!(is_timeout_error(&err));

    let status = job.status().snapshot().await;
    assert_eq!((status.successes, status.failures), (1, 1));
    assert_eq!(job.status().last_fixture().await.unwrap()["vkey"], "0x01");
    // Withdrawal is disabled without a gate.
    assert_eq!(attestor.withdraw_calls(), 0);
}
