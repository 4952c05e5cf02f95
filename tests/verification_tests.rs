//! Verification coordinator behavior against a mocked service.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use listingwatch::api_client::FraudServiceClient;
use listingwatch::config::Config;
use listingwatch::errors::ClientError;
use listingwatch::session::{FileTokenStore, SessionStore};
use listingwatch::verification::VerificationCoordinator;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::json!({ "sub": sub, "exp": 4_102_444_800i64 }).to_string());
    format!("{}.{}.sig", header, payload)
}

async fn logged_in_client(base_url: String) -> (tempfile::TempDir, FraudServiceClient) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        base_url,
        token_path: dir.path().join("token").to_string_lossy().into_owned(),
        request_timeout_secs: 5,
    };
    let session = Arc::new(SessionStore::new(FileTokenStore::new(&config.token_path)));
    let client = FraudServiceClient::new(&config, Arc::clone(&session)).expect("client");
    session
        .login(&make_token("user-1"), "ag-1", "Acme")
        .await
        .expect("login");
    (dir, client)
}

#[tokio::test]
async fn empty_batch_fails_fast_without_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fraud-reports/verify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (_dir, client) = logged_in_client(mock_server.uri()).await;
    let coordinator = VerificationCoordinator::new();

    let err = coordinator.verify(&client, &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn aggregate_counts_are_reported_as_received() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fraud-reports/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "confirmed_fraud": 2,
            "not_fraud": 3,
            "errors": 0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (_dir, client) = logged_in_client(mock_server.uri()).await;
    let coordinator = VerificationCoordinator::new();

    let summary = coordinator
        .verify(&client, &[10, 11, 12, 13, 14])
        .await
        .expect("verify")
        .expect("not busy");
    assert_eq!(summary.confirmed_fraud, 2);
    assert_eq!(summary.not_fraud, 3);
    assert_eq!(summary.errors, 0);
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn second_batch_while_pending_is_ignored_not_queued() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fraud-reports/verify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "confirmed_fraud": 1,
                    "not_fraud": 0,
                    "errors": 0
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (_dir, client) = logged_in_client(mock_server.uri()).await;
    let coordinator = Arc::new(VerificationCoordinator::new());

    let first = {
        let coordinator = Arc::clone(&coordinator);
        let client = client.clone();
        tokio::spawn(async move { coordinator.verify(&client, &[1]).await })
    };

    // Give the first call time to take the in-flight slot.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(coordinator.is_busy());
    let second = coordinator.verify(&client, &[2]).await.expect("second");
    assert!(second.is_none());

    let first = first.await.expect("join").expect("first verify");
    assert_eq!(first.expect("summary").confirmed_fraud, 1);
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn failed_batch_reports_error_and_frees_the_slot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fraud-reports/verify"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_json(serde_json::json!({ "error": "verification backend timeout" })),
        )
        .mount(&mock_server)
        .await;

    let (_dir, client) = logged_in_client(mock_server.uri()).await;
    let coordinator = VerificationCoordinator::new();

    let err = coordinator.verify(&client, &[1, 2]).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: 502, .. }));
    // The slot is released; a later batch can run.
    assert!(!coordinator.is_busy());
}
