use kolo::clients::{PaygateClient, PaymentGateway};
use kolo::config::GatewayInfo;
use kolo::error::PaymentError;
use kolo::models::{GatewayStatus, PaymentMethod, PayoutDestination};
use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> PaygateClient {
    let config = GatewayInfo {
        api_url: server.uri(),
        secret_key: SecretString::new("sk_test_paygate".into()),
        timeout_secs: 5,
    };
    PaygateClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_charge_success_maps_to_approved_receipt() {
    // 1. Setup WireMock
    let mock_server = MockServer::start().await;
    let reference = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/charge"))
        .and(header("Authorization", "Bearer sk_test_paygate"))
        .and(body_partial_json(json!({
            "reference": reference,
            "amount": 1_530,
            "method": "card"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "transaction_id": "PG-123",
            "message": null
        })))
        .mount(&mock_server)
        .await;

    // 2. Call the client
    let client = client_for(&mock_server);
    let receipt = client
        .charge(reference, 1_530, PaymentMethod::Card)
        .await
        .unwrap();

    // 3. Verify the receipt
    assert_eq!(receipt.status, GatewayStatus::Approved);
    assert_eq!(receipt.external_id.as_deref(), Some("PG-123"));
}

#[tokio::test]
async fn test_charge_client_error_is_a_final_decline() {
    // 1. Setup WireMock with a 402 decline
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "status": "failed",
            "message": "card declined"
        })))
        .mount(&mock_server)
        .await;

    // 2. Call the client; a decline is a receipt, not an error
    let client = client_for(&mock_server);
    let receipt = client
        .charge(Uuid::new_v4(), 5_000, PaymentMethod::Card)
        .await
        .unwrap();

    assert_eq!(receipt.status, GatewayStatus::Rejected);
    assert_eq!(receipt.message.as_deref(), Some("card declined"));
    assert!(receipt.external_id.is_none());
}

#[tokio::test]
async fn test_charge_server_error_is_transient() {
    // 1. Setup WireMock with a 503
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    // 2. Call the client; no receipt, the outcome is unknown
    let client = client_for(&mock_server);
    let err = client
        .charge(Uuid::new_v4(), 5_000, PaymentMethod::Card)
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::GatewayTransient(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreadable_success_body_is_transient() {
    // 1. Setup WireMock with a 200 that is not JSON
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway error</html>"))
        .mount(&mock_server)
        .await;

    // 2. A 200 we cannot read proves nothing; treat it as ambiguous
    let client = client_for(&mock_server);
    let err = client
        .charge(Uuid::new_v4(), 5_000, PaymentMethod::MobileMoney)
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::GatewayTransient(_)));
}

#[tokio::test]
async fn test_payout_posts_destination_to_payout_path() {
    // 1. Setup WireMock pinned to the payout payload
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payout"))
        .and(header("Authorization", "Bearer sk_test_paygate"))
        .and(body_partial_json(json!({
            "amount": 5_000,
            "bank_code": "058",
            "account_number": "0123456789"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "transaction_id": "PG-456",
            "message": "queued"
        })))
        .mount(&mock_server)
        .await;

    // 2. Call the client
    let client = client_for(&mock_server);
    let destination = PayoutDestination {
        bank_code: "058".to_string(),
        account_number: "0123456789".to_string(),
        account_name: Some("A. Customer".to_string()),
    };
    let receipt = client
        .payout(Uuid::new_v4(), 5_000, &destination)
        .await
        .unwrap();

    assert_eq!(receipt.status, GatewayStatus::Approved);
    assert_eq!(receipt.external_id.as_deref(), Some("PG-456"));
}

#[tokio::test]
async fn test_failed_status_in_success_envelope_is_rejected() {
    // Paygate sometimes declines inside a 200 envelope.
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "transaction_id": "PG-999",
            "message": "insufficient funds at issuer"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let receipt = client
        .charge(Uuid::new_v4(), 9_000, PaymentMethod::Card)
        .await
        .unwrap();

    assert_eq!(receipt.status, GatewayStatus::Rejected);
    assert_eq!(receipt.external_id.as_deref(), Some("PG-999"));
    assert_eq!(receipt.message.as_deref(), Some("insufficient funds at issuer"));
}
