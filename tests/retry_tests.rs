mod common;

use chrono::{Duration, Utc};
use kolo::clients::NotificationEvent;
use kolo::config::RetryPolicy;
use kolo::models::{
    PaymentCategory, PaymentMethod, PaymentRequest, TopUpRequest, TransactionStatus,
};
use kolo::services::{PaymentService, RetryQueue};

use common::{fixtures, GatewayCall};

#[test]
fn test_backoff_doubles_then_caps() {
    let policy = RetryPolicy {
        base_delay_secs: 1,
        max_delay_secs: 4,
        max_attempts: 5,
    };
    let expected = [(0, 1), (1, 2), (2, 4), (3, 4), (10, 4), (40, 4)];
    for (retry_count, secs) in expected {
        assert_eq!(
            RetryQueue::backoff(&policy, retry_count),
            Duration::seconds(secs),
            "backoff for retry_count {retry_count}"
        );
    }
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_entry_and_release_the_hold() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "exhaust@example.com", 10_000);
    let token = fixtures::auth_token(state, account.user_id);
    for _ in 0..5 {
        harness.gateway.push_transient("gateway 503");
    }

    // 1. The inline attempt fails ambiguously and books the first retry.
    let response = PaymentService::pay(
        state,
        account.user_id,
        PaymentRequest {
            amount: 3_000,
            method: PaymentMethod::Card,
            category: PaymentCategory::Purchase,
            description: None,
            idempotency_key: "ex-1".to_string(),
            auth_token: token,
        },
    )
    .await
    .unwrap();
    assert_eq!(response.status, TransactionStatus::Pending);

    // 2. Four more attempts through the worker; the last one exhausts.
    for offset in [10, 20, 30, 40] {
        let drained =
            RetryQueue::drain_due(state, Utc::now() + Duration::seconds(offset)).await;
        assert_eq!(drained, 1, "drain at +{offset}s");
    }
    assert_eq!(harness.gateway.calls().len(), 5);

    // 3. The entry folded and the hold came back.
    let entry = state.journal.find(response.transaction_id).unwrap();
    assert_eq!(entry.status, TransactionStatus::Failed);
    let reason = entry.metadata["decline_reason"].as_str().unwrap();
    assert!(reason.starts_with("retries exhausted"), "reason: {reason}");

    let wallet = state.wallets.find(account.main_wallet_id).unwrap();
    assert_eq!(wallet.balance, 10_000);
    assert_eq!(wallet.available_balance, 10_000);

    let events = harness.notifier.events();
    assert!(events.iter().any(|(_, event)| matches!(
        event,
        NotificationEvent::PaymentFailed { amount: 3_000, .. }
    )));

    // 4. Nothing left to drain.
    assert_eq!(RetryQueue::drain_due(state, Utc::now() + Duration::seconds(60)).await, 0);
}

#[tokio::test]
async fn test_booked_retry_is_not_picked_up_early() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "early@example.com", 0);
    harness.gateway.push_transient("gateway 503");
    let token = fixtures::auth_token(state, account.user_id);

    PaymentService::top_up(
        state,
        account.user_id,
        TopUpRequest {
            amount: 5_000,
            method: PaymentMethod::Card,
            idempotency_key: "early-1".to_string(),
            auth_token: token,
        },
    )
    .await
    .unwrap();

    // The retry is booked one backoff step out; right now nothing is due.
    assert_eq!(RetryQueue::drain_due(state, Utc::now()).await, 0);
    assert_eq!(harness.gateway.calls().len(), 1);
}

#[tokio::test]
async fn test_retries_reuse_the_reference_and_credit_once() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "settle@example.com", 0);
    harness.gateway.push_transient("connect timeout");
    harness.gateway.push_transient("connect timeout");
    harness.gateway.push_approved("PG-5001");
    let token = fixtures::auth_token(state, account.user_id);

    let response = PaymentService::top_up(
        state,
        account.user_id,
        TopUpRequest {
            amount: 10_000,
            method: PaymentMethod::Card,
            idempotency_key: "settle-1".to_string(),
            auth_token: token,
        },
    )
    .await
    .unwrap();

    RetryQueue::drain_due(state, Utc::now() + Duration::seconds(10)).await;
    RetryQueue::drain_due(state, Utc::now() + Duration::seconds(20)).await;

    // Every attempt carried the same reference, so the gateway can dedupe.
    let calls = harness.gateway.calls();
    assert_eq!(calls.len(), 3);
    let references: Vec<_> = calls
        .iter()
        .map(|call| match call {
            GatewayCall::Charge { reference, .. } => *reference,
            other => panic!("unexpected gateway call: {other:?}"),
        })
        .collect();
    assert!(references.windows(2).all(|w| w[0] == w[1]));

    let entry = state.journal.find(response.transaction_id).unwrap();
    assert_eq!(entry.status, TransactionStatus::Completed);
    assert_eq!(entry.retry_count, 2);
    assert_eq!(entry.external_transaction_id.as_deref(), Some("PG-5001"));
    assert_eq!(state.wallets.find(account.main_wallet_id).unwrap().balance, 10_000);
}

#[tokio::test]
async fn test_cancel_between_attempts_stops_the_retries() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "cancel.retry@example.com", 10_000);
    let token = fixtures::auth_token(state, account.user_id);
    harness.gateway.push_transient("gateway 503");

    let response = PaymentService::pay(
        state,
        account.user_id,
        PaymentRequest {
            amount: 3_000,
            method: PaymentMethod::Card,
            category: PaymentCategory::Purchase,
            description: None,
            idempotency_key: "cancel-1".to_string(),
            auth_token: token,
        },
    )
    .await
    .unwrap();
    assert_eq!(response.status, TransactionStatus::Pending);

    // Between attempts the entry is cancellable.
    PaymentService::cancel(state, account.user_id, response.transaction_id)
        .await
        .unwrap();

    assert_eq!(RetryQueue::drain_due(state, Utc::now() + Duration::seconds(10)).await, 0);
    assert_eq!(harness.gateway.calls().len(), 1);

    let wallet = state.wallets.find(account.main_wallet_id).unwrap();
    assert_eq!(wallet.available_balance, 10_000);
}

#[tokio::test]
async fn test_drain_dispatches_every_due_entry() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let first = fixtures::funded_account(state, "drain.a@example.com", 0);
    let second = fixtures::funded_account(state, "drain.b@example.com", 0);
    harness.gateway.push_transient("gateway 503");
    harness.gateway.push_transient("gateway 503");

    let first_response = PaymentService::top_up(
        state,
        first.user_id,
        TopUpRequest {
            amount: 1_000,
            method: PaymentMethod::Card,
            idempotency_key: "drain-1".to_string(),
            auth_token: fixtures::auth_token(state, first.user_id),
        },
    )
    .await
    .unwrap();
    let second_response = PaymentService::top_up(
        state,
        second.user_id,
        TopUpRequest {
            amount: 2_000,
            method: PaymentMethod::MobileMoney,
            idempotency_key: "drain-2".to_string(),
            auth_token: fixtures::auth_token(state, second.user_id),
        },
    )
    .await
    .unwrap();

    harness.gateway.push_approved("PG-6001");
    harness.gateway.push_approved("PG-6002");
    let drained = RetryQueue::drain_due(state, Utc::now() + Duration::seconds(10)).await;
    assert_eq!(drained, 2);

    for id in [first_response.transaction_id, second_response.transaction_id] {
        let entry = state.journal.find(id).unwrap();
        assert_eq!(entry.status, TransactionStatus::Completed);
    }
    assert_eq!(state.wallets.find(first.main_wallet_id).unwrap().balance, 1_000);
    assert_eq!(state.wallets.find(second.main_wallet_id).unwrap().balance, 2_000);
}
