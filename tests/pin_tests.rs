mod common;

use chrono::{Duration, Utc};
use kolo::error::{AuthError, PaymentError};
use kolo::services::PinService;
use uuid::Uuid;

use common::fixtures;

#[test]
fn test_set_pin_rejects_bad_formats() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.format@example.com");
    let now = Utc::now();

    for bad in ["123", "12345", "12a4", "....", ""] {
        let err = PinService::set_pin(state, account.user_id, bad, now).unwrap_err();
        assert!(
            matches!(err, PaymentError::Validation(_)),
            "PIN {bad:?} was accepted"
        );
    }
}

#[test]
fn test_set_pin_twice_requires_change_pin() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.twice@example.com");
    let now = Utc::now();

    PinService::set_pin(state, account.user_id, "1111", now).unwrap();
    let err = PinService::set_pin(state, account.user_id, "2222", now).unwrap_err();
    assert!(matches!(err, PaymentError::InvalidState(_)));
}

#[test]
fn test_verify_without_pin_reports_not_set() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.none@example.com");

    let err = PinService::verify_pin(state, account.user_id, "1111", Utc::now()).unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::PinNotSet)));
}

#[test]
fn test_wrong_pin_counts_attempts_and_locks() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.lock@example.com");
    let now = Utc::now();
    PinService::set_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();

    // First failure: counted, but the first delay in the ladder is zero.
    let err = PinService::verify_pin(state, account.user_id, "0000", now).unwrap_err();
    match err {
        PaymentError::Auth(AuthError::IncorrectPin {
            failed_attempts,
            locked_until,
        }) => {
            assert_eq!(failed_attempts, 1);
            assert!(locked_until.is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Second failure: 30 second lock.
    let err = PinService::verify_pin(state, account.user_id, "0000", now).unwrap_err();
    match err {
        PaymentError::Auth(AuthError::IncorrectPin {
            failed_attempts,
            locked_until,
        }) => {
            assert_eq!(failed_attempts, 2);
            assert_eq!(locked_until, Some(now + Duration::seconds(30)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Even the correct PIN is refused while the lock is active.
    let err =
        PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now + Duration::seconds(1))
            .unwrap_err();
    match err {
        PaymentError::Auth(AuthError::Locked { unlock_at }) => {
            assert_eq!(unlock_at, now + Duration::seconds(30));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The refusal during lockout consumed no attempt.
    let record = state.pins.find_state(account.user_id).unwrap();
    assert_eq!(record.failed_attempts, 2);

    // Once the lock expires the correct PIN works and resets the counter.
    let token =
        PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now + Duration::seconds(31))
            .unwrap();
    assert_eq!(token.user_id, account.user_id);
    let record = state.pins.find_state(account.user_id).unwrap();
    assert_eq!(record.failed_attempts, 0);
    assert!(record.locked_until.is_none());
}

#[test]
fn test_lockout_ladder_caps_at_longest_delay() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.ladder@example.com");
    let mut now = Utc::now();
    PinService::set_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();

    let expected_delays = [0i64, 30, 120, 300, 900, 900];
    for (i, delay) in expected_delays.iter().enumerate() {
        let err = PinService::verify_pin(state, account.user_id, "0000", now).unwrap_err();
        match err {
            PaymentError::Auth(AuthError::IncorrectPin {
                failed_attempts,
                locked_until,
            }) => {
                assert_eq!(failed_attempts, (i + 1) as u32);
                if *delay == 0 {
                    assert!(locked_until.is_none());
                } else {
                    assert_eq!(locked_until, Some(now + Duration::seconds(*delay)));
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Step past the lock so the next guess is admitted.
        now += Duration::seconds(delay + 1);
    }
}

#[test]
fn test_token_is_single_use() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "pin.token@example.com", 0);
    let now = Utc::now();

    let token = PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();
    assert!(token.expires_at > token.issued_at);

    PinService::consume_token(state, account.user_id, token.id, now).unwrap();
    let err = PinService::consume_token(state, account.user_id, token.id, now).unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::TokenUsed)));
}

#[test]
fn test_token_expires_after_ttl() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "pin.ttl@example.com", 0);
    let now = Utc::now();

    let token = PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();
    let err =
        PinService::consume_token(state, account.user_id, token.id, now + Duration::seconds(121))
            .unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::TokenExpired)));
}

#[test]
fn test_foreign_token_is_rejected_and_not_burned() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let alice = fixtures::funded_account(state, "pin.alice@example.com", 0);
    let bob = fixtures::activated_account(state, "pin.bob@example.com");
    let now = Utc::now();

    let token = PinService::verify_pin(state, alice.user_id, fixtures::TEST_PIN, now).unwrap();

    let err = PinService::consume_token(state, bob.user_id, token.id, now).unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::TokenInvalid)));

    // The failed attempt did not burn the owner's token.
    PinService::consume_token(state, alice.user_id, token.id, now).unwrap();
}

#[test]
fn test_unknown_token_is_invalid() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "pin.unknown@example.com", 0);

    let err =
        PinService::consume_token(state, account.user_id, Uuid::new_v4(), Utc::now()).unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::TokenInvalid)));
}

#[test]
fn test_change_pin_proves_current_pin_first() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.change@example.com");
    let now = Utc::now();
    PinService::set_pin(state, account.user_id, "1111", now).unwrap();

    let err = PinService::change_pin(state, account.user_id, "9999", "2222", now).unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Auth(AuthError::IncorrectPin { .. })
    ));

    PinService::change_pin(state, account.user_id, "1111", "2222", now).unwrap();

    // The old PIN is gone, the new one verifies.
    let err = PinService::verify_pin(state, account.user_id, "1111", now).unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Auth(AuthError::IncorrectPin { .. })
    ));
    PinService::verify_pin(state, account.user_id, "2222", now).unwrap();
}

#[test]
fn test_change_pin_leaves_no_token_behind() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::activated_account(state, "pin.change2@example.com");
    let now = Utc::now();
    PinService::set_pin(state, account.user_id, "1111", now).unwrap();

    PinService::change_pin(state, account.user_id, "1111", "2222", now).unwrap();

    // Proving the old PIN minted nothing: past every TTL there is nothing
    // at all to purge.
    assert_eq!(state.pins.purge_expired_tokens(now + Duration::seconds(200)), 0);
}

#[test]
fn test_purge_drops_expired_tokens() {
    let harness = common::create_test_app_state();
    let state = &harness.state;
    let account = fixtures::funded_account(state, "pin.purge@example.com", 0);
    let now = Utc::now();

    let stale = PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();
    let live = PinService::verify_pin(state, account.user_id, fixtures::TEST_PIN, now).unwrap();
    PinService::consume_token(state, account.user_id, stale.id, now).unwrap();

    // Past both expiries only the consumed tombstone and the live token age out.
    let purged = state.pins.purge_expired_tokens(now + Duration::seconds(200));
    assert_eq!(purged, 2);
    assert_eq!(state.pins.purge_expired_tokens(now + Duration::seconds(200)), 0);

    let err = PinService::consume_token(
        state,
        account.user_id,
        live.id,
        now + Duration::seconds(200),
    )
    .unwrap_err();
    assert!(matches!(err, PaymentError::Auth(AuthError::TokenInvalid)));
}
