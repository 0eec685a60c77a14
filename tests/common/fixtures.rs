use std::sync::Arc;

use chrono::Utc;
use kolo::app_state::AppState;
use kolo::models::{ActivationResponse, IncrementType, RoundUpRuleUpdate};
use kolo::services::{AccountService, PinService, RoundUpService};
use uuid::Uuid;

pub const TEST_PIN: &str = "4321";

/// New account with empty wallets and the default (disabled) round-up rule.
pub fn activated_account(state: &Arc<AppState>, email: &str) -> ActivationResponse {
    AccountService::activate(state, email).expect("account activation failed")
}

/// Account with `amount` in the main wallet and `TEST_PIN` enrolled.
pub fn funded_account(state: &Arc<AppState>, email: &str, amount: i64) -> ActivationResponse {
    let account = activated_account(state, email);
    if amount > 0 {
        state
            .wallets
            .credit(account.main_wallet_id, amount, Utc::now())
            .expect("funding failed");
    }
    PinService::set_pin(state, account.user_id, TEST_PIN, Utc::now()).expect("PIN enrollment failed");
    account
}

/// Fresh single-use authorization token for `user_id`.
pub fn auth_token(state: &Arc<AppState>, user_id: Uuid) -> Uuid {
    PinService::verify_pin(state, user_id, TEST_PIN, Utc::now())
        .expect("PIN verification failed")
        .id
}

/// Turns the user's round-up rule on with a fixed increment.
pub fn enable_fixed_round_up(state: &Arc<AppState>, user_id: Uuid, increment: IncrementType) {
    RoundUpService::update_rule(
        state,
        user_id,
        RoundUpRuleUpdate {
            increment_type: Some(increment),
            is_enabled: Some(true),
            ..Default::default()
        },
    )
    .expect("round-up rule update failed");
}

/// Turns the rule on in auto mode with a pinned effective increment.
pub fn enable_auto_round_up(state: &Arc<AppState>, user_id: Uuid, unit: i64) {
    RoundUpService::update_rule(
        state,
        user_id,
        RoundUpRuleUpdate {
            increment_type: Some(IncrementType::Auto),
            is_enabled: Some(true),
            min_increment: Some(1),
            max_increment: Some(unit.max(1_000)),
            ..Default::default()
        },
    )
    .expect("round-up rule update failed");
    state
        .round_ups
        .store_auto_increment(user_id, unit, Utc::now())
        .expect("auto increment store failed");
}
