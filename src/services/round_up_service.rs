use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::clients::NotificationEvent;
use crate::error::PaymentError;
use crate::models::{
    IncrementType, NewTransaction, RoundUpRule, RoundUpRuleUpdate, RoundUpStatusResponse,
    Transaction, TransactionStatus, TransactionType, WalletType,
};

/// Unit auto mode falls back to before any spending history exists.
const DEFAULT_AUTO_INCREMENT: i64 = 50;
const AUTO_REFRESH_INTERVAL_HOURS: i64 = 24;

pub struct RoundUpService;

impl RoundUpService {
    /// Round-up owed on `amount` under `rule`. Disabled rules and amounts
    /// already on an increment boundary owe nothing.
    pub fn compute(amount: i64, rule: &RoundUpRule) -> i64 {
        if !rule.is_enabled || amount <= 0 {
            return 0;
        }
        match rule.increment_type {
            IncrementType::Percentage => {
                if rule.percentage_bps <= 0 {
                    return 0;
                }
                // Half-up at the last decimal place.
                (amount * rule.percentage_bps + 5_000) / 10_000
            }
            _ => {
                let unit = Self::effective_increment(rule);
                if unit <= 0 {
                    return 0;
                }
                (unit - amount % unit) % unit
            }
        }
    }

    /// Unit currently in force for fixed and auto modes; 0 for percentage.
    pub fn effective_increment(rule: &RoundUpRule) -> i64 {
        match rule.increment_type {
            IncrementType::Percentage => 0,
            IncrementType::Auto => rule
                .auto_increment
                .unwrap_or(DEFAULT_AUTO_INCREMENT)
                .clamp(rule.min_increment, rule.max_increment),
            fixed => fixed.fixed_unit().unwrap_or(0),
        }
    }

    /// Looks up the user's rule and computes the round-up, refreshing a
    /// stale auto increment first.
    pub fn compute_for_user(
        state: &Arc<AppState>,
        user_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, PaymentError> {
        let mut rule = state.round_ups.find(user_id)?;
        if rule.is_enabled
            && rule.increment_type == IncrementType::Auto
            && auto_stale(&rule, now)
        {
            rule = Self::refresh_auto_increment(state, &rule, now)?;
        }
        Ok(Self::compute(amount, &rule))
    }

    /// Re-derives the auto unit from the average settled spend over the
    /// rule's analysis window, clamped to the user's bounds.
    pub fn refresh_auto_increment(
        state: &Arc<AppState>,
        rule: &RoundUpRule,
        now: DateTime<Utc>,
    ) -> Result<RoundUpRule, PaymentError> {
        let since = now - Duration::days(rule.analysis_window_days);
        let amounts = state
            .journal
            .completed_outflow_amounts_since(rule.user_id, since);

        let unit = if amounts.is_empty() {
            DEFAULT_AUTO_INCREMENT
        } else {
            let avg = amounts.iter().sum::<i64>() / amounts.len() as i64;
            match avg {
                a if a < 2_500 => 10,
                a if a < 25_000 => 50,
                a if a < 250_000 => 100,
                _ => 1_000,
            }
        };
        let unit = unit.clamp(rule.min_increment, rule.max_increment);

        info!(user_id = %rule.user_id, unit, samples = amounts.len(), "auto round-up increment refreshed");
        state.round_ups.store_auto_increment(rule.user_id, unit, now)
    }

    /// Moves the round-up from main to savings and journals it as a
    /// completed sweep linked to the originating entry. Sweeps are
    /// opportunistic: if main cannot cover the amount the sweep is skipped
    /// and the originating movement stands.
    pub async fn apply_sweep(
        state: &Arc<AppState>,
        originating: &Transaction,
        round_up_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>, PaymentError> {
        let user_id = originating.user_id;
        let main = state
            .wallets
            .find_by_user_and_type(user_id, WalletType::Main)?;
        let savings = state
            .wallets
            .find_by_user_and_type(user_id, WalletType::Savings)?;

        let sweep = state.journal.admit(
            NewTransaction {
                user_id,
                counterparty_id: None,
                transaction_type: TransactionType::RoundUp,
                amount: round_up_amount,
                fee: 0,
                from_wallet_id: Some(main.id),
                to_wallet_id: Some(savings.id),
                idempotency_key: None,
                description: Some("Round-up sweep".into()),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        )?;

        match state
            .wallets
            .transfer(main.id, savings.id, round_up_amount, now)
        {
            Ok(_) => {}
            Err(PaymentError::InsufficientFunds { .. }) => {
                state
                    .journal
                    .finalize(sweep.id, TransactionStatus::Failed, now)?;
                warn!(
                    %user_id,
                    amount = round_up_amount,
                    "round-up skipped, main wallet cannot cover it"
                );
                return Ok(None);
            }
            Err(e) => {
                state
                    .journal
                    .finalize(sweep.id, TransactionStatus::Failed, now)?;
                return Err(e);
            }
        }

        state
            .journal
            .finalize(sweep.id, TransactionStatus::Completed, now)?;
        state
            .journal
            .attach_round_up(originating.id, sweep.id, round_up_amount, now)?;
        state.round_ups.record_sweep(user_id, round_up_amount, now)?;

        state
            .notifier
            .dispatch(
                user_id,
                NotificationEvent::RoundUpSwept {
                    transaction_id: sweep.id,
                    amount: round_up_amount,
                },
            )
            .await;

        info!(%user_id, sweep_id = %sweep.id, amount = round_up_amount, "round-up swept to savings");
        state.journal.find(sweep.id).map(Some)
    }

    pub fn update_rule(
        state: &Arc<AppState>,
        user_id: Uuid,
        update: RoundUpRuleUpdate,
    ) -> Result<RoundUpStatusResponse, PaymentError> {
        let current = state.round_ups.find(user_id)?;

        if let Some(bps) = update.percentage_bps {
            if !(1..=10_000).contains(&bps) {
                return Err(PaymentError::Validation(
                    "percentage_bps must be between 1 and 10000".into(),
                ));
            }
        }
        let min = update.min_increment.unwrap_or(current.min_increment);
        let max = update.max_increment.unwrap_or(current.max_increment);
        if min < 1 || min > max {
            return Err(PaymentError::Validation(
                "increment bounds must satisfy 1 <= min <= max".into(),
            ));
        }
        let increment_type = update.increment_type.unwrap_or(current.increment_type);
        let bps = update.percentage_bps.unwrap_or(current.percentage_bps);
        if increment_type == IncrementType::Percentage && bps <= 0 {
            return Err(PaymentError::Validation(
                "percentage rules need a positive percentage_bps".into(),
            ));
        }

        let rule = state
            .round_ups
            .update_settings(user_id, update, Utc::now())?;
        info!(%user_id, increment_type = %rule.increment_type, enabled = rule.is_enabled, "round-up rule updated");
        Ok(status_of(&rule))
    }

    pub fn status(
        state: &Arc<AppState>,
        user_id: Uuid,
    ) -> Result<RoundUpStatusResponse, PaymentError> {
        Ok(status_of(&state.round_ups.find(user_id)?))
    }
}

fn auto_stale(rule: &RoundUpRule, now: DateTime<Utc>) -> bool {
    rule.auto_refreshed_at
        .map(|at| now - at >= Duration::hours(AUTO_REFRESH_INTERVAL_HOURS))
        .unwrap_or(true)
}

fn status_of(rule: &RoundUpRule) -> RoundUpStatusResponse {
    RoundUpStatusResponse {
        increment_type: rule.increment_type,
        is_enabled: rule.is_enabled,
        percentage_bps: rule.percentage_bps,
        effective_increment: match rule.increment_type {
            IncrementType::Percentage => None,
            _ => Some(RoundUpService::effective_increment(rule)),
        },
        total_round_ups_count: rule.total_round_ups_count,
        total_amount_saved: rule.total_amount_saved,
    }
}
