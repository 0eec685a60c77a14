use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::clients::{GatewayReceipt, NotificationEvent};
use crate::config::RetryPolicy;
use crate::error::PaymentError;
use crate::models::{
    GatewayStatus, PaymentMethod, PayoutDestination, Transaction, TransactionStatus,
    TransactionType, WalletType,
};

pub const RESERVATION_KEY: &str = "reservation_id";
pub const DESTINATION_KEY: &str = "destination";
pub const METHOD_KEY: &str = "method";
pub const DECLINE_REASON_KEY: &str = "decline_reason";

/// Executes gateway legs. Every attempt, inline or retried, runs through
/// [`RetryQueue::execute`], so the claim, settlement and backoff rules live
/// in exactly one place.
pub struct RetryQueue;

impl RetryQueue {
    /// Runs one gateway attempt for a pending entry and settles the outcome:
    /// approved legs apply their wallet effects and complete, definite
    /// declines release holds and fail, ambiguous failures book a retry.
    pub async fn execute(
        state: &Arc<AppState>,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        let txn = state.journal.find(transaction_id)?;
        if !txn.transaction_type.is_gateway_bound() {
            return Err(PaymentError::InvalidState(format!(
                "transaction {} has no gateway leg",
                txn.id
            )));
        }

        // A hold with a settlement delay must wait it out before any money
        // leaves; park the entry instead of dispatching early.
        if let Some(reservation_id) = reservation_id_of(&txn) {
            if let Some(reservation) = state.wallets.find_reservation(reservation_id) {
                if let Some(earliest) = reservation.earliest_commit_at {
                    if now < earliest {
                        return state.journal.defer_dispatch(txn.id, earliest, now);
                    }
                }
            }
        }

        let txn = state.journal.claim_for_dispatch(transaction_id, now)?;
        info!(
            transaction_id = %txn.id,
            transaction_type = %txn.transaction_type,
            attempt = txn.retry_count + 1,
            "dispatching gateway leg"
        );

        let leg = match txn.transaction_type {
            TransactionType::Deposit
            | TransactionType::Payment
            | TransactionType::BillPayment => {
                let method = method_of(&txn);
                state.gateway.charge(txn.reference, txn.amount, method).await
            }
            TransactionType::Withdrawal => match destination_of(&txn) {
                Some(destination) => {
                    state
                        .gateway
                        .payout(txn.reference, txn.amount, &destination)
                        .await
                }
                None => Err(PaymentError::Internal(format!(
                    "withdrawal {} has no payout destination",
                    txn.id
                ))),
            },
            _ => Err(PaymentError::InvalidState(format!(
                "transaction {} has no gateway leg",
                txn.id
            ))),
        };

        match leg {
            Ok(receipt) if receipt.status == GatewayStatus::Approved => {
                Self::settle_approved(state, &txn, receipt, now).await
            }
            Ok(receipt) => Self::settle_declined(state, &txn, receipt, now).await,
            Err(e) if e.is_retryable() => Self::handle_transient(state, &txn, e, now).await,
            Err(e) => {
                // Hard local failure before or during dispatch; nothing to
                // wait for, so fold the entry immediately.
                Self::fail_entry(state, &txn, e.to_string(), now).await?;
                Err(e)
            }
        }
    }

    /// Dispatches everything whose retry time has arrived.
    pub async fn drain_due(state: &Arc<AppState>, now: DateTime<Utc>) -> usize {
        let due = state.journal.due_for_retry(now);
        let count = due.len();
        for txn in due {
            if let Err(e) = Self::execute(state, txn.id, now).await {
                warn!(transaction_id = %txn.id, error = %e, "retry dispatch failed");
            }
        }
        count
    }

    /// Exponential backoff: base doubles per booked retry, capped.
    pub fn backoff(policy: &RetryPolicy, retry_count: u32) -> Duration {
        let exp = retry_count.min(32);
        let secs = policy
            .base_delay_secs
            .saturating_mul(1i64 << exp)
            .min(policy.max_delay_secs);
        Duration::seconds(secs)
    }

    async fn settle_approved(
        state: &Arc<AppState>,
        txn: &Transaction,
        receipt: GatewayReceipt,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        match txn.transaction_type {
            TransactionType::Deposit => {
                let main = state
                    .wallets
                    .find_by_user_and_type(txn.user_id, WalletType::Main)?;
                state.wallets.credit(main.id, txn.amount, now)?;
            }
            TransactionType::Withdrawal
            | TransactionType::Payment
            | TransactionType::BillPayment => {
                let reservation_id = reservation_id_of(txn).ok_or_else(|| {
                    PaymentError::Internal(format!("transaction {} has no reservation", txn.id))
                })?;
                state.wallets.commit_reservation(reservation_id, now)?;
            }
            _ => {}
        }

        state
            .journal
            .record_gateway_reference(txn.id, receipt.external_id, now)?;
        let settled = state
            .journal
            .finalize(txn.id, TransactionStatus::Completed, now)?;
        info!(
            transaction_id = %txn.id,
            transaction_type = %txn.transaction_type,
            amount = txn.amount,
            "gateway leg approved, entry settled"
        );
        state
            .notifier
            .dispatch(
                txn.user_id,
                NotificationEvent::PaymentSettled {
                    transaction_id: txn.id,
                    amount: txn.amount,
                },
            )
            .await;

        // Spends that settle through the gateway round up like any other.
        if matches!(
            txn.transaction_type,
            TransactionType::Payment | TransactionType::BillPayment
        ) {
            match crate::services::RoundUpService::compute_for_user(
                state,
                txn.user_id,
                txn.amount,
                now,
            ) {
                Ok(round_up) if round_up > 0 => {
                    if let Err(e) =
                        crate::services::RoundUpService::apply_sweep(state, &settled, round_up, now)
                            .await
                    {
                        warn!(transaction_id = %txn.id, error = %e, "round-up sweep failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(transaction_id = %txn.id, error = %e, "round-up computation failed");
                }
            }
        }

        state.journal.find(txn.id)
    }

    async fn settle_declined(
        state: &Arc<AppState>,
        txn: &Transaction,
        receipt: GatewayReceipt,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        state
            .journal
            .record_gateway_reference(txn.id, receipt.external_id, now)?;
        let reason = receipt
            .message
            .unwrap_or_else(|| "declined by gateway".into());
        Self::fail_entry(state, txn, reason, now).await
    }

    async fn handle_transient(
        state: &Arc<AppState>,
        txn: &Transaction,
        error: PaymentError,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        let attempts_made = txn.retry_count + 1;
        if attempts_made >= state.config.retry.max_attempts {
            warn!(
                transaction_id = %txn.id,
                attempts = attempts_made,
                error = %error,
                "gateway attempts exhausted"
            );
            return Self::fail_entry(
                state,
                txn,
                format!("retries exhausted: {error}"),
                now,
            )
            .await;
        }

        let delay = Self::backoff(&state.config.retry, txn.retry_count);
        let updated = state.journal.schedule_retry(txn.id, now + delay, now)?;
        warn!(
            transaction_id = %txn.id,
            retry_count = updated.retry_count,
            next_retry_in_secs = delay.num_seconds(),
            error = %error,
            "gateway attempt failed, retry booked"
        );
        Ok(updated)
    }

    /// Releases any hold, marks the entry failed and tells the user.
    async fn fail_entry(
        state: &Arc<AppState>,
        txn: &Transaction,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        if let Some(reservation_id) = reservation_id_of(txn) {
            match state.wallets.release_reservation(reservation_id, now) {
                Ok(_) => {}
                Err(PaymentError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        state
            .journal
            .annotate(txn.id, DECLINE_REASON_KEY, Value::String(reason.clone()), now)?;
        let failed = state
            .journal
            .finalize(txn.id, TransactionStatus::Failed, now)?;
        warn!(transaction_id = %txn.id, %reason, "entry failed");
        state
            .notifier
            .dispatch(
                txn.user_id,
                NotificationEvent::PaymentFailed {
                    transaction_id: txn.id,
                    amount: txn.amount,
                    reason,
                },
            )
            .await;
        Ok(failed)
    }
}

pub fn reservation_id_of(txn: &Transaction) -> Option<Uuid> {
    txn.metadata
        .get(RESERVATION_KEY)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn destination_of(txn: &Transaction) -> Option<PayoutDestination> {
    txn.metadata
        .get(DESTINATION_KEY)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

fn method_of(txn: &Transaction) -> PaymentMethod {
    txn.metadata
        .get(METHOD_KEY)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(PaymentMethod::Card)
}
