use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::clients::NotificationEvent;
use crate::error::PaymentError;
use crate::models::{
    NewTransaction, PaymentRequest, PaymentResponse, TopUpRequest, TopUpResponse, Transaction,
    TransactionStatus, TransactionType, TransferRequest, TransferResponse, WithdrawRequest,
    WithdrawResponse, WalletType,
};
use crate::services::retry_queue::{
    reservation_id_of, RetryQueue, DECLINE_REASON_KEY, DESTINATION_KEY, METHOD_KEY,
    RESERVATION_KEY,
};
use crate::services::{PinService, RoundUpService};

pub struct PaymentService;

impl PaymentService {
    /// Wallet-to-wallet transfer between two users' main wallets. The journal
    /// entries are admitted first; the authorization token is burned before
    /// any money moves; every step after admission is undone if a later one
    /// fails.
    pub async fn transfer_internal(
        state: &Arc<AppState>,
        sender_id: Uuid,
        req: TransferRequest,
    ) -> Result<TransferResponse, PaymentError> {
        let now = Utc::now();
        info!(%sender_id, amount = req.amount, "internal transfer initiated");

        let recipient = state.users.find_by_email(&req.recipient_email)?;
        if recipient.id == sender_id {
            return Err(PaymentError::Validation(
                "cannot transfer to yourself".into(),
            ));
        }

        let sender_main = state
            .wallets
            .find_by_user_and_type(sender_id, WalletType::Main)?;
        let recipient_main = state
            .wallets
            .find_by_user_and_type(recipient.id, WalletType::Main)?;

        let out = match state.journal.admit(
            NewTransaction {
                user_id: sender_id,
                counterparty_id: Some(recipient.id),
                transaction_type: TransactionType::TransferOut,
                amount: req.amount,
                fee: 0,
                from_wallet_id: Some(sender_main.id),
                to_wallet_id: Some(recipient_main.id),
                idempotency_key: Some(req.idempotency_key.clone()),
                description: req.description.clone(),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        ) {
            Ok(txn) => txn,
            Err(PaymentError::DuplicateIntent(existing)) => {
                info!(
                    transaction_id = %existing.id,
                    idempotency_key = %req.idempotency_key,
                    "replayed transfer intent, returning original result"
                );
                return Ok(transfer_response_of(&existing));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = PinService::consume_token(state, sender_id, req.auth_token, now) {
            state
                .journal
                .finalize(out.id, TransactionStatus::Failed, now)?;
            return Err(e);
        }

        let incoming = match state.journal.admit(
            NewTransaction {
                user_id: recipient.id,
                counterparty_id: Some(sender_id),
                transaction_type: TransactionType::TransferIn,
                amount: req.amount,
                fee: 0,
                from_wallet_id: Some(sender_main.id),
                to_wallet_id: Some(recipient_main.id),
                idempotency_key: None,
                description: Some("Received internal transfer".into()),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        ) {
            Ok(txn) => txn,
            Err(e) => {
                state
                    .journal
                    .finalize(out.id, TransactionStatus::Failed, now)?;
                return Err(e);
            }
        };

        if let Err(e) = state
            .wallets
            .transfer(sender_main.id, recipient_main.id, req.amount, now)
        {
            state
                .journal
                .finalize(out.id, TransactionStatus::Failed, now)?;
            state
                .journal
                .finalize(incoming.id, TransactionStatus::Failed, now)?;
            warn!(%sender_id, error = %e, "transfer rolled back");
            return Err(e);
        }

        state
            .journal
            .finalize(out.id, TransactionStatus::Completed, now)?;
        state
            .journal
            .finalize(incoming.id, TransactionStatus::Completed, now)?;
        state.journal.link_pair(out.id, incoming.id, now)?;

        state
            .notifier
            .dispatch(
                recipient.id,
                NotificationEvent::PaymentSettled {
                    transaction_id: incoming.id,
                    amount: req.amount,
                },
            )
            .await;

        // The sweep rides behind the settled transfer; its failure never
        // unwinds the transfer itself.
        let mut round_up_amount = None;
        match RoundUpService::compute_for_user(state, sender_id, req.amount, now) {
            Ok(round_up) if round_up > 0 => {
                match RoundUpService::apply_sweep(state, &out, round_up, now).await {
                    Ok(Some(_)) => round_up_amount = Some(round_up),
                    Ok(None) => {}
                    Err(e) => warn!(%sender_id, error = %e, "round-up sweep failed"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(%sender_id, error = %e, "round-up computation failed"),
        }

        info!(transaction_id = %out.id, "internal transfer completed");
        Ok(TransferResponse {
            transaction_id: out.id,
            reference: out.reference,
            status: TransactionStatus::Completed,
            amount: req.amount,
            round_up_amount,
        })
    }

    /// Funds the main wallet from an external instrument. The wallet is only
    /// credited once the gateway approves; an ambiguous outcome leaves the
    /// entry pending with a retry booked.
    pub async fn top_up(
        state: &Arc<AppState>,
        user_id: Uuid,
        req: TopUpRequest,
    ) -> Result<TopUpResponse, PaymentError> {
        let now = Utc::now();
        info!(%user_id, amount = req.amount, method = %req.method, "top-up initiated");

        let main = state
            .wallets
            .find_by_user_and_type(user_id, WalletType::Main)?;

        let entry = match state.journal.admit(
            NewTransaction {
                user_id,
                counterparty_id: None,
                transaction_type: TransactionType::Deposit,
                amount: req.amount,
                fee: 0,
                from_wallet_id: None,
                to_wallet_id: Some(main.id),
                idempotency_key: Some(req.idempotency_key.clone()),
                description: Some("Wallet top-up".into()),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        ) {
            Ok(txn) => txn,
            Err(PaymentError::DuplicateIntent(existing)) => {
                info!(transaction_id = %existing.id, "replayed top-up intent");
                return top_up_outcome(&existing);
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = PinService::consume_token(state, user_id, req.auth_token, now) {
            state
                .journal
                .finalize(entry.id, TransactionStatus::Failed, now)?;
            return Err(e);
        }

        state.journal.annotate(
            entry.id,
            METHOD_KEY,
            serde_json::to_value(req.method)
                .map_err(|e| PaymentError::Internal(e.to_string()))?,
            now,
        )?;

        let executed = RetryQueue::execute(state, entry.id, now).await?;
        top_up_outcome(&executed)
    }

    /// Pays out to an external bank account. Funds are held for the full
    /// amount plus fee before dispatch; savings withdrawals wait out the
    /// wallet's settlement delay before the payout leaves.
    pub async fn withdraw(
        state: &Arc<AppState>,
        user_id: Uuid,
        req: WithdrawRequest,
    ) -> Result<WithdrawResponse, PaymentError> {
        let now = Utc::now();
        info!(%user_id, amount = req.amount, wallet = %req.wallet_type, "withdrawal initiated");

        let user = state.users.find(user_id)?;
        if !user.kyc_verified {
            return Err(PaymentError::Validation(
                "identity verification is required before withdrawals".into(),
            ));
        }

        let wallet = state
            .wallets
            .find_by_user_and_type(user_id, req.wallet_type)?;
        let fee = state.config.withdrawal_fee_minor;

        let entry = match state.journal.admit(
            NewTransaction {
                user_id,
                counterparty_id: None,
                transaction_type: TransactionType::Withdrawal,
                amount: req.amount,
                fee,
                from_wallet_id: Some(wallet.id),
                to_wallet_id: None,
                idempotency_key: Some(req.idempotency_key.clone()),
                description: Some("Withdrawal to bank account".into()),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        ) {
            Ok(txn) => txn,
            Err(PaymentError::DuplicateIntent(existing)) => {
                info!(transaction_id = %existing.id, "replayed withdrawal intent");
                return withdraw_outcome(&existing);
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = PinService::consume_token(state, user_id, req.auth_token, now) {
            state
                .journal
                .finalize(entry.id, TransactionStatus::Failed, now)?;
            return Err(e);
        }

        let reservation = match state.wallets.reserve(wallet.id, req.amount + fee, now) {
            Ok(r) => r,
            Err(e) => {
                state
                    .journal
                    .finalize(entry.id, TransactionStatus::Failed, now)?;
                return Err(e);
            }
        };
        state.journal.annotate(
            entry.id,
            RESERVATION_KEY,
            Value::String(reservation.id.to_string()),
            now,
        )?;
        state.journal.annotate(
            entry.id,
            DESTINATION_KEY,
            serde_json::to_value(&req.destination)
                .map_err(|e| PaymentError::Internal(e.to_string()))?,
            now,
        )?;

        // A delayed hold parks until it can settle; the worker dispatches it.
        if let Some(earliest) = reservation.earliest_commit_at {
            if earliest > now {
                let parked = state.journal.defer_dispatch(entry.id, earliest, now)?;
                info!(
                    transaction_id = %parked.id,
                    dispatch_at = %earliest,
                    "savings withdrawal parked for settlement delay"
                );
                return withdraw_outcome(&parked);
            }
        }

        let executed = RetryQueue::execute(state, entry.id, now).await?;
        withdraw_outcome(&executed)
    }

    /// Spends from the main wallet at a merchant or biller. The hold commits
    /// only on gateway approval, and an approved spend rounds up.
    pub async fn pay(
        state: &Arc<AppState>,
        user_id: Uuid,
        req: PaymentRequest,
    ) -> Result<PaymentResponse, PaymentError> {
        let now = Utc::now();
        info!(%user_id, amount = req.amount, category = ?req.category, "payment initiated");

        let main = state
            .wallets
            .find_by_user_and_type(user_id, WalletType::Main)?;

        let entry = match state.journal.admit(
            NewTransaction {
                user_id,
                counterparty_id: None,
                transaction_type: req.category.transaction_type(),
                amount: req.amount,
                fee: 0,
                from_wallet_id: Some(main.id),
                to_wallet_id: None,
                idempotency_key: Some(req.idempotency_key.clone()),
                description: req.description.clone(),
                metadata: Value::Null,
            },
            &state.config.caps,
            now,
        ) {
            Ok(txn) => txn,
            Err(PaymentError::DuplicateIntent(existing)) => {
                info!(transaction_id = %existing.id, "replayed payment intent");
                return payment_outcome(&existing);
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = PinService::consume_token(state, user_id, req.auth_token, now) {
            state
                .journal
                .finalize(entry.id, TransactionStatus::Failed, now)?;
            return Err(e);
        }

        let reservation = match state.wallets.reserve(main.id, req.amount, now) {
            Ok(r) => r,
            Err(e) => {
                state
                    .journal
                    .finalize(entry.id, TransactionStatus::Failed, now)?;
                return Err(e);
            }
        };
        state.journal.annotate(
            entry.id,
            RESERVATION_KEY,
            Value::String(reservation.id.to_string()),
            now,
        )?;
        state.journal.annotate(
            entry.id,
            METHOD_KEY,
            serde_json::to_value(req.method)
                .map_err(|e| PaymentError::Internal(e.to_string()))?,
            now,
        )?;

        let executed = RetryQueue::execute(state, entry.id, now).await?;
        payment_outcome(&executed)
    }

    /// Cancels a pending entry that has not been claimed for dispatch and
    /// hands back whatever it held.
    pub async fn cancel(
        state: &Arc<AppState>,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, PaymentError> {
        let now = Utc::now();
        let txn = state.journal.find(transaction_id)?;
        if txn.user_id != user_id {
            return Err(PaymentError::NotFound(format!(
                "transaction {transaction_id} not found"
            )));
        }

        let cancelled = state.journal.cancel_pending(transaction_id, now)?;
        if let Some(reservation_id) = reservation_id_of(&cancelled) {
            match state.wallets.release_reservation(reservation_id, now) {
                Ok(_) => {}
                Err(PaymentError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        info!(%user_id, %transaction_id, "pending entry cancelled");
        Ok(cancelled)
    }
}

fn transfer_response_of(txn: &Transaction) -> TransferResponse {
    TransferResponse {
        transaction_id: txn.id,
        reference: txn.reference,
        status: txn.status,
        amount: txn.amount,
        round_up_amount: txn.round_up_details.as_ref().map(|d| d.round_up_amount),
    }
}

fn decline_reason_of(txn: &Transaction) -> String {
    txn.metadata
        .get(DECLINE_REASON_KEY)
        .and_then(Value::as_str)
        .unwrap_or("declined by gateway")
        .to_string()
}

fn top_up_outcome(txn: &Transaction) -> Result<TopUpResponse, PaymentError> {
    match txn.status {
        TransactionStatus::Failed => Err(PaymentError::GatewayRejected(decline_reason_of(txn))),
        TransactionStatus::Cancelled => Err(PaymentError::InvalidState(format!(
            "transaction {} was cancelled",
            txn.id
        ))),
        _ => Ok(TopUpResponse {
            transaction_id: txn.id,
            reference: txn.reference,
            status: txn.status,
            amount: txn.amount,
        }),
    }
}

fn withdraw_outcome(txn: &Transaction) -> Result<WithdrawResponse, PaymentError> {
    match txn.status {
        TransactionStatus::Failed => Err(PaymentError::GatewayRejected(decline_reason_of(txn))),
        TransactionStatus::Cancelled => Err(PaymentError::InvalidState(format!(
            "transaction {} was cancelled",
            txn.id
        ))),
        _ => Ok(WithdrawResponse {
            transaction_id: txn.id,
            reference: txn.reference,
            status: txn.status,
            amount: txn.amount,
            fee: txn.fee,
        }),
    }
}

fn payment_outcome(txn: &Transaction) -> Result<PaymentResponse, PaymentError> {
    match txn.status {
        TransactionStatus::Failed => Err(PaymentError::GatewayRejected(decline_reason_of(txn))),
        TransactionStatus::Cancelled => Err(PaymentError::InvalidState(format!(
            "transaction {} was cancelled",
            txn.id
        ))),
        _ => Ok(PaymentResponse {
            transaction_id: txn.id,
            reference: txn.reference,
            status: txn.status,
            amount: txn.amount,
            round_up_amount: txn.round_up_details.as_ref().map(|d| d.round_up_amount),
        }),
    }
}
