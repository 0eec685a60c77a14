use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::SpendCaps;
use crate::error::{CapKind, PaymentError};
use crate::models::{
    NewTransaction, RoundUpDetails, Transaction, TransactionStatus, TransactionType,
};

const DISPATCHED_KEY: &str = "gateway_dispatched";

struct JournalInner {
    entries: HashMap<Uuid, Transaction>,
    by_key: HashMap<(Uuid, String), Uuid>,
}

/// Append-only journal of money movements. Admission checks (duplicate
/// intent, spend caps) and the insert happen under one write lock, so two
/// racing submissions cannot both slip under a cap or share a key.
pub struct TransactionRepository {
    inner: RwLock<JournalInner>,
}

impl TransactionRepository {
    pub fn new() -> Self {
        TransactionRepository {
            inner: RwLock::new(JournalInner {
                entries: HashMap::new(),
                by_key: HashMap::new(),
            }),
        }
    }

    /// Admits a new entry in `Pending`. Replays of a live intent come back as
    /// `DuplicateIntent` carrying the original entry; keys of failed or
    /// cancelled entries may be reused.
    pub fn admit(
        &self,
        new: NewTransaction,
        caps: &SpendCaps,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        if new.amount <= 0 {
            return Err(PaymentError::Validation(
                "transaction amount must be positive".into(),
            ));
        }
        if new.fee < 0 {
            return Err(PaymentError::Validation("fee cannot be negative".into()));
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(key) = new.idempotency_key.as_deref() {
            let existing = inner
                .by_key
                .get(&(new.user_id, key.to_string()))
                .and_then(|id| inner.entries.get(id))
                .cloned();
            if let Some(existing) = existing {
                if !existing.status.is_terminal() || existing.is_settled() {
                    if existing.amount != new.amount
                        || existing.transaction_type != new.transaction_type
                    {
                        return Err(PaymentError::Validation(format!(
                            "idempotency key {key} was already used with a different payload"
                        )));
                    }
                    return Err(PaymentError::DuplicateIntent(Box::new(existing)));
                }
                // Failed or cancelled: the key is free again.
            }
        }

        if new.transaction_type != TransactionType::RoundUp && new.amount > caps.per_transaction {
            return Err(PaymentError::LimitExceeded {
                cap: CapKind::PerTransaction,
                limit: caps.per_transaction,
                attempted: new.amount,
            });
        }

        if new.transaction_type.counts_toward_daily_outflow() {
            let today = now.date_naive();
            let spent_today: i64 = inner
                .entries
                .values()
                .filter(|t| {
                    t.user_id == new.user_id
                        && t.transaction_type.counts_toward_daily_outflow()
                        && t.status != TransactionStatus::Failed
                        && t.status != TransactionStatus::Cancelled
                        && t.created_at.date_naive() == today
                })
                .map(|t| t.amount + t.fee)
                .sum();
            let attempted = spent_today + new.amount + new.fee;
            if attempted > caps.daily_outflow {
                return Err(PaymentError::LimitExceeded {
                    cap: CapKind::DailyOutflow,
                    limit: caps.daily_outflow,
                    attempted,
                });
            }
        }

        let txn = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            counterparty_id: new.counterparty_id,
            transaction_type: new.transaction_type,
            amount: new.amount,
            fee: new.fee,
            from_wallet_id: new.from_wallet_id,
            to_wallet_id: new.to_wallet_id,
            status: TransactionStatus::Pending,
            external_transaction_id: None,
            linked_transaction_id: None,
            round_up_details: None,
            idempotency_key: new.idempotency_key.clone(),
            reference: Uuid::new_v4(),
            description: new.description,
            retry_count: 0,
            next_retry_at: None,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };

        if let Some(key) = new.idempotency_key {
            inner.by_key.insert((new.user_id, key), txn.id);
        }
        inner.entries.insert(txn.id, txn.clone());
        Ok(txn)
    }

    pub fn find(&self, transaction_id: Uuid) -> Result<Transaction, PaymentError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(&transaction_id)
            .cloned()
            .ok_or_else(|| {
                PaymentError::NotFound(format!("transaction {transaction_id} not found"))
            })
    }

    /// Moves a pending entry to a terminal state. Terminal entries never
    /// change again; a second finalize is an error.
    pub fn finalize(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        if status == TransactionStatus::Pending {
            return Err(PaymentError::Validation(
                "finalize requires a terminal status".into(),
            ));
        }
        self.update(transaction_id, |txn| {
            if txn.status.is_terminal() {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is already {}",
                    txn.id, txn.status
                )));
            }
            txn.status = status;
            txn.next_retry_at = None;
            txn.updated_at = now;
            Ok(())
        })
    }

    /// Links the two legs of an internal transfer to each other.
    pub fn link_pair(
        &self,
        first_id: Uuid,
        second_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for (id, linked) in [(first_id, second_id), (second_id, first_id)] {
            let txn = inner
                .entries
                .get_mut(&id)
                .ok_or_else(|| PaymentError::NotFound(format!("transaction {id} not found")))?;
            txn.linked_transaction_id = Some(linked);
            txn.updated_at = now;
        }
        Ok(())
    }

    /// Writes the sweep pairing onto both sides. The originating entry keeps
    /// its own `linked_transaction_id` (a transfer leg uses it for its twin);
    /// the sweep entry points back through both fields.
    pub fn attach_round_up(
        &self,
        originating_id: Uuid,
        sweep_id: Uuid,
        round_up_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for (id, linked) in [(originating_id, sweep_id), (sweep_id, originating_id)] {
            let txn = inner
                .entries
                .get_mut(&id)
                .ok_or_else(|| PaymentError::NotFound(format!("transaction {id} not found")))?;
            if id == sweep_id {
                txn.linked_transaction_id = Some(linked);
            }
            txn.round_up_details = Some(RoundUpDetails {
                round_up_amount,
                linked_transaction_id: linked,
            });
            txn.updated_at = now;
        }
        Ok(())
    }

    /// Merges a key into the entry's metadata object.
    pub fn annotate(
        &self,
        transaction_id: Uuid,
        key: &str,
        value: Value,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            if !txn.metadata.is_object() {
                txn.metadata = Value::Object(serde_json::Map::new());
            }
            if let Some(map) = txn.metadata.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            txn.updated_at = now;
            Ok(())
        })
    }

    /// User-initiated cancel. Only a pending entry that is not mid-flight to
    /// the gateway can be cancelled; a dispatching entry must finish its
    /// attempt first.
    pub fn cancel_pending(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            if txn.status != TransactionStatus::Pending {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is already {}",
                    txn.id, txn.status
                )));
            }
            if is_dispatched(txn) {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is dispatching and cannot be cancelled",
                    txn.id
                )));
            }
            txn.status = TransactionStatus::Cancelled;
            txn.next_retry_at = None;
            txn.updated_at = now;
            Ok(())
        })
    }

    pub fn record_gateway_reference(
        &self,
        transaction_id: Uuid,
        external_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            txn.external_transaction_id = external_id;
            txn.updated_at = now;
            Ok(())
        })
    }

    /// Marks the entry as in flight to the gateway. Exactly one caller wins;
    /// a cancel and a dispatch racing for the same entry cannot both proceed.
    pub fn claim_for_dispatch(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            if txn.status != TransactionStatus::Pending {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is {}",
                    txn.id, txn.status
                )));
            }
            if is_dispatched(txn) {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is already dispatching",
                    txn.id
                )));
            }
            set_dispatched(txn, true);
            txn.next_retry_at = None;
            txn.updated_at = now;
            Ok(())
        })
    }

    /// Parks a pending entry until `at` without spending an attempt. Used
    /// for settlement-delayed dispatches, not for failures.
    pub fn defer_dispatch(
        &self,
        transaction_id: Uuid,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            if txn.status != TransactionStatus::Pending {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is {}",
                    txn.id, txn.status
                )));
            }
            txn.next_retry_at = Some(at);
            set_dispatched(txn, false);
            txn.updated_at = now;
            Ok(())
        })
    }

    /// Books the next attempt and returns the entry to a cancellable state.
    pub fn schedule_retry(
        &self,
        transaction_id: Uuid,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, PaymentError> {
        self.update(transaction_id, |txn| {
            if txn.status != TransactionStatus::Pending {
                return Err(PaymentError::InvalidState(format!(
                    "transaction {} is {}",
                    txn.id, txn.status
                )));
            }
            txn.retry_count += 1;
            txn.next_retry_at = Some(next_retry_at);
            set_dispatched(txn, false);
            txn.updated_at = now;
            Ok(())
        })
    }

    /// Pending gateway-bound entries whose retry time has arrived.
    pub fn due_for_retry(&self, now: DateTime<Utc>) -> Vec<Transaction> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut due: Vec<Transaction> = inner
            .entries
            .values()
            .filter(|t| {
                t.status == TransactionStatus::Pending
                    && !is_dispatched(t)
                    && t.next_retry_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|t| t.next_retry_at);
        due
    }

    /// Newest first.
    pub fn recent_for_user(&self, user_id: Uuid, limit: usize) -> Vec<Transaction> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut txns: Vec<Transaction> = inner
            .entries
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txns.truncate(limit);
        txns
    }

    /// Amounts of settled spends since `since`, the input the round-up auto
    /// tuner averages over.
    pub fn completed_outflow_amounts_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Vec<i64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && t.status == TransactionStatus::Completed
                    && t.created_at >= since
                    && matches!(
                        t.transaction_type,
                        TransactionType::Payment
                            | TransactionType::BillPayment
                            | TransactionType::TransferOut
                    )
            })
            .map(|t| t.amount)
            .collect()
    }

    fn update<F>(&self, transaction_id: Uuid, mutate: F) -> Result<Transaction, PaymentError>
    where
        F: FnOnce(&mut Transaction) -> Result<(), PaymentError>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let txn = inner.entries.get_mut(&transaction_id).ok_or_else(|| {
            PaymentError::NotFound(format!("transaction {transaction_id} not found"))
        })?;
        mutate(txn)?;
        Ok(txn.clone())
    }
}

impl Default for TransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn is_dispatched(txn: &Transaction) -> bool {
    txn.metadata
        .get(DISPATCHED_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn set_dispatched(txn: &mut Transaction, dispatched: bool) {
    if !txn.metadata.is_object() {
        txn.metadata = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = txn.metadata.as_object_mut() {
        map.insert(DISPATCHED_KEY.to_string(), Value::Bool(dispatched));
    }
}
