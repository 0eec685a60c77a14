use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::enum_types::{TransactionStatus, TransactionType};

/// A journal entry. Entries are append-only: once admitted, only status, the
/// retry bookkeeping and the linkage fields change, and status moves exactly
/// once, from `Pending` to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub counterparty_id: Option<Uuid>,

    pub transaction_type: TransactionType,
    /// Minor currency units, always positive.
    pub amount: i64,
    pub fee: i64,
    pub from_wallet_id: Option<Uuid>,
    pub to_wallet_id: Option<Uuid>,

    pub status: TransactionStatus,
    /// Identifier assigned by the payment gateway once known.
    pub external_transaction_id: Option<String>,
    /// Companion entry, e.g. the round-up sweep spawned by a transfer.
    pub linked_transaction_id: Option<Uuid>,
    pub round_up_details: Option<RoundUpDetails>,

    pub idempotency_key: Option<String>,
    /// Stable reference sent to the gateway on every dispatch attempt.
    pub reference: Uuid,

    pub description: Option<String>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub metadata: Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Sweep linkage carried by both sides of a round-up pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundUpDetails {
    pub round_up_amount: i64,
    pub linked_transaction_id: Uuid,
}

/// Input to journal admission. The journal assigns id, reference, status and
/// timestamps when it accepts the entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub counterparty_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub fee: i64,
    pub from_wallet_id: Option<Uuid>,
    pub to_wallet_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Value,
}
