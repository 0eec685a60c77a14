use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enum_types::{
    IncrementType, PaymentMethod, TransactionStatus, TransactionType, WalletType,
};
use crate::models::transaction::Transaction;
use crate::models::wallet::Wallet;

// --- Wallet & Balance DTOs ---

#[derive(Debug, Serialize)]
pub struct WalletDto {
    pub id: Uuid,
    pub wallet_type: WalletType,
    pub balance: i64, // minor units
    pub available_balance: i64,
    pub lock_in_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct WalletsResponse {
    pub wallets: Vec<WalletDto>,
    pub total_balance: i64,
}

impl From<&Wallet> for WalletDto {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id,
            wallet_type: wallet.wallet_type,
            balance: wallet.balance,
            available_balance: wallet.available_balance,
            lock_in_until: wallet.lock_in_until,
        }
    }
}

// --- Transfer DTOs ---

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub recipient_email: String,
    pub amount: i64,
    pub description: Option<String>,
    pub idempotency_key: String,
    /// Single-use token from a successful PIN check.
    pub auth_token: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction_id: Uuid,
    pub reference: Uuid,
    pub status: TransactionStatus,
    pub amount: i64,
    /// Minor units swept to savings alongside this transfer, if any.
    pub round_up_amount: Option<i64>,
}

// --- Top-up DTOs ---

#[derive(Debug, Clone, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    pub idempotency_key: String,
    pub auth_token: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub transaction_id: Uuid,
    pub reference: Uuid,
    pub status: TransactionStatus,
    pub amount: i64,
}

// --- Withdrawal DTOs ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutDestination {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub wallet_type: WalletType,
    pub amount: i64,
    pub destination: PayoutDestination,
    pub idempotency_key: String,
    pub auth_token: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub transaction_id: Uuid,
    pub reference: Uuid,
    pub status: TransactionStatus,
    pub amount: i64,
    pub fee: i64,
}

// --- Payment DTOs ---

/// What the spend is for; decides which journal entry type gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    Purchase,
    Bill,
}

impl PaymentCategory {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            PaymentCategory::Purchase => TransactionType::Payment,
            PaymentCategory::Bill => TransactionType::BillPayment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    pub category: PaymentCategory,
    pub description: Option<String>,
    pub idempotency_key: String,
    pub auth_token: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub transaction_id: Uuid,
    pub reference: Uuid,
    pub status: TransactionStatus,
    pub amount: i64,
    pub round_up_amount: Option<i64>,
}

// --- Transaction history DTOs ---

#[derive(Debug, Serialize)]
pub struct TransactionSummaryDto {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub fee: i64,
    pub status: TransactionStatus,
    pub counterparty_id: Option<Uuid>,
    pub description: Option<String>,
    pub round_up_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionSummaryDto>,
}

impl From<&Transaction> for TransactionSummaryDto {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.id,
            transaction_type: txn.transaction_type,
            amount: txn.amount,
            fee: txn.fee,
            status: txn.status,
            counterparty_id: txn.counterparty_id,
            description: txn.description.clone(),
            round_up_amount: txn.round_up_details.as_ref().map(|d| d.round_up_amount),
            created_at: txn.created_at,
        }
    }
}

// --- Round-up DTOs ---

#[derive(Debug, Serialize)]
pub struct RoundUpStatusResponse {
    pub increment_type: IncrementType,
    pub is_enabled: bool,
    pub percentage_bps: i64,
    /// Unit currently in force for fixed and auto modes.
    pub effective_increment: Option<i64>,
    pub total_round_ups_count: i64,
    pub total_amount_saved: i64,
}

// --- Account DTOs ---

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub user_id: Uuid,
    pub main_wallet_id: Uuid,
    pub savings_wallet_id: Uuid,
}
