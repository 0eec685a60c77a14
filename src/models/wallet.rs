use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enum_types::WalletType;

/// Balances are minor currency units. `available_balance` excludes funds held
/// by open reservations, so `available_balance <= balance` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_type: WalletType,
    pub balance: i64,
    pub available_balance: i64,
    /// Savings commits must wait this long after reservation.
    pub settlement_delay_minutes: i64,
    /// While set and in the future, nothing leaves this wallet.
    pub lock_in_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(
        user_id: Uuid,
        wallet_type: WalletType,
        settlement_delay_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Wallet {
            id: Uuid::new_v4(),
            user_id,
            wallet_type,
            balance: 0,
            available_balance: 0,
            settlement_delay_minutes,
            lock_in_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Funds reserved but not yet committed or released.
    pub fn held(&self) -> i64 {
        self.balance - self.available_balance
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_in_until.map(|until| now < until).unwrap_or(false)
    }
}

/// A hold on wallet funds awaiting commit or release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: i64,
    /// Set for wallets with a settlement delay; commit before this fails.
    pub earliest_commit_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
