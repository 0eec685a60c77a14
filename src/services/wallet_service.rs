use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::PaymentError;
use crate::models::{
    TransactionSummaryDto, TransactionsResponse, WalletDto, WalletType, WalletsResponse,
};

pub struct WalletService;

impl WalletService {
    pub fn list_wallets(
        state: &Arc<AppState>,
        user_id: Uuid,
    ) -> Result<WalletsResponse, PaymentError> {
        state.users.find(user_id)?;
        let wallets = state.wallets.list_for_user(user_id);
        let total_balance = wallets.iter().map(|w| w.balance).sum();
        Ok(WalletsResponse {
            wallets: wallets.iter().map(WalletDto::from).collect(),
            total_balance,
        })
    }

    pub fn transaction_history(
        state: &Arc<AppState>,
        user_id: Uuid,
        limit: usize,
    ) -> Result<TransactionsResponse, PaymentError> {
        state.users.find(user_id)?;
        let transactions = state.journal.recent_for_user(user_id, limit);
        Ok(TransactionsResponse {
            transactions: transactions.iter().map(TransactionSummaryDto::from).collect(),
        })
    }

    /// Sets or extends the lock-in date on the user's savings wallet.
    pub fn set_lock_in(
        state: &Arc<AppState>,
        user_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<WalletDto, PaymentError> {
        let now = Utc::now();
        let savings = state
            .wallets
            .find_by_user_and_type(user_id, WalletType::Savings)?;
        let updated = state.wallets.set_lock_in(savings.id, until, now)?;
        info!(%user_id, lock_in_until = ?until, "savings lock-in updated");
        Ok(WalletDto::from(&updated))
    }
}
