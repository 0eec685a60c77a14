use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::PaymentError;
use crate::models::{ActivationResponse, User};

pub struct AccountService;

impl AccountService {
    /// Creates the user with an empty main and savings wallet and a default
    /// (disabled) round-up rule.
    pub fn activate(
        state: &Arc<AppState>,
        email: &str,
    ) -> Result<ActivationResponse, PaymentError> {
        let now = Utc::now();
        let user = state.users.create(email, now)?;
        let (main, savings) = state.wallets.create_pair(
            user.id,
            state.config.savings_settlement_delay_minutes,
            now,
        )?;
        state.round_ups.create_default(user.id, now);

        info!(user_id = %user.id, "account activated");
        Ok(ActivationResponse {
            user_id: user.id,
            main_wallet_id: main.id,
            savings_wallet_id: savings.id,
        })
    }

    pub fn verify_kyc(state: &Arc<AppState>, user_id: Uuid) -> Result<User, PaymentError> {
        let user = state.users.set_kyc_verified(user_id, true)?;
        info!(%user_id, "KYC verified");
        Ok(user)
    }
}
