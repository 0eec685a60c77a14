use std::sync::Arc;

use crate::clients::{NotificationDispatcher, PaymentGateway};
use crate::config::AppConfig;
use crate::repositories::{
    PinRepository, RoundUpRepository, TransactionRepository, UserRepository, WalletRepository,
};

/// Everything a request touches, built once at startup and shared. The
/// gateway and notifier come in as trait objects so tests can substitute
/// scripted doubles.
pub struct AppState {
    pub config: AppConfig,
    pub users: UserRepository,
    pub wallets: WalletRepository,
    pub journal: TransactionRepository,
    pub round_ups: RoundUpRepository,
    pub pins: PinRepository,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            users: UserRepository::new(),
            wallets: WalletRepository::new(),
            journal: TransactionRepository::new(),
            round_ups: RoundUpRepository::new(),
            pins: PinRepository::new(),
            gateway,
            notifier,
        })
    }
}
