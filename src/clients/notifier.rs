use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    PaymentSettled { transaction_id: Uuid, amount: i64 },
    PaymentFailed {
        transaction_id: Uuid,
        amount: i64,
        reason: String,
    },
    RoundUpSwept { transaction_id: Uuid, amount: i64 },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, user_id: Uuid, event: NotificationEvent);
}

/// Default dispatcher: writes the event to the log stream. A push or email
/// channel slots in behind the same trait.
#[derive(Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(&self, user_id: Uuid, event: NotificationEvent) {
        match event {
            NotificationEvent::PaymentSettled {
                transaction_id,
                amount,
            } => {
                info!(%user_id, %transaction_id, amount, "notify: payment settled");
            }
            NotificationEvent::PaymentFailed {
                transaction_id,
                amount,
                reason,
            } => {
                info!(%user_id, %transaction_id, amount, %reason, "notify: payment failed");
            }
            NotificationEvent::RoundUpSwept {
                transaction_id,
                amount,
            } => {
                info!(%user_id, %transaction_id, amount, "notify: round-up swept");
            }
        }
    }
}
