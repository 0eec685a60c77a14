use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::{GatewayStatus, PaymentMethod, PayoutDestination};

/// Definite outcome of a gateway call. Transport failures, timeouts and
/// unreadable responses never produce a receipt; they surface as
/// `PaymentError::GatewayTransient` so the retry queue can take over.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub status: GatewayStatus,
    pub external_id: Option<String>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Pulls money in from an external instrument.
    async fn charge(
        &self,
        reference: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<GatewayReceipt, PaymentError>;

    /// Pushes money out to an external account.
    async fn payout(
        &self,
        reference: Uuid,
        amount: i64,
        destination: &PayoutDestination,
    ) -> Result<GatewayReceipt, PaymentError>;
}
