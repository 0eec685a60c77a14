use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Withdrawals to external accounts require a verified identity.
    pub kyc_verified: bool,
    pub created_at: DateTime<Utc>,
}
