use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Everything the PIN gate tracks per user. The raw PIN never appears here,
/// only the iterated salted hash.
#[derive(Debug, Clone, Serialize)]
pub struct PinSecurityState {
    pub user_id: Uuid,
    pub pin_hash: String,
    /// Hex-encoded random salt, unique per user.
    pub salt: String,
    pub iterations: u32,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Single-use proof of a successful PIN check. Consumed by the first
/// sensitive operation that presents it, or dead after `expires_at`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
