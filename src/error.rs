use crate::models::Transaction;
use chrono::{DateTime, Utc};
use std::fmt;

/// Which spend ceiling an admission ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    PerTransaction,
    DailyOutflow,
}

impl fmt::Display for CapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapKind::PerTransaction => write!(f, "per-transaction cap"),
            CapKind::DailyOutflow => write!(f, "daily outflow cap"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// PIN verification refused while a lockout window is active.
    Locked { unlock_at: DateTime<Utc> },
    /// Wrong PIN; carries the attempt count and any lock that was just applied.
    IncorrectPin {
        failed_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    },
    PinNotSet,
    TokenInvalid,
    TokenExpired,
    TokenUsed,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Locked { unlock_at } => {
                write!(f, "PIN entry is locked until {}", unlock_at.to_rfc3339())
            }
            AuthError::IncorrectPin {
                failed_attempts,
                locked_until,
            } => match locked_until {
                Some(until) => write!(
                    f,
                    "incorrect PIN ({} failed attempts, locked until {})",
                    failed_attempts,
                    until.to_rfc3339()
                ),
                None => write!(f, "incorrect PIN ({} failed attempts)", failed_attempts),
            },
            AuthError::PinNotSet => write!(f, "no PIN configured for this account"),
            AuthError::TokenInvalid => write!(f, "authorization token not recognized"),
            AuthError::TokenExpired => write!(f, "authorization token expired"),
            AuthError::TokenUsed => write!(f, "authorization token already used"),
        }
    }
}

#[derive(Debug)]
pub enum PaymentError {
    /// Malformed input; the caller's fault, never retried.
    Validation(String),
    InsufficientFunds {
        wallet_id: uuid::Uuid,
        available: i64,
        requested: i64,
    },
    LimitExceeded {
        cap: CapKind,
        limit: i64,
        attempted: i64,
    },
    /// Same idempotency key as a live entry; carries the prior entry so the
    /// caller can return the original result instead of failing.
    DuplicateIntent(Box<Transaction>),
    Auth(AuthError),
    /// Attempted transition out of a terminal state, or a settled handle.
    InvalidState(String),
    /// Gateway timeout / 5xx; eligible for retry with the same reference.
    GatewayTransient(String),
    /// Explicit decline at the rail; terminal immediately.
    GatewayRejected(String),
    NotFound(String),
    Internal(String),
}

impl PaymentError {
    /// Only ambiguous gateway trouble may be re-attempted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::GatewayTransient(_))
    }
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::Validation(msg) => write!(f, "validation error: {}", msg),
            PaymentError::InsufficientFunds {
                wallet_id,
                available,
                requested,
            } => write!(
                f,
                "insufficient funds in wallet {}: available {}, requested {}",
                wallet_id, available, requested
            ),
            PaymentError::LimitExceeded {
                cap,
                limit,
                attempted,
            } => write!(f, "{} exceeded: limit {}, attempted {}", cap, limit, attempted),
            PaymentError::DuplicateIntent(tx) => {
                write!(f, "duplicate intent, original transaction {}", tx.id)
            }
            PaymentError::Auth(e) => write!(f, "authorization error: {}", e),
            PaymentError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            PaymentError::GatewayTransient(msg) => write!(f, "gateway unavailable: {}", msg),
            PaymentError::GatewayRejected(msg) => write!(f, "gateway declined: {}", msg),
            PaymentError::NotFound(msg) => write!(f, "not found: {}", msg),
            PaymentError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<AuthError> for PaymentError {
    fn from(err: AuthError) -> Self {
        PaymentError::Auth(err)
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level trouble is indistinguishable from a lost response,
        // so it stays retryable under the same reference.
        PaymentError::GatewayTransient(err.to_string())
    }
}
