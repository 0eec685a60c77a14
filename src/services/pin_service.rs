use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{AuthError, PaymentError};
use crate::models::{AuthorizationToken, PinSecurityState};
use crate::security;

/// Lockout ladder, seconds. Index is failed attempts minus one; the fifth
/// and every later failure hold the longest delay.
const LOCKOUT_DELAYS_SECS: [i64; 5] = [0, 30, 120, 300, 900];

fn lockout_for(failed_attempts: u32) -> i64 {
    let idx = (failed_attempts.saturating_sub(1) as usize).min(LOCKOUT_DELAYS_SECS.len() - 1);
    LOCKOUT_DELAYS_SECS[idx]
}

pub struct PinService;

impl PinService {
    /// First-time PIN enrollment. Changing an existing PIN goes through
    /// [`PinService::change_pin`] so the old PIN is always proven first.
    pub fn set_pin(
        state: &Arc<AppState>,
        user_id: Uuid,
        pin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        if !security::is_valid_pin_format(pin) {
            return Err(PaymentError::Validation(
                "PIN must be exactly four digits".into(),
            ));
        }
        if state.pins.find_state(user_id).is_some() {
            return Err(PaymentError::InvalidState(
                "a PIN is already set; use change_pin".into(),
            ));
        }

        let salt = security::generate_salt();
        let iterations = state.config.pin.hash_iterations;
        let pin_hash = security::hash_pin(pin, &salt, &state.config.pin.pepper, iterations);
        state.pins.upsert_state(PinSecurityState {
            user_id,
            pin_hash,
            salt,
            iterations,
            failed_attempts: 0,
            locked_until: None,
            updated_at: now,
        });
        info!(%user_id, "transaction PIN enrolled");
        Ok(())
    }

    pub fn change_pin(
        state: &Arc<AppState>,
        user_id: Uuid,
        current_pin: &str,
        new_pin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        if !security::is_valid_pin_format(new_pin) {
            return Err(PaymentError::Validation(
                "PIN must be exactly four digits".into(),
            ));
        }
        // Proving the current PIN consumes an attempt and can lock, exactly
        // like a payment authorization, but mints no token.
        Self::check_pin(state, user_id, current_pin, now)?;

        let salt = security::generate_salt();
        let iterations = state.config.pin.hash_iterations;
        let pin_hash = security::hash_pin(new_pin, &salt, &state.config.pin.pepper, iterations);
        state.pins.upsert_state(PinSecurityState {
            user_id,
            pin_hash,
            salt,
            iterations,
            failed_attempts: 0,
            locked_until: None,
            updated_at: now,
        });
        info!(%user_id, "transaction PIN changed");
        Ok(())
    }

    /// Checks the PIN and, on success, issues a single-use authorization
    /// token.
    pub fn verify_pin(
        state: &Arc<AppState>,
        user_id: Uuid,
        pin: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationToken, PaymentError> {
        Self::check_pin(state, user_id, pin, now)?;

        let token = AuthorizationToken {
            id: Uuid::new_v4(),
            user_id,
            issued_at: now,
            expires_at: now + Duration::seconds(state.config.pin.token_ttl_secs),
        };
        state.pins.insert_token(token.clone());
        info!(%user_id, token_id = %token.id, "PIN verified, authorization token issued");
        Ok(token)
    }

    /// The bare proof: lockout gate, constant-time comparison, attempt
    /// bookkeeping. Mints nothing, so callers that only need the PIN proven
    /// leave no token behind. While a lockout is active the guess is not
    /// even hashed, so a locked account leaks nothing and burns no attempts.
    fn check_pin(
        state: &Arc<AppState>,
        user_id: Uuid,
        pin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let record = state
            .pins
            .find_state(user_id)
            .ok_or(PaymentError::Auth(AuthError::PinNotSet))?;

        if let Some(unlock_at) = record.locked_until {
            if now < unlock_at {
                warn!(%user_id, %unlock_at, "PIN check rejected during lockout");
                return Err(PaymentError::Auth(AuthError::Locked { unlock_at }));
            }
        }

        let candidate =
            security::hash_pin(pin, &record.salt, &state.config.pin.pepper, record.iterations);

        if security::hashes_match(&record.pin_hash, &candidate) {
            state.pins.with_state_mut(user_id, |s| {
                s.failed_attempts = 0;
                s.locked_until = None;
                s.updated_at = now;
            });
            return Ok(());
        }

        let updated = state
            .pins
            .with_state_mut(user_id, |s| {
                s.failed_attempts += 1;
                let delay = lockout_for(s.failed_attempts);
                s.locked_until = (delay > 0).then(|| now + Duration::seconds(delay));
                s.updated_at = now;
            })
            .ok_or(PaymentError::Auth(AuthError::PinNotSet))?;

        warn!(
            %user_id,
            failed_attempts = updated.failed_attempts,
            locked = updated.locked_until.is_some(),
            "incorrect PIN"
        );
        Err(PaymentError::Auth(AuthError::IncorrectPin {
            failed_attempts: updated.failed_attempts,
            locked_until: updated.locked_until,
        }))
    }

    /// Burns a token. Exactly one caller can succeed per token; replays come
    /// back as `TokenUsed`, forged or foreign ids as `TokenInvalid`.
    pub fn consume_token(
        state: &Arc<AppState>,
        user_id: Uuid,
        token_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        match state.pins.take_token(token_id, user_id) {
            Some(token) => {
                if token.expires_at <= now {
                    return Err(PaymentError::Auth(AuthError::TokenExpired));
                }
                Ok(())
            }
            None => {
                if state.pins.was_consumed(token_id) {
                    Err(PaymentError::Auth(AuthError::TokenUsed))
                } else {
                    Err(PaymentError::Auth(AuthError::TokenInvalid))
                }
            }
        }
    }
}
