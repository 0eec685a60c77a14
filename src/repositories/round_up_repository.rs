use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::{RoundUpRule, RoundUpRuleUpdate};

/// One rule per user, keyed by user id.
pub struct RoundUpRepository {
    rules: DashMap<Uuid, RoundUpRule>,
}

impl RoundUpRepository {
    pub fn new() -> Self {
        RoundUpRepository {
            rules: DashMap::new(),
        }
    }

    pub fn create_default(&self, user_id: Uuid, now: DateTime<Utc>) -> RoundUpRule {
        let rule = RoundUpRule::default_for(user_id, now);
        self.rules.insert(user_id, rule.clone());
        rule
    }

    pub fn find(&self, user_id: Uuid) -> Result<RoundUpRule, PaymentError> {
        self.rules
            .get(&user_id)
            .map(|r| r.clone())
            .ok_or_else(|| PaymentError::NotFound(format!("no round-up rule for user {user_id}")))
    }

    pub fn update_settings(
        &self,
        user_id: Uuid,
        update: RoundUpRuleUpdate,
        now: DateTime<Utc>,
    ) -> Result<RoundUpRule, PaymentError> {
        let mut rule = self
            .rules
            .get_mut(&user_id)
            .ok_or_else(|| PaymentError::NotFound(format!("no round-up rule for user {user_id}")))?;

        if let Some(increment_type) = update.increment_type {
            rule.increment_type = increment_type;
        }
        if let Some(bps) = update.percentage_bps {
            rule.percentage_bps = bps;
        }
        if let Some(enabled) = update.is_enabled {
            rule.is_enabled = enabled;
        }
        if let Some(min) = update.min_increment {
            rule.min_increment = min;
        }
        if let Some(max) = update.max_increment {
            rule.max_increment = max;
        }
        rule.updated_at = now;
        Ok(rule.clone())
    }

    /// Bumps the lifetime counters once a sweep settles.
    pub fn record_sweep(
        &self,
        user_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<RoundUpRule, PaymentError> {
        let mut rule = self
            .rules
            .get_mut(&user_id)
            .ok_or_else(|| PaymentError::NotFound(format!("no round-up rule for user {user_id}")))?;
        rule.total_round_ups_count += 1;
        rule.total_amount_saved += amount;
        rule.updated_at = now;
        Ok(rule.clone())
    }

    pub fn store_auto_increment(
        &self,
        user_id: Uuid,
        increment: i64,
        now: DateTime<Utc>,
    ) -> Result<RoundUpRule, PaymentError> {
        let mut rule = self
            .rules
            .get_mut(&user_id)
            .ok_or_else(|| PaymentError::NotFound(format!("no round-up rule for user {user_id}")))?;
        rule.auto_increment = Some(increment);
        rule.auto_refreshed_at = Some(now);
        rule.updated_at = now;
        Ok(rule.clone())
    }
}

impl Default for RoundUpRepository {
    fn default() -> Self {
        Self::new()
    }
}
