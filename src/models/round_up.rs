use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enum_types::IncrementType;

/// Per-user round-up configuration plus lifetime savings counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundUpRule {
    pub user_id: Uuid,
    pub increment_type: IncrementType,
    /// Basis points, only read when `increment_type` is `Percentage`.
    /// 1000 bps = 10% of the qualifying amount.
    pub percentage_bps: i64,
    pub is_enabled: bool,

    /// Clamp bounds for the auto-tuned increment, minor units.
    pub min_increment: i64,
    pub max_increment: i64,
    /// How far back the auto tuner looks at completed payments.
    pub analysis_window_days: i64,
    /// Last increment the tuner settled on, refreshed at most daily.
    pub auto_increment: Option<i64>,
    pub auto_refreshed_at: Option<DateTime<Utc>>,

    pub total_round_ups_count: i64,
    pub total_amount_saved: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoundUpRule {
    /// Default rule issued at account activation: round to the nearest 50,
    /// switched off until the user opts in.
    pub fn default_for(user_id: Uuid, now: DateTime<Utc>) -> Self {
        RoundUpRule {
            user_id,
            increment_type: IncrementType::Fifty,
            percentage_bps: 0,
            is_enabled: false,
            min_increment: 10,
            max_increment: 1000,
            analysis_window_days: 30,
            auto_increment: None,
            auto_refreshed_at: None,
            total_round_ups_count: 0,
            total_amount_saved: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields a user may change on their rule; `None` leaves the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundUpRuleUpdate {
    pub increment_type: Option<IncrementType>,
    pub percentage_bps: Option<i64>,
    pub is_enabled: Option<bool>,
    pub min_increment: Option<i64>,
    pub max_increment: Option<i64>,
}
