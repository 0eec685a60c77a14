use eyre::{eyre, Report};
use secrecy::SecretString;
use std::env;

/// PIN hashing and authorization-token policy.
#[derive(Debug, Clone)]
pub struct PinPolicy {
    /// Application-wide secondary secret mixed into every PIN hash.
    pub pepper: SecretString,
    pub hash_iterations: u32,
    /// Lifetime of a single-use authorization token, in seconds.
    pub token_ttl_secs: i64,
}

impl PinPolicy {
    pub fn from_env() -> Result<Self, Report> {
        let iterations: u32 = env::var("PIN_HASH_ITERATIONS")
            .unwrap_or_else(|_| "10000".into())
            .parse()?;
        if iterations < 10_000 {
            return Err(eyre!("PIN_HASH_ITERATIONS must be at least 10000"));
        }

        Ok(Self {
            pepper: SecretString::new(
                env::var("KOLO_PIN_PEPPER")
                    .map_err(|_| eyre!("KOLO_PIN_PEPPER must be set"))?
                    .into(),
            ),
            hash_iterations: iterations,
            token_ttl_secs: env::var("AUTH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "120".into())
                .parse()?,
        })
    }
}

/// Admission ceilings, in minor currency units.
#[derive(Debug, Clone, Copy)]
pub struct SpendCaps {
    pub per_transaction: i64,
    pub daily_outflow: i64,
}

impl SpendCaps {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            per_transaction: env::var("PER_TXN_CAP_MINOR")
                .unwrap_or_else(|_| "100000000".into())
                .parse()?,
            daily_outflow: env::var("DAILY_OUTFLOW_CAP_MINOR")
                .unwrap_or_else(|_| "500000000".into())
                .parse()?,
        })
    }
}

/// Backoff schedule for ambiguous gateway failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay_secs: i64,
    pub max_delay_secs: i64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            base_delay_secs: env::var("RETRY_BASE_DELAY_SECS")
                .unwrap_or_else(|_| "1".into())
                .parse()?,
            max_delay_secs: env::var("RETRY_MAX_DELAY_SECS")
                .unwrap_or_else(|_| "4".into())
                .parse()?,
            max_attempts: env::var("RETRY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
        })
    }
}

/// Connection details for the hosted payment gateway (card + mobile money).
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    pub api_url: String,
    pub secret_key: SecretString,
    pub timeout_secs: u64,
}

impl GatewayInfo {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            api_url: env::var("PAYGATE_API_URL")
                .unwrap_or_else(|_| "https://api.paygate.example".into()),
            secret_key: SecretString::new(
                env::var("PAYGATE_SECRET_KEY")
                    .map_err(|_| eyre!("PAYGATE_SECRET_KEY must be set"))?
                    .into(),
            ),
            timeout_secs: env::var("PAYGATE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pin: PinPolicy,
    pub caps: SpendCaps,
    pub retry: RetryPolicy,
    /// Minimum wait between a savings withdrawal reservation and its commit.
    pub savings_settlement_delay_minutes: i64,
    /// Flat fee charged on external withdrawals, minor units.
    pub withdrawal_fee_minor: i64,
    pub gateway: GatewayInfo,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            pin: PinPolicy::from_env()?,
            caps: SpendCaps::from_env()?,
            retry: RetryPolicy::from_env()?,
            savings_settlement_delay_minutes: env::var("SAVINGS_SETTLEMENT_DELAY_MINUTES")
                .unwrap_or_else(|_| "60".into())
                .parse()?,
            withdrawal_fee_minor: env::var("WITHDRAWAL_FEE_MINOR")
                .unwrap_or_else(|_| "0".into())
                .parse()?,
            gateway: GatewayInfo::from_env()?,
        })
    }
}
