use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Every user owns exactly one wallet of each type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Main,
    Savings,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    TransferIn,
    TransferOut,
    RoundUp,
    BillPayment,
    Withdrawal,
    Deposit,
}

impl TransactionType {
    /// Types that count against the daily outflow ceiling. Round-up sweeps
    /// move money into the user's own savings and are exempt.
    pub fn counts_toward_daily_outflow(&self) -> bool {
        matches!(
            self,
            TransactionType::Payment
                | TransactionType::BillPayment
                | TransactionType::Withdrawal
                | TransactionType::TransferOut
        )
    }

    /// Types whose settlement depends on a gateway round-trip.
    pub fn is_gateway_bound(&self) -> bool {
        matches!(
            self,
            TransactionType::Payment
                | TransactionType::BillPayment
                | TransactionType::Withdrawal
                | TransactionType::Deposit
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// Terminal entries are immutable; only `Pending` may transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Round-up increment configuration. The numeric variants are fixed units in
/// minor currency; `Auto` derives its unit from the user's payment history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncrementType {
    Ten,
    Fifty,
    Hundred,
    Percentage,
    Auto,
}

impl IncrementType {
    pub fn fixed_unit(&self) -> Option<i64> {
        match self {
            IncrementType::Ten => Some(10),
            IncrementType::Fifty => Some(50),
            IncrementType::Hundred => Some(100),
            IncrementType::Percentage | IncrementType::Auto => None,
        }
    }
}

/// Rail used for an external charge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    MobileMoney,
}

/// Definite outcome reported by the gateway. Ambiguous failures never reach
/// this type; they surface as `PaymentError::GatewayTransient`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Approved,
    Rejected,
}
