use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction/category of a ledger entry. Stored as text in `credit_history.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditKind {
    #[sea_orm(string_value = "BONUS")]
    Bonus,
    #[sea_orm(string_value = "CHECKIN")]
    Checkin,
    #[sea_orm(string_value = "CONSUMPTION")]
    Consumption,
}

/// Outcome of a metered upstream call. Stored as text in `api_usage_records.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "error")]
    Error,
}
