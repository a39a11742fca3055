use entity::sea_orm_active_enums::CreditKind;
use serde::Serialize;
use uuid::Uuid;

/// Result of a successful balance mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditMutation {
    pub new_balance: i32,
}

/// One ledger row as exposed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryRecord {
    pub id: Uuid,
    pub amount: i32,
    pub balance_after: i32,
    pub reason: String,
    pub kind: CreditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub created_at: time::OffsetDateTime,
}

impl From<entity::credit_history::Model> for LedgerEntryRecord {
    fn from(m: entity::credit_history::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            balance_after: m.balance_after,
            reason: m.reason,
            kind: m.kind,
            endpoint: m.endpoint,
            created_at: m.created_at,
        }
    }
}
