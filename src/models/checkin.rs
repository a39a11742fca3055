use serde::Serialize;

/// Outcome of a successful daily check-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinResult {
    pub credit_earned: i32,
    pub consecutive_days: i32,
    pub total_credits: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinStatus {
    pub has_checked_today: bool,
    /// Zero unless the latest record is from today or yesterday, even though
    /// older records remain in history.
    pub consecutive_days: i32,
    pub total_checkins: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkin_date: Option<time::Date>,
}

/// One check-in row as exposed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecordItem {
    pub checkin_date: time::Date,
    pub credit_earned: i32,
    pub consecutive_days: i32,
}

impl From<entity::checkin_records::Model> for CheckinRecordItem {
    fn from(m: entity::checkin_records::Model) -> Self {
        Self {
            checkin_date: m.checkin_date,
            credit_earned: m.credit_earned,
            consecutive_days: m.consecutive_days,
        }
    }
}
