pub mod accounts;
pub mod api_usage_records;
pub mod checkin_records;
pub mod credit_history;
pub mod sea_orm_active_enums;
