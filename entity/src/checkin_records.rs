use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per `(user_id, checkin_date)`; the unique index on that pair is the
/// concurrency guard against double rewards.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkin_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub checkin_date: TimeDate,
    pub credit_earned: i32,
    pub consecutive_days: i32,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
