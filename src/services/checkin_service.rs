use crate::{
    config::CreditsConfig,
    error::{is_unique_violation, ApiError, Result},
    models::{
        checkin::{CheckinRecordItem, CheckinResult, CheckinStatus},
        common::{normalize_page, Paginated},
    },
    services::credit_service::CreditService,
};
use entity::sea_orm_active_enums::CreditKind;
use sea_orm::{entity::*, query::*, DatabaseConnection, TransactionTrait};
use tracing::{info, instrument};
use uuid::Uuid;

/// Daily check-in rewards with streak bonuses. The `(user_id, checkin_date)`
/// unique index is the sole guard against double rewards under concurrency.
pub struct CheckinService {
    db: DatabaseConnection,
    credit_service: CreditService,
    config: CreditsConfig,
}

impl CheckinService {
    pub fn new(db: DatabaseConnection, config: &CreditsConfig) -> Self {
        let credit_service = CreditService::new(db.clone());
        Self {
            db,
            credit_service,
            config: config.clone(),
        }
    }

    /// Perform today's check-in, creating the record and granting the reward
    /// in one transaction.
    #[instrument(skip(self))]
    pub async fn checkin(&self, user_id: Uuid) -> Result<CheckinResult> {
        let today = time::OffsetDateTime::now_utc().date();

        if self.find_record(user_id, today).await?.is_some() {
            return Err(ApiError::DuplicateCheckin);
        }

        // Streak continues only from an unbroken yesterday
        let consecutive_days = match today.previous_day() {
            Some(yesterday) => match self.find_record(user_id, yesterday).await? {
                Some(prev) => prev.consecutive_days + 1,
                None => 1,
            },
            None => 1,
        };

        let credit_earned = reward_for_streak(consecutive_days, &self.config);

        let txn = self.db.begin().await?;

        let record = entity::checkin_records::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            checkin_date: Set(today),
            credit_earned: Set(credit_earned),
            consecutive_days: Set(consecutive_days),
            created_at: Set(time::OffsetDateTime::now_utc()),
        };

        // A racing duplicate trips the unique index here and aborts the whole
        // check-in: no record without reward, no reward without record.
        let insert_result = entity::checkin_records::Entity::insert(record)
            .exec(&txn)
            .await;
        if let Err(ref e) = insert_result {
            if is_unique_violation(e) {
                return Err(ApiError::DuplicateCheckin);
            }
        }
        insert_result?;

        let reason = format!("Daily check-in reward (streak: {} days)", consecutive_days);
        let mutation = self
            .credit_service
            .add_in_txn(user_id, credit_earned, &reason, CreditKind::Checkin, &txn)
            .await?;

        txn.commit().await?;

        let mut message = format!("Check-in successful! Earned {} credits", credit_earned);
        if consecutive_days > 1 {
            message.push_str(&format!(", {} days in a row", consecutive_days));
        }
        if self
            .config
            .milestones
            .iter()
            .any(|m| m.days == consecutive_days)
        {
            message.push_str(", streak milestone bonus unlocked!");
        }

        info!(
            user_id = %user_id,
            credit_earned,
            consecutive_days,
            "Daily check-in recorded"
        );

        Ok(CheckinResult {
            credit_earned,
            consecutive_days,
            total_credits: mutation.new_balance,
            message,
        })
    }

    /// Today's check-in state. The streak is reported as zero unless the
    /// latest record is from today or yesterday, even though older records
    /// remain in history.
    #[instrument(skip(self))]
    pub async fn status(&self, user_id: Uuid) -> Result<CheckinStatus> {
        let today = time::OffsetDateTime::now_utc().date();

        let latest = entity::checkin_records::Entity::find()
            .filter(entity::checkin_records::Column::UserId.eq(user_id))
            .order_by_desc(entity::checkin_records::Column::CheckinDate)
            .one(&self.db)
            .await?;

        let total_checkins = entity::checkin_records::Entity::find()
            .filter(entity::checkin_records::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;

        let has_checked_today = latest
            .as_ref()
            .map(|r| r.checkin_date == today)
            .unwrap_or(false);

        let consecutive_days = match &latest {
            Some(r)
                if r.checkin_date == today || Some(r.checkin_date) == today.previous_day() =>
            {
                r.consecutive_days
            }
            _ => 0,
        };

        Ok(CheckinStatus {
            has_checked_today,
            consecutive_days,
            total_checkins,
            last_checkin_date: latest.map(|r| r.checkin_date),
        })
    }

    /// Check-in history, newest-first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        user_id: Uuid,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Paginated<CheckinRecordItem>> {
        let (page, limit) = normalize_page(page, limit);

        let paginator = entity::checkin_records::Entity::find()
            .filter(entity::checkin_records::Column::UserId.eq(user_id))
            .order_by_desc(entity::checkin_records::Column::CheckinDate)
            .paginate(&self.db, limit);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(CheckinRecordItem::from)
            .collect();

        Ok(Paginated {
            items,
            total: totals.number_of_items,
            page,
            limit,
            total_pages: totals.number_of_pages,
        })
    }

    async fn find_record(
        &self,
        user_id: Uuid,
        date: time::Date,
    ) -> Result<Option<entity::checkin_records::Model>> {
        let record = entity::checkin_records::Entity::find()
            .filter(entity::checkin_records::Column::UserId.eq(user_id))
            .filter(entity::checkin_records::Column::CheckinDate.eq(date))
            .one(&self.db)
            .await?;
        Ok(record)
    }
}

/// Reward for landing on day `consecutive_days` of a streak: the base amount,
/// plus a per-day bonus for each prior streak day (capped by the configured
/// maximum), plus any milestone hit by exact day count. Exact-match milestones
/// mean a re-accumulated streak re-earns the same milestone on a later pass.
fn reward_for_streak(consecutive_days: i32, config: &CreditsConfig) -> i32 {
    let mut reward = config.daily_checkin_base;

    if consecutive_days > 1 {
        let bonus_days = (consecutive_days - 1).min(config.max_consecutive_days - 1);
        reward += bonus_days * config.daily_checkin_bonus;
    }

    if let Some(milestone) = config
        .milestones
        .iter()
        .find(|m| m.days == consecutive_days)
    {
        reward += milestone.bonus;
    }

    reward
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MilestoneBonus;

    fn test_config() -> CreditsConfig {
        CreditsConfig {
            new_user_bonus: 1000,
            daily_checkin_base: 10,
            daily_checkin_bonus: 5,
            max_consecutive_days: 30,
            milestones: vec![
                MilestoneBonus { days: 7, bonus: 50 },
                MilestoneBonus {
                    days: 15,
                    bonus: 100,
                },
                MilestoneBonus {
                    days: 30,
                    bonus: 200,
                },
            ],
        }
    }

    #[test]
    fn first_day_earns_base_only() {
        assert_eq!(reward_for_streak(1, &test_config()), 10);
    }

    #[test]
    fn streak_adds_per_day_bonus() {
        // day 2: base + 1 bonus day
        assert_eq!(reward_for_streak(2, &test_config()), 15);
        // day 5: base + 4 bonus days
        assert_eq!(reward_for_streak(5, &test_config()), 30);
    }

    #[test]
    fn day_seven_hits_milestone() {
        // 10 + min(6, 29) * 5 + 50
        assert_eq!(reward_for_streak(7, &test_config()), 90);
    }

    #[test]
    fn milestones_are_exact_match_not_threshold() {
        let config = test_config();
        // day 8 gets the per-day bonus but no milestone
        assert_eq!(reward_for_streak(8, &config), 45);
        assert_eq!(reward_for_streak(15, &config), 180);
        assert_eq!(reward_for_streak(16, &config), 85);
    }

    #[test]
    fn per_day_bonus_caps_at_max_streak() {
        let config = test_config();
        // day 30: bonus days capped at 29, plus the 30-day milestone
        assert_eq!(reward_for_streak(30, &config), 10 + 29 * 5 + 200);
        // day 31 and beyond stay capped with no milestone
        assert_eq!(reward_for_streak(31, &config), 10 + 29 * 5);
        assert_eq!(reward_for_streak(100, &config), 10 + 29 * 5);
    }
}
