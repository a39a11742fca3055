use crate::{
    error::{is_unique_violation, ApiError, Result},
    models::{
        common::{normalize_page, Paginated},
        credits::{CreditMutation, LedgerEntryRecord},
    },
};
use entity::sea_orm_active_enums::CreditKind;
use sea_orm::{entity::*, query::*, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{info, instrument};
use uuid::Uuid;

/// Sole writer of `accounts` and `credit_history`. Every mutation commits the
/// balance change and its ledger entry in one transaction, or neither.
pub struct CreditService {
    db: DatabaseConnection,
}

impl CreditService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Current balance; the single source of truth for balance reads.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: Uuid) -> Result<i32> {
        let account = entity::accounts::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(ApiError::AccountNotFound(user_id))?;

        Ok(account.balance)
    }

    /// Create the account row for a freshly registered user, seeding it with
    /// the configured welcome bonus (one `BONUS` ledger entry when non-zero).
    #[instrument(skip(self))]
    pub async fn create_account(&self, user_id: Uuid, welcome_bonus: i32) -> Result<CreditMutation> {
        if welcome_bonus < 0 {
            return Err(ApiError::InvalidAmount(welcome_bonus));
        }

        let txn = self.db.begin().await?;

        let now = time::OffsetDateTime::now_utc();
        let account = entity::accounts::ActiveModel {
            user_id: Set(user_id),
            balance: Set(welcome_bonus),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let insert_result = entity::accounts::Entity::insert(account).exec(&txn).await;
        if let Err(ref e) = insert_result {
            if is_unique_violation(e) {
                return Err(ApiError::Conflict(format!(
                    "Account {} already exists",
                    user_id
                )));
            }
        }
        insert_result?;

        if welcome_bonus > 0 {
            self.append_entry_in_txn(
                user_id,
                welcome_bonus,
                welcome_bonus,
                "New account bonus",
                CreditKind::Bonus,
                None,
                &txn,
            )
            .await?;
        }

        txn.commit().await?;

        info!(
            user_id = %user_id,
            welcome_bonus,
            "Created account with welcome bonus"
        );

        Ok(CreditMutation {
            new_balance: welcome_bonus,
        })
    }

    /// Grant credits. Atomic: lock the account row, bump the balance, append
    /// one positive ledger entry of the given kind.
    #[instrument(skip(self, reason))]
    pub async fn add(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        kind: CreditKind,
    ) -> Result<CreditMutation> {
        let txn = self.db.begin().await?;
        let mutation = self.add_in_txn(user_id, amount, reason, kind, &txn).await?;
        txn.commit().await?;

        info!(
            user_id = %user_id,
            amount,
            new_balance = mutation.new_balance,
            "Added credits"
        );

        Ok(mutation)
    }

    /// Grant credits within an existing transaction. Used by services that
    /// need to atomically combine their own inserts with the credit grant.
    pub async fn add_in_txn(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        kind: CreditKind,
        txn: &DatabaseTransaction,
    ) -> Result<CreditMutation> {
        if amount <= 0 {
            return Err(ApiError::InvalidAmount(amount));
        }

        let account = self.find_and_lock_account(user_id, txn).await?;
        let new_balance = account.balance + amount;

        let mut account_active: entity::accounts::ActiveModel = account.into();
        account_active.balance = Set(new_balance);
        account_active.updated_at = Set(time::OffsetDateTime::now_utc());
        account_active.update(txn).await?;

        self.append_entry_in_txn(user_id, amount, new_balance, reason, kind, None, txn)
            .await?;

        Ok(CreditMutation { new_balance })
    }

    /// Spend credits. One serializable read-check-write transaction scoped to
    /// the account row: the balance can never go negative even under
    /// concurrent callers, and a failed deduction leaves no partial effect.
    #[instrument(skip(self, reason))]
    pub async fn deduct(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        endpoint: Option<&str>,
    ) -> Result<CreditMutation> {
        if amount <= 0 {
            return Err(ApiError::InvalidAmount(amount));
        }

        let txn = self.db.begin().await?;

        let account = self.find_and_lock_account(user_id, &txn).await?;
        if account.balance < amount {
            txn.rollback().await?;
            return Err(ApiError::InsufficientCredits(format!(
                "needed {}, have {}",
                amount, account.balance
            )));
        }

        let new_balance = account.balance - amount;

        let mut account_active: entity::accounts::ActiveModel = account.into();
        account_active.balance = Set(new_balance);
        account_active.updated_at = Set(time::OffsetDateTime::now_utc());
        account_active.update(&txn).await?;

        self.append_entry_in_txn(
            user_id,
            -amount,
            new_balance,
            reason,
            CreditKind::Consumption,
            endpoint,
            &txn,
        )
        .await?;

        txn.commit().await?;

        info!(
            user_id = %user_id,
            amount,
            new_balance,
            "Deducted credits"
        );

        Ok(CreditMutation { new_balance })
    }

    /// Advisory affordability check. This is a plain read, not a reservation:
    /// another request may spend the balance before a later `deduct` runs,
    /// which is where the hard guarantee lives.
    #[instrument(skip(self))]
    pub async fn check_sufficient(&self, user_id: Uuid, required: i32) -> Result<bool> {
        let balance = self.get_balance(user_id).await?;
        Ok(balance >= required)
    }

    /// Ledger history, newest-first.
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        user_id: Uuid,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Paginated<LedgerEntryRecord>> {
        let (page, limit) = normalize_page(page, limit);

        let paginator = entity::credit_history::Entity::find()
            .filter(entity::credit_history::Column::UserId.eq(user_id))
            .order_by_desc(entity::credit_history::Column::CreatedAt)
            .paginate(&self.db, limit);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(LedgerEntryRecord::from)
            .collect();

        Ok(Paginated {
            items,
            total: totals.number_of_items,
            page,
            limit,
            total_pages: totals.number_of_pages,
        })
    }

    /// Helper: lock the account row for update within a transaction.
    async fn find_and_lock_account(
        &self,
        user_id: Uuid,
        txn: &DatabaseTransaction,
    ) -> Result<entity::accounts::Model> {
        entity::accounts::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(ApiError::AccountNotFound(user_id))
    }

    /// Helper: append one immutable ledger row reflecting a committed delta.
    #[allow(clippy::too_many_arguments)]
    async fn append_entry_in_txn(
        &self,
        user_id: Uuid,
        amount: i32,
        balance_after: i32,
        reason: &str,
        kind: CreditKind,
        endpoint: Option<&str>,
        txn: &DatabaseTransaction,
    ) -> Result<()> {
        let entry = entity::credit_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            amount: Set(amount),
            balance_after: Set(balance_after),
            reason: Set(reason.to_string()),
            kind: Set(kind),
            endpoint: Set(endpoint.map(|s| s.to_string())),
            created_at: Set(time::OffsetDateTime::now_utc()),
        };

        entity::credit_history::Entity::insert(entry).exec(txn).await?;
        Ok(())
    }
}
