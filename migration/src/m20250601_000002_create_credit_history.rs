use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only ledger of signed balance deltas
        manager
            .create_table(
                Table::create()
                    .table(CreditHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CreditHistory::UserId).uuid().not_null())
                    .col(ColumnDef::new(CreditHistory::Amount).integer().not_null())
                    .col(
                        ColumnDef::new(CreditHistory::BalanceAfter)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CreditHistory::Reason).string().not_null())
                    .col(
                        ColumnDef::new(CreditHistory::Kind)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CreditHistory::Endpoint).string().null())
                    .col(
                        ColumnDef::new(CreditHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // History is always read newest-first per user
        manager
            .create_index(
                Index::create()
                    .name("idx_credit_history_user_created")
                    .table(CreditHistory::Table)
                    .col(CreditHistory::UserId)
                    .col(CreditHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CreditHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CreditHistory {
    Table,
    Id,
    UserId,
    Amount,
    BalanceAfter,
    Reason,
    Kind,
    Endpoint,
    CreatedAt,
}
