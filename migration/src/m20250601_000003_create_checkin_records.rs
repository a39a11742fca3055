use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CheckinRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CheckinRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CheckinRecords::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CheckinRecords::CheckinDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckinRecords::CreditEarned)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckinRecords::ConsecutiveDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckinRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Sole concurrency guard against double rewards: a simultaneous
        // duplicate insert must fail at write time.
        manager
            .create_index(
                Index::create()
                    .name("idx_checkin_records_user_date")
                    .table(CheckinRecords::Table)
                    .col(CheckinRecords::UserId)
                    .col(CheckinRecords::CheckinDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CheckinRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CheckinRecords {
    Table,
    Id,
    UserId,
    CheckinDate,
    CreditEarned,
    ConsecutiveDays,
    CreatedAt,
}
