use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiUsageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiUsageRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApiUsageRecords::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ApiUsageRecords::Endpoint)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::PromptTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::CompletionTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::TotalTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::CreditCost)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::Status)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::ErrorMessage)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ApiUsageRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Usage stats aggregate over a trailing time window per user
        manager
            .create_index(
                Index::create()
                    .name("idx_api_usage_records_user_created")
                    .table(ApiUsageRecords::Table)
                    .col(ApiUsageRecords::UserId)
                    .col(ApiUsageRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiUsageRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ApiUsageRecords {
    Table,
    Id,
    UserId,
    Endpoint,
    PromptTokens,
    CompletionTokens,
    TotalTokens,
    CreditCost,
    Status,
    ErrorMessage,
    CreatedAt,
}
