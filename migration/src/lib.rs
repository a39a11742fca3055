pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_accounts;
mod m20250601_000002_create_credit_history;
mod m20250601_000003_create_checkin_records;
mod m20250601_000004_create_api_usage_records;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_accounts::Migration),
            Box::new(m20250601_000002_create_credit_history::Migration),
            Box::new(m20250601_000003_create_checkin_records::Migration),
            Box::new(m20250601_000004_create_api_usage_records::Migration),
        ]
    }
}
