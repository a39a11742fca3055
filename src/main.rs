use difygate::{AppState, Config};
use migration::{Migrator, MigratorTrait};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,difygate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting difygate credit ledger");

    // Load configuration
    let config = Config::load()?;

    // Initialize application state
    let state = AppState::new(config).await?;

    // Bring the schema up to date before serving any traffic
    Migrator::up(&state.db, None).await?;

    tracing::info!("Database migrations applied; services ready");

    Ok(())
}
