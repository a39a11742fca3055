use crate::{
    config::Config,
    services::{CheckinService, CreditService, DifyClient, DifyProxyService},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub credit_service: Arc<CreditService>,
    pub checkin_service: Arc<CheckinService>,
    pub proxy_service: Arc<DifyProxyService<DifyClient>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        // Initialize services
        let credit_service = Arc::new(CreditService::new(db.clone()));
        let checkin_service = Arc::new(CheckinService::new(db.clone(), &config.credits));
        let proxy_service = Arc::new(DifyProxyService::new(
            db.clone(),
            DifyClient::new(&config.dify),
            &config.pricing,
        ));

        Ok(Self {
            db,
            credit_service,
            checkin_service,
            proxy_service,
            config: Arc::new(config),
        })
    }
}
