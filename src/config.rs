use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub dify: DifyConfig,
    pub credits: CreditsConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DifyConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

/// Reward policy for account bonuses and daily check-ins.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditsConfig {
    pub new_user_bonus: i32,
    pub daily_checkin_base: i32,
    pub daily_checkin_bonus: i32,
    /// Longest streak that still increases the per-day bonus.
    pub max_consecutive_days: i32,
    /// Extra rewards granted on landing exactly on a streak length.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<MilestoneBonus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneBonus {
    pub days: i32,
    pub bonus: i32,
}

fn default_milestones() -> Vec<MilestoneBonus> {
    vec![
        MilestoneBonus { days: 7, bonus: 50 },
        MilestoneBonus {
            days: 15,
            bonus: 100,
        },
        MilestoneBonus {
            days: 30,
            bonus: 200,
        },
    ]
}

/// Pricing for metered upstream calls. The per-endpoint table is consulted in
/// order, first matching prefix wins; `default_cost` covers everything else.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub endpoint_costs: Vec<EndpointCost>,
    pub default_cost: i32,
    pub prompt_token_cost: f64,
    pub completion_token_cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointCost {
    pub prefix: String,
    pub cost: i32,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from config.yml (required) with environment variable overrides
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("DIFYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
