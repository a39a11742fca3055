use crate::{
    config::PricingConfig,
    error::{ApiError, Result},
    models::usage::{ProxyOutcome, ProxyRequest, TokenUsage, UsageStats},
    services::{
        credit_service::CreditService,
        dify_client::{ByteStream, DifyGateway, GatewayResponse},
    },
};
use entity::sea_orm_active_enums::UsageStatus;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Meters consumption of the proxied, cost-variable upstream API: estimate,
/// authorize, execute, measure, record, charge. The true cost is only known
/// after the call settles, so the pre-authorization estimate is reconciled
/// against the measured cost before charging.
pub struct DifyProxyService<G> {
    db: DatabaseConnection,
    gateway: G,
    credit_service: CreditService,
    pricing: PricingConfig,
}

/// What a settled call attempt costs and how it is recorded.
#[derive(Debug, Clone)]
struct Settlement {
    cost: i32,
    usage: Option<TokenUsage>,
    status: UsageStatus,
    error_message: Option<String>,
}

impl<G: DifyGateway> DifyProxyService<G> {
    pub fn new(db: DatabaseConnection, gateway: G, pricing: &PricingConfig) -> Self {
        let credit_service = CreditService::new(db.clone());
        Self {
            db,
            gateway,
            credit_service,
            pricing: pricing.clone(),
        }
    }

    /// Proxy one non-streaming call and charge for it.
    ///
    /// The affordability pre-check gates the call but reserves nothing;
    /// the actual charge happens after the call settles, at the measured
    /// cost. Bookkeeping failures after the call never mask its result.
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    pub async fn meter(&self, user_id: Uuid, request: ProxyRequest) -> Result<ProxyOutcome> {
        let estimate = estimate_cost(&self.pricing, &request.endpoint);

        if !self.credit_service.check_sufficient(user_id, estimate).await? {
            return Err(ApiError::InsufficientCredits(format!(
                "estimated cost {} exceeds current balance",
                estimate
            )));
        }

        let call_result = self.gateway.call(&request).await;
        let settlement = settle_outcome(&self.pricing, estimate, &call_result);

        self.apply_settlement(user_id, &request.endpoint, &settlement)
            .await;

        match call_result {
            Ok(GatewayResponse { body, usage }) => {
                info!(
                    user_id = %user_id,
                    endpoint = %request.endpoint,
                    credit_cost = settlement.cost,
                    "Metered API call succeeded"
                );
                Ok(ProxyOutcome {
                    data: body,
                    usage,
                    credit_cost: settlement.cost,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Proxy one streaming call: estimate and authorize up front, then hand
    /// the live byte stream to the caller. Final token usage is only known
    /// after the stream completes, so successfully initiated streams are not
    /// measured or charged; a failed initiation settles like a non-streaming
    /// failure.
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    pub async fn meter_streaming(&self, user_id: Uuid, request: ProxyRequest) -> Result<ByteStream> {
        let estimate = estimate_cost(&self.pricing, &request.endpoint);

        if !self.credit_service.check_sufficient(user_id, estimate).await? {
            return Err(ApiError::InsufficientCredits(format!(
                "estimated cost {} exceeds current balance",
                estimate
            )));
        }

        match self.gateway.call_streaming(&request).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                let settlement = settle_failure(estimate, &e);
                self.apply_settlement(user_id, &request.endpoint, &settlement)
                    .await;
                Err(e)
            }
        }
    }

    /// Usage totals over the trailing `window_days`, with a per-endpoint
    /// breakdown of request count and credits spent.
    #[instrument(skip(self))]
    pub async fn usage_stats(&self, user_id: Uuid, window_days: i64) -> Result<UsageStats> {
        let since = time::OffsetDateTime::now_utc() - time::Duration::days(window_days);

        let records = entity::api_usage_records::Entity::find()
            .filter(entity::api_usage_records::Column::UserId.eq(user_id))
            .filter(entity::api_usage_records::Column::CreatedAt.gte(since))
            .order_by_desc(entity::api_usage_records::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut stats = UsageStats::default();
        for record in &records {
            stats.total_requests += 1;
            match record.status {
                UsageStatus::Success => stats.successful_requests += 1,
                UsageStatus::Error => stats.failed_requests += 1,
            }
            stats.total_tokens_used += i64::from(record.total_tokens);
            stats.total_credits_spent += i64::from(record.credit_cost);

            let entry = stats
                .endpoint_stats
                .entry(record.endpoint.clone())
                .or_default();
            entry.count += 1;
            entry.credits += i64::from(record.credit_cost);
        }

        Ok(stats)
    }

    /// Record the attempt and charge the settled cost. Both steps run after
    /// the upstream call already happened, so failures here are logged and
    /// swallowed; neither is retried, since credit-affecting operations must
    /// not be silently repeated.
    async fn apply_settlement(&self, user_id: Uuid, endpoint: &str, settlement: &Settlement) {
        if let Err(e) = self.record_usage(user_id, endpoint, settlement).await {
            error!(
                user_id = %user_id,
                endpoint,
                error = %e,
                "Failed to record API usage"
            );
        }

        if settlement.cost > 0 {
            let reason = format!("API call: {}", endpoint);
            if let Err(e) = self
                .credit_service
                .deduct(user_id, settlement.cost, &reason, Some(endpoint))
                .await
            {
                warn!(
                    user_id = %user_id,
                    endpoint,
                    cost = settlement.cost,
                    error = %e,
                    "Post-call deduction failed; not retrying"
                );
            }
        }
    }

    async fn record_usage(&self, user_id: Uuid, endpoint: &str, settlement: &Settlement) -> Result<()> {
        let usage = settlement.usage.unwrap_or_default();

        let record = entity::api_usage_records::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            endpoint: Set(endpoint.to_string()),
            prompt_tokens: Set(usage.prompt_tokens),
            completion_tokens: Set(usage.completion_tokens),
            total_tokens: Set(usage.total_tokens),
            credit_cost: Set(settlement.cost),
            status: Set(settlement.status),
            error_message: Set(settlement.error_message.clone()),
            created_at: Set(time::OffsetDateTime::now_utc()),
        };

        entity::api_usage_records::Entity::insert(record)
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

/// Flat pre-authorization estimate: first matching prefix in the configured
/// table wins, otherwise the default rate.
fn estimate_cost(pricing: &PricingConfig, endpoint: &str) -> i32 {
    pricing
        .endpoint_costs
        .iter()
        .find(|entry| endpoint.starts_with(&entry.prefix))
        .map(|entry| entry.cost)
        .unwrap_or(pricing.default_cost)
}

/// Measured cost from reported token counts; never below one credit.
fn token_cost(pricing: &PricingConfig, usage: &TokenUsage) -> i32 {
    let cost = f64::from(usage.prompt_tokens) * pricing.prompt_token_cost
        + f64::from(usage.completion_tokens) * pricing.completion_token_cost;
    (cost.ceil() as i64).max(1) as i32
}

/// Reconcile the estimate against what the call actually consumed:
/// - success with token usage: the measured cost supersedes the estimate;
/// - success without usage metadata: the estimate stands;
/// - rejected by the provider (4xx): a minimal flat penalty, the call did
///   consume upstream resources;
/// - provider/network failure or timeout: free, the provider itself failed.
fn settle_outcome(
    pricing: &PricingConfig,
    estimate: i32,
    result: &Result<GatewayResponse>,
) -> Settlement {
    match result {
        Ok(response) => {
            let cost = response
                .usage
                .as_ref()
                .map(|usage| token_cost(pricing, usage))
                .unwrap_or(estimate);
            Settlement {
                cost,
                usage: response.usage,
                status: UsageStatus::Success,
                error_message: None,
            }
        }
        Err(e) => settle_failure(estimate, e),
    }
}

fn settle_failure(estimate: i32, error: &ApiError) -> Settlement {
    let cost = match error {
        ApiError::UpstreamClient { .. } => estimate.min(1),
        _ => 0,
    };

    Settlement {
        cost,
        usage: None,
        status: UsageStatus::Error,
        error_message: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointCost;
    use serde_json::json;

    fn test_pricing() -> PricingConfig {
        PricingConfig {
            endpoint_costs: vec![
                EndpointCost {
                    prefix: "/chat-messages".to_string(),
                    cost: 10,
                },
                EndpointCost {
                    prefix: "/completion-messages".to_string(),
                    cost: 8,
                },
                EndpointCost {
                    prefix: "/workflows/run".to_string(),
                    cost: 15,
                },
            ],
            default_cost: 5,
            prompt_token_cost: 0.001,
            completion_token_cost: 0.002,
        }
    }

    #[test]
    fn estimate_uses_first_matching_prefix() {
        let pricing = test_pricing();
        assert_eq!(estimate_cost(&pricing, "/chat-messages"), 10);
        assert_eq!(estimate_cost(&pricing, "/chat-messages/abc/stop"), 10);
        assert_eq!(estimate_cost(&pricing, "/workflows/run"), 15);
    }

    #[test]
    fn estimate_falls_back_to_default_rate() {
        assert_eq!(estimate_cost(&test_pricing(), "/audio-to-text"), 5);
    }

    #[test]
    fn token_cost_rounds_up_from_measured_usage() {
        let pricing = test_pricing();
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        };
        // 1000 * 0.001 + 500 * 0.002 = 2.0
        assert_eq!(token_cost(&pricing, &usage), 2);

        let partial = TokenUsage {
            prompt_tokens: 1001,
            completion_tokens: 500,
            total_tokens: 1501,
        };
        assert_eq!(token_cost(&pricing, &partial), 3);
    }

    #[test]
    fn token_cost_never_below_one_credit() {
        let usage = TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
        };
        assert_eq!(token_cost(&test_pricing(), &usage), 1);
    }

    #[test]
    fn measured_cost_supersedes_estimate() {
        let pricing = test_pricing();
        let result = Ok(GatewayResponse {
            body: json!({"answer": "ok"}),
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 500,
                total_tokens: 1500,
            }),
        });

        let settlement = settle_outcome(&pricing, 10, &result);
        assert_eq!(settlement.cost, 2);
        assert_eq!(settlement.status, UsageStatus::Success);
    }

    #[test]
    fn success_without_usage_keeps_estimate() {
        let result = Ok(GatewayResponse {
            body: json!({"answer": "ok"}),
            usage: None,
        });

        let settlement = settle_outcome(&test_pricing(), 10, &result);
        assert_eq!(settlement.cost, 10);
    }

    #[test]
    fn client_error_charges_minimal_penalty() {
        let result = Err(ApiError::UpstreamClient {
            status: 400,
            body: "bad request".to_string(),
        });

        let settlement = settle_outcome(&test_pricing(), 10, &result);
        assert_eq!(settlement.cost, 1);
        assert_eq!(settlement.status, UsageStatus::Error);
        assert!(settlement.error_message.is_some());
    }

    #[test]
    fn server_error_and_timeout_are_free() {
        let pricing = test_pricing();

        let timeout = settle_outcome(&pricing, 10, &Err(ApiError::UpstreamTimeout));
        assert_eq!(timeout.cost, 0);
        assert_eq!(timeout.status, UsageStatus::Error);

        let server = settle_outcome(
            &pricing,
            10,
            &Err(ApiError::UpstreamServer("connection reset".to_string())),
        );
        assert_eq!(server.cost, 0);
    }
}
