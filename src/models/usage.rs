use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A caller-supplied request to be proxied upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub endpoint: String,
    pub method: ProxyMethod,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<ProxyMethod> for reqwest::Method {
    fn from(m: ProxyMethod) -> Self {
        match m {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
            ProxyMethod::Put => reqwest::Method::PUT,
            ProxyMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Token counts reported by the upstream API in `metadata.usage`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

/// What a metered non-streaming call returns to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOutcome {
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub credit_cost: i32,
}

/// Aggregated usage over a trailing window.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens_used: i64,
    pub total_credits_spent: i64,
    pub endpoint_stats: HashMap<String, EndpointStat>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStat {
    pub count: u64,
    pub credits: i64,
}
