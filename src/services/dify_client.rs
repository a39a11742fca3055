use crate::{
    config::DifyConfig,
    error::{ApiError, Result},
    models::usage::{ProxyRequest, TokenUsage},
};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;
use tracing::instrument;

/// Live upstream response body, yielded chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A settled non-streaming upstream response.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub body: serde_json::Value,
    pub usage: Option<TokenUsage>,
}

/// Seam to the proxied AI API. Implementations classify every failure into
/// `UpstreamClient` (4xx, status and body preserved), `UpstreamServer`
/// (5xx or transport failure), or `UpstreamTimeout`.
pub trait DifyGateway: Send + Sync {
    fn call(
        &self,
        request: &ProxyRequest,
    ) -> impl std::future::Future<Output = Result<GatewayResponse>> + Send;

    fn call_streaming(
        &self,
        request: &ProxyRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream>> + Send;
}

/// Production gateway over the Dify HTTP API.
pub struct DifyClient {
    config: DifyConfig,
    http_client: reqwest::Client,
}

impl DifyClient {
    pub fn new(config: &DifyConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            config: config.clone(),
            http_client,
        }
    }

    fn build_request(&self, request: &ProxyRequest) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.api_url, request.endpoint);
        let mut builder = self
            .http_client
            .request(request.method.into(), url)
            .header("Authorization", format!("Bearer {}", self.config.api_key));

        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        builder
    }
}

impl DifyGateway for DifyClient {
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    async fn call(&self, request: &ProxyRequest) -> Result<GatewayResponse> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let response = classify_status(response).await?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ApiError::UpstreamServer(format!("invalid upstream response body: {}", e))
        })?;
        let usage = extract_usage(&body);

        Ok(GatewayResponse { body, usage })
    }

    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    async fn call_streaming(&self, request: &ProxyRequest) -> Result<ByteStream> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let response = classify_status(response).await?;

        Ok(Box::pin(
            response.bytes_stream().map_err(classify_transport_error),
        ))
    }
}

fn classify_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::UpstreamTimeout
    } else {
        ApiError::UpstreamServer(e.to_string())
    }
}

/// Turn a non-2xx response into the matching classified error, preserving the
/// original status and body for client errors.
async fn classify_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_client_error() {
        Err(ApiError::UpstreamClient {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(ApiError::UpstreamServer(format!(
            "upstream returned {}: {}",
            status, body
        )))
    }
}

/// Token counts live under `metadata.usage` in Dify response bodies; absence
/// is normal for endpoints that don't bill by token.
pub(crate) fn extract_usage(body: &serde_json::Value) -> Option<TokenUsage> {
    let usage = body.get("metadata")?.get("usage")?;
    serde_json::from_value(usage.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_usage_from_metadata() {
        let body = json!({
            "answer": "hello",
            "metadata": {
                "usage": {
                    "prompt_tokens": 1000,
                    "completion_tokens": 500,
                    "total_tokens": 1500
                }
            }
        });

        let usage = extract_usage(&body).expect("usage should parse");
        assert_eq!(usage.prompt_tokens, 1000);
        assert_eq!(usage.completion_tokens, 500);
        assert_eq!(usage.total_tokens, 1500);
    }

    #[test]
    fn missing_or_malformed_usage_is_none() {
        assert!(extract_usage(&json!({"answer": "hi"})).is_none());
        assert!(extract_usage(&json!({"metadata": {}})).is_none());
        assert!(extract_usage(&json!({"metadata": {"usage": "oops"}})).is_none());
    }
}
