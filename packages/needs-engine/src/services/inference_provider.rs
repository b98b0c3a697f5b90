use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::error::ExternalServiceError;
use crate::needs::model::{InferenceClient, InferenceRequest, InferenceResponse};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_RETRIES: u32 = 1;
const BASE_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        Self {
            api_endpoint: env_string("INFERENCE_API_ENDPOINT")
                .map(|v| v.trim().trim_end_matches('/').to_string()),
            api_key: env_string("INFERENCE_API_KEY"),
            timeout: Duration::from_millis(
                env_u64("INFERENCE_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            max_retries: env_u64("INFERENCE_MAX_RETRIES")
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }
}

/// HTTP scoring backend: `POST {endpoint}/score` with the request as JSON.
#[derive(Clone)]
pub struct HttpInferenceProvider {
    config: InferenceConfig,
    client: reqwest::Client,
}

impl HttpInferenceProvider {
    pub fn new(config: InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(InferenceConfig::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_endpoint
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }

    async fn post_with_retry(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ExternalServiceError> {
        let endpoint = self
            .config
            .api_endpoint
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ExternalServiceError::NotConfigured("INFERENCE_API_ENDPOINT"))?;
        let url = format!("{endpoint}/score");
        let max_retries = self.config.max_retries;

        let mut retry = 0;
        loop {
            let mut builder = self.client.post(&url).json(request);
            if let Some(key) = self.config.api_key.as_deref() {
                builder = builder.bearer_auth(key);
            }

            let err = match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(|e| {
                            error!(
                                error = %e,
                                body = %String::from_utf8_lossy(&bytes),
                                "failed to parse inference response"
                            );
                            ExternalServiceError::Json(e)
                        });
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = ExternalServiceError::HttpStatus { status, body };
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => ExternalServiceError::Request(e),
            };

            if retry >= max_retries {
                return Err(err);
            }
            let backoff = Duration::from_millis(BASE_BACKOFF_MS << retry.min(10));
            warn!(retry, error = %err, "inference request failed, retrying");
            sleep(backoff).await;
            retry += 1;
        }
    }
}

impl InferenceClient for HttpInferenceProvider {
    fn score(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse, ExternalServiceError>> + Send {
        self.post_with_retry(request)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::needs::types::{AnalysisContext, CulturalContext};

    fn request() -> InferenceRequest {
        InferenceRequest {
            feature_vector: Default::default(),
            cultural_context: CulturalContext {
                language: "en".into(),
                cultural_background: "western".into(),
                socioeconomic_context: "middle-income".into(),
            },
            context: AnalysisContext::default(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(reqwest::StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_fast() {
        let provider = HttpInferenceProvider::new(InferenceConfig::default());
        assert!(!provider.is_available());
        let err = provider.score(&request()).await.unwrap_err();
        assert!(matches!(err, ExternalServiceError::NotConfigured(_)));
    }
}
