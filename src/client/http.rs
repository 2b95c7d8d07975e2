//! HTTP implementation of the raffle gateway client.

use super::types::{ApiResponse, RaffleData, TokenGrant};
use super::{ApiError, RaffleApi};
use crate::models::Raffle;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for the gateway client.
#[derive(Debug, Clone)]
pub struct RaffleApiConfig {
    /// Origin used when a raffle carries no `gatewayOrigin` of its own.
    pub fallback_origin: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RaffleApiConfig {
    fn default() -> Self {
        Self {
            fallback_origin: None,
            timeout_ms: 15_000,
        }
    }
}

impl From<&crate::config::ApiConfig> for RaffleApiConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            fallback_origin: config.fallback_origin.clone(),
            timeout_ms: config.timeout_ms,
        }
    }
}

/// `reqwest`-backed gateway client. One shared connection pool; the bearer
/// token and origin vary per raffle.
#[derive(Debug, Clone)]
pub struct HttpRaffleApi {
    client: Client,
    config: RaffleApiConfig,
}

impl HttpRaffleApi {
    pub fn new(config: RaffleApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn origin_for(&self, raffle: &Raffle) -> Result<String, ApiError> {
        raffle
            .token
            .gateway_origin
            .clone()
            .filter(|o| !o.is_empty())
            .or_else(|| self.config.fallback_origin.clone())
            .ok_or_else(|| {
                ApiError::MissingEndpoint(format!(
                    "raffle {} has no gateway origin",
                    raffle.post_id
                ))
            })
    }

    fn bearer_for(raffle: &Raffle) -> String {
        raffle.token.webbit_token.clone().unwrap_or_default()
    }

    fn map_send_error(error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(error.to_string())
        } else {
            ApiError::Network(error.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>, ApiError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Self::map_send_error)?;
        let data = match serde_json::from_str::<T>(&body) {
            Ok(data) => Some(data),
            Err(error) => {
                // Error bodies are routinely non-JSON; the status code is
                // what the engine keys its policy on.
                debug!(status, %error, "gateway body did not decode");
                None
            }
        };
        Ok(ApiResponse { status, data })
    }
}

#[async_trait]
impl RaffleApi for HttpRaffleApi {
    #[instrument(skip(self, raffle), fields(post_id = %raffle.post_id))]
    async fn refresh_token(&self, raffle: &Raffle) -> Result<ApiResponse<TokenGrant>, ApiError> {
        let webview_url = raffle
            .token
            .webview_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ApiError::MissingEndpoint(format!(
                    "raffle {} has no webview URL to negotiate a token from",
                    raffle.post_id
                ))
            })?;
        let origin = self.origin_for(raffle)?;

        let response = self
            .client
            .post(format!("{origin}/api/token"))
            .json(&serde_json::json!({ "webviewUrl": webview_url }))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let decoded: ApiResponse<TokenGrant> = Self::decode(response).await?;
        if !decoded.is_success() {
            warn!(status = decoded.status, "token negotiation failed");
        }
        Ok(decoded)
    }

    #[instrument(skip(self, raffle), fields(post_id = %raffle.post_id))]
    async fn fetch_raffle(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError> {
        let origin = self.origin_for(raffle)?;
        let response = self
            .client
            .get(format!("{origin}/api/raffle"))
            .bearer_auth(Self::bearer_for(raffle))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::decode(response).await
    }

    #[instrument(skip(self, raffle), fields(post_id = %raffle.post_id))]
    async fn claim(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError> {
        let origin = self.origin_for(raffle)?;
        let response = self
            .client
            .post(format!("{origin}/api/raffle/claim"))
            .bearer_auth(Self::bearer_for(raffle))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::decode(response).await
    }
}
