//! Helcim processor API client.
//!
//! A thin, retry-free wrapper over the Helcim v2 payment endpoints. Every call
//! takes the [`GatewayConfig`] of the current request, so one client can serve
//! several configured gateways.
//!
//! ```no_run
//! use commerce_helcim_driver::{HelcimClient, ProcessorApi, VoidRequest};
//! use commerce_helcim_types::{GatewayConfig, GatewayMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new(
//!         GatewayMode::Test,
//!         std::env::var("HELCIM_API_TOKEN")?,
//!         std::env::var("HELCIM_SECRET_KEY")?,
//!     );
//!     let client = HelcimClient::new()?;
//!     let response = client
//!         .void_payment(&VoidRequest { transaction_id: "20163175".into() }, &config)
//!         .await?;
//!     println!("void: {}", response.status);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use commerce_helcim_types::{GatewayConfig, RemoteTransaction};
use reqwest::{Method, header::CONTENT_TYPE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error, info};
use url::Url;

pub mod error;

pub use error::{ApiError, Result};

/// Helcim uses one base URL for test and live; the api token selects the mode
pub const DEFAULT_API_BASE: &str = "https://api.helcim.com/v2";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_TOKEN_HEADER: &str = "api-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Authorize and capture in one step
    Purchase,
    /// Authorize only
    Preauth,
}

/// Body of `POST /payment/process`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub token: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub order_id: String,
    pub customer_code: String,
}

/// Body of `POST /payment/capture`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub transaction_id: String,
    pub amount: Decimal,
}

/// Body of `POST /payment/void`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidRequest {
    pub transaction_id: String,
}

/// Body of `POST /payment/refund`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub transaction_id: String,
    pub amount: Decimal,
}

/// Error envelope returned with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

/// Operations the gateway needs from the payment processor
#[async_trait]
pub trait ProcessorApi: Send + Sync {
    async fn process_payment(
        &self,
        request: &ProcessRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction>;

    async fn capture_payment(
        &self,
        request: &CaptureRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction>;

    async fn void_payment(
        &self,
        request: &VoidRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction>;

    async fn refund_payment(
        &self,
        request: &RefundRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction>;

    async fn get_transaction(
        &self,
        transaction_id: &str,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction>;
}

/// HTTP client for the Helcim API
#[derive(Debug, Clone)]
pub struct HelcimClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HelcimClient {
    /// Client pointed at the production Helcim API
    pub fn new() -> Result<Self> {
        let base_url =
            Url::parse(DEFAULT_API_BASE).map_err(|e| ApiError::Client(e.to_string()))?;
        Self::with_base_url(base_url)
    }

    /// Client pointed at another API root (a proxy or a local mock)
    pub fn with_base_url(base_url: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint
        )
    }

    /// Send one request and decode the JSON response.
    ///
    /// Non-2xx responses and network failures become [`ApiError::Transport`],
    /// an undecodable 2xx body becomes [`ApiError::Decode`].
    pub async fn request<P, R>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&P>,
        config: &GatewayConfig,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint_url(endpoint);
        debug!(method = %method, endpoint, "Sending Helcim API request");

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_TOKEN_HEADER, &config.api_token);
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = format!("Helcim API request failed: {}", e);
                error!(method = %method, endpoint, "Helcim API error: {}", message);
                return Err(ApiError::Transport {
                    status: None,
                    message,
                });
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let message = format!("Helcim API request failed: {}", e);
            error!(method = %method, endpoint, "Helcim API error: {}", message);
            ApiError::Transport {
                status: Some(status.as_u16()),
                message,
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| format!("Helcim API request failed: {} {}", status, body));
            error!(
                method = %method,
                endpoint,
                status = status.as_u16(),
                "Helcim API error: {}",
                message
            );
            return Err(ApiError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let decoded = serde_json::from_str::<R>(&body).map_err(|e| {
            error!(method = %method, endpoint, "Invalid JSON response from Helcim API: {}", e);
            ApiError::Decode(e.to_string())
        })?;

        if config.mode.is_test() {
            info!(method = %method, endpoint, "Helcim API request successful");
        }

        Ok(decoded)
    }

    /// Check that the configured api token is accepted by the processor
    pub async fn validate_credentials(&self, config: &GatewayConfig) -> bool {
        self.request::<(), serde_json::Value>(Method::GET, "/payment/transactions", None, config)
            .await
            .is_ok()
    }
}

#[async_trait]
impl ProcessorApi for HelcimClient {
    async fn process_payment(
        &self,
        request: &ProcessRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction> {
        self.request(Method::POST, "/payment/process", Some(request), config)
            .await
    }

    async fn capture_payment(
        &self,
        request: &CaptureRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction> {
        self.request(Method::POST, "/payment/capture", Some(request), config)
            .await
    }

    async fn void_payment(
        &self,
        request: &VoidRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction> {
        self.request(Method::POST, "/payment/void", Some(request), config)
            .await
    }

    async fn refund_payment(
        &self,
        request: &RefundRequest,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction> {
        self.request(Method::POST, "/payment/refund", Some(request), config)
            .await
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
        config: &GatewayConfig,
    ) -> Result<RemoteTransaction> {
        let endpoint = format!("/payment/{}", urlencoding::encode(transaction_id));
        self.request::<(), _>(Method::GET, &endpoint, None, config)
            .await
    }
}
