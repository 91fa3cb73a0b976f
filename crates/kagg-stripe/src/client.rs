//! Stripe API Client
//!
//! A thin authenticated wrapper around the Stripe REST API. Requests are
//! form-encoded using Stripe's bracketed field names
//! (`line_items[0][price_data][currency]`), responses are decoded as JSON and
//! classified into a [`ProviderSession`] or a [`ProviderError`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::config::CheckoutConfig;
use crate::error::ProviderError;

pub const CHECKOUT_SESSIONS_ENDPOINT: &str = "checkout/sessions";

/// Ordered form body with bracketed field names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormBody(Vec<(String, String)>);

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.push((name.into(), value.to_string()));
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Checkout session as returned by the provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    /// Session ID (`cs_...`)
    pub id: String,

    /// Hosted checkout page; empty when the provider did not send one
    pub url: String,

    /// Full decoded response
    pub raw: Value,
}

impl ProviderSession {
    fn from_response(raw: Value) -> Self {
        let field = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: field("id"),
            url: field("url"),
            raw,
        }
    }
}

/// Payment provider abstraction
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a checkout session. One attempt, no retries.
    async fn create_checkout_session(
        &self,
        endpoint: &str,
        body: &FormBody,
    ) -> Result<ProviderSession, ProviderError>;
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client with the configured key, base and timeout
    pub fn new(config: &CheckoutConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transport {
                detail: e.to_string(),
            })?;

        Ok(Self {
            client,
            secret_key: config.credentials.secret_key.trim().to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, body), fields(fields = body.len()))]
    async fn create_checkout_session(
        &self,
        endpoint: &str,
        body: &FormBody,
    ) -> Result<ProviderSession, ProviderError> {
        if self.secret_key.is_empty() {
            error!("Stripe secret key is not configured");
            return Err(ProviderError::NoCredential);
        }

        let url = self.url(endpoint);
        debug!(url = %url, "Calling Stripe");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(body.fields())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Stripe API request failed");
                ProviderError::Transport {
                    detail: e.to_string(),
                }
            })?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read Stripe response");
            ProviderError::Transport {
                detail: e.to_string(),
            }
        })?;

        classify(status.as_u16(), raw_body)
    }
}

/// Decode a provider response. Unparseable bodies count as empty.
pub(crate) fn classify(status: u16, raw_body: String) -> Result<ProviderSession, ProviderError> {
    let json = serde_json::from_str::<Value>(&raw_body)
        .ok()
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()));

    match json {
        Some(json) if (200..300).contains(&status) => Ok(ProviderSession::from_response(json)),
        json => {
            let message = json
                .as_ref()
                .and_then(|v| v.pointer("/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("Stripe API error")
                .to_string();
            error!(status, message = %message, "Stripe API error");
            Err(ProviderError::Api {
                status,
                message,
                raw_body,
            })
        }
    }
}
