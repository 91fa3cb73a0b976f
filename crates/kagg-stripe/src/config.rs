//! Checkout Configuration
//!
//! Credentials and site settings are resolved once, at startup, and passed
//! into [`Checkout`](crate::Checkout). Nothing in the crate reads the
//! environment after that.

use std::time::Duration;

use reqwest::Url;

use crate::error::{CheckoutError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";
pub const DEFAULT_HOME_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Stripe operating mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    /// A `.test` host selects test mode, everything else is live
    pub fn from_host(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.ends_with(".test") {
            Self::Test
        } else {
            Self::Live
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishable/secret key pair
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub publishable_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(publishable_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn has_secret(&self) -> bool {
        !self.secret_key.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("publishable_key", &self.publishable_key)
            .field("secret_key", &if self.has_secret() { "***" } else { "" })
            .finish()
    }
}

/// Checkout service configuration
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Site base URL; its host decides test vs live
    pub home_url: Url,

    /// Mode derived from `home_url`
    pub environment: Environment,

    /// Keys for the selected mode
    pub credentials: Credentials,

    /// Provider API base, without trailing slash
    pub api_base: String,

    /// Outbound request timeout
    pub timeout: Duration,

    /// Key for anti-forgery tokens
    pub nonce_secret: String,

    /// Reject subscription checkouts without a price id before calling Stripe
    pub require_price_for_subscription: bool,
}

impl CheckoutConfig {
    /// Create a config for the given site; mode is taken from its host
    pub fn new(home_url: Url, credentials: Credentials) -> Self {
        let environment = Environment::from_host(home_url.host_str().unwrap_or_default());
        Self {
            home_url,
            environment,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            nonce_secret: uuid::Uuid::new_v4().simple().to_string(),
            require_price_for_subscription: false,
        }
    }

    /// Create from environment variables
    ///
    /// Both key pairs are read; only the one matching the site host is kept.
    pub fn from_env() -> Result<Self> {
        let home = env_or("KAGG_STRIPE_HOME_URL", DEFAULT_HOME_URL);
        let home_url = Url::parse(&home)
            .map_err(|e| CheckoutError::Config(format!("KAGG_STRIPE_HOME_URL: {e}")))?;
        let environment = Environment::from_host(home_url.host_str().unwrap_or_default());

        let prefix = match environment {
            Environment::Test => "KAGG_STRIPE_TEST",
            Environment::Live => "KAGG_STRIPE_LIVE",
        };
        let publishable_key = env_or(&format!("{prefix}_PUBLISHABLE_KEY"), "");
        let mut secret_key = env_or(&format!("{prefix}_SECRET_KEY"), "");
        if secret_key.is_empty() {
            secret_key = env_or("KAGG_STRIPE_SECRET_KEY", "");
        }

        let mut config = Self::new(home_url, Credentials::new(publishable_key, secret_key));
        config.api_base = env_or("KAGG_STRIPE_API_BASE", DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        if let Some(secs) = std::env::var("KAGG_STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        match std::env::var("KAGG_STRIPE_NONCE_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => config.nonce_secret = secret,
            _ => tracing::warn!(
                "KAGG_STRIPE_NONCE_SECRET not set - checkout forms will not survive a restart"
            ),
        }

        config.require_price_for_subscription =
            crate::sanitize::boolean(&env_or("KAGG_STRIPE_REQUIRE_PRICE", "false"));

        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_nonce_secret(mut self, secret: impl Into<String>) -> Self {
        self.nonce_secret = secret.into();
        self
    }

    pub const fn with_required_price(mut self, required: bool) -> Self {
        self.require_price_for_subscription = required;
        self
    }

    /// Whether a secret key is available for the selected mode
    pub fn is_configured(&self) -> bool {
        self.credentials.has_secret()
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
