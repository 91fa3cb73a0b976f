//! Stripe Checkout Orchestration
//!
//! Handles the checkout form POST:
//!
//! ```text
//! Idle ─▶ Validating ─▶ Requesting ─▶ Persisted ─▶ Redirected (hosted page)
//!              │             │
//!              └──────┬──────┘
//!                     ▼
//!                 Aborted ─▶ Redirected (current page, status=error)
//! ```
//!
//! Every path ends in a redirect. Nothing is retried.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::client::{
    CHECKOUT_SESSIONS_ENDPOINT, FormBody, PaymentProvider, ProviderSession, StripeClient,
};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::hooks::{CheckoutHooks, NoHooks};
use crate::nonce::{CHECKOUT_ACTION, HmacNonce, NonceVerifier};
use crate::redirect::{RedirectPolicy, STRIPE_CHECKOUT_HOST};
use crate::sanitize::{DEFAULT_DESCRIPTION, DEFAULT_MODE, Input};
use crate::store::{MemoryTransientStore, PendingSessionRecord, PendingSessions, TransientStore};

/// Query parameter carrying the return-trip status
pub const STATUS_PARAM: &str = "kagg_stripe_status";
pub const MESSAGE_PARAM: &str = "msg";
pub const SESSION_ID_PARAM: &str = "session_id";

/// Placeholder Stripe replaces with the real session id
const SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

/// Metadata marker for visitors who are not logged in
pub const GUEST_USER: &str = "guest";

/// Authenticated visitor, as known to the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// Identifier used for nonces and metadata; guests share one
pub fn user_key(user: Option<&CurrentUser>) -> &str {
    user.map_or(GUEST_USER, |u| u.id.as_str())
}

/// Checkout session mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(Self::Payment),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
        }
    }
}

/// Validated checkout submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub mode: CheckoutMode,

    /// Stripe price, used in subscription mode
    pub price_id: String,

    /// Used in payment mode; always >= 1 there
    pub amount_cents: i64,

    pub currency: String,

    /// Product name, used in payment mode
    pub description: String,

    /// Taken from the logged-in user, never from the form
    pub customer_email: Option<String>,
}

/// Session metadata sent to Stripe as `metadata[key]`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata(BTreeMap<String, String>);

impl CheckoutMetadata {
    pub fn for_user(user: Option<&CurrentUser>) -> Self {
        let mut metadata = Self::default();
        metadata.insert("user_id", user_key(user));
        metadata
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Incoming form submission as seen by the host
#[derive(Clone, Debug)]
pub struct SubmissionRequest {
    pub method: Method,

    /// Raw form fields
    pub input: Input,

    /// Page the form was submitted from
    pub current_url: Url,

    pub user: Option<CurrentUser>,
}

/// Result of [`Checkout::handle_submission`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Not a checkout submission; the host carries on
    Ignored,

    /// Session created; send the browser to Stripe
    Hosted { location: Url, session_id: String },

    /// Rejected; send the browser back with an error notice
    Aborted { location: Url, message: String },
}

impl SubmissionOutcome {
    pub const fn location(&self) -> Option<&Url> {
        match self {
            Self::Ignored => None,
            Self::Hosted { location, .. } | Self::Aborted { location, .. } => Some(location),
        }
    }
}

/// Checkout service: button, submission and return notice
pub struct Checkout {
    pub(crate) config: CheckoutConfig,
    pub(crate) provider: Arc<dyn PaymentProvider>,
    pub(crate) store: Arc<dyn TransientStore>,
    pub(crate) nonces: Arc<dyn NonceVerifier>,
    pub(crate) hooks: Arc<dyn CheckoutHooks>,
    pub(crate) redirects: RedirectPolicy,
}

impl Checkout {
    pub fn new(
        config: CheckoutConfig,
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn TransientStore>,
    ) -> Self {
        Self {
            nonces: Arc::new(HmacNonce::new(&config.nonce_secret)),
            hooks: Arc::new(NoHooks),
            redirects: RedirectPolicy::new(config.home_url.clone()),
            config,
            provider,
            store,
        }
    }

    /// Stripe client and in-memory store built from `config`
    pub fn from_config(config: CheckoutConfig) -> Result<Self> {
        let provider = StripeClient::new(&config)?;
        Ok(Self::new(
            config,
            Arc::new(provider),
            Arc::new(MemoryTransientStore::new()),
        ))
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CheckoutHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_nonces(mut self, nonces: Arc<dyn NonceVerifier>) -> Self {
        self.nonces = nonces;
        self
    }

    pub const fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Token to embed in a checkout form for `user`
    pub fn nonce_for(&self, user: Option<&CurrentUser>) -> String {
        self.nonces.issue(CHECKOUT_ACTION, user_key(user))
    }

    /// Handle a form POST; anything that is not a checkout submission is ignored
    pub async fn handle_submission(&self, request: &SubmissionRequest) -> SubmissionOutcome {
        if request.method != Method::POST || request.input.text("action") != CHECKOUT_ACTION {
            return SubmissionOutcome::Ignored;
        }

        let mut current = without_status_params(&request.current_url);
        if !self.redirects.is_allowed(&current, None) {
            warn!(url = %current, "Submission page is off-site, returning to home");
            current = self.config.home_url.clone();
        }

        match self.create_session(request, &current).await {
            Ok((session, location)) => {
                info!(session_id = %session.id, "Redirecting to Stripe Checkout");
                SubmissionOutcome::Hosted {
                    location,
                    session_id: session.id,
                }
            }
            Err(e) => {
                if e.is_operator_error() {
                    error!(error = %e, "Checkout failed");
                } else {
                    warn!(error = %e, "Checkout rejected");
                }
                let message = e.user_message();
                let location = self.redirects.safe(error_url(&current, &message).as_str());
                SubmissionOutcome::Aborted { location, message }
            }
        }
    }

    async fn create_session(
        &self,
        request: &SubmissionRequest,
        current: &Url,
    ) -> Result<(ProviderSession, Url)> {
        let checkout = self.validate(request)?;

        let mut metadata = CheckoutMetadata::for_user(request.user.as_ref());
        self.hooks
            .augment_metadata(&mut metadata, &checkout, request.user.as_ref());

        let body = build_body(&checkout, &metadata, current);
        let session = self
            .provider
            .create_checkout_session(CHECKOUT_SESSIONS_ENDPOINT, &body)
            .await?;

        if session.id.is_empty() {
            return Err(CheckoutError::UnexpectedResponse);
        }
        let location = Url::parse(&session.url)
            .ok()
            .filter(|url| self.redirects.is_allowed(url, Some(STRIPE_CHECKOUT_HOST)))
            .ok_or_else(|| {
                error!(url = %session.url, "Stripe returned an unexpected checkout URL");
                CheckoutError::UnexpectedResponse
            })?;

        let record = PendingSessionRecord {
            request_body: body,
            session,
        };
        PendingSessions::new(self.store.as_ref()).save(&record).await?;

        Ok((record.session, location))
    }

    fn validate(&self, request: &SubmissionRequest) -> Result<CheckoutRequest> {
        let input = &request.input;
        let user = request.user.as_ref();

        let token = input.text("_wpnonce");
        if token.is_empty() || !self.nonces.verify(&token, CHECKOUT_ACTION, user_key(user)) {
            return Err(CheckoutError::validation("_wpnonce", "Invalid nonce."));
        }

        let mode = CheckoutMode::parse(&input.text_or("mode", DEFAULT_MODE)).ok_or_else(|| {
            CheckoutError::validation(
                "mode",
                r#"Payment mode must be "payment" or "subscription"."#,
            )
        })?;

        let amount_cents = input.integer("amount");
        if mode == CheckoutMode::Payment && amount_cents < 1 {
            return Err(CheckoutError::validation("amount", "Amount must be >= 1 cent."));
        }

        let price_id = input.text("price");
        if mode == CheckoutMode::Subscription
            && price_id.is_empty()
            && self.config.require_price_for_subscription
        {
            return Err(CheckoutError::validation(
                "price",
                "Price ID is required for subscription mode.",
            ));
        }

        Ok(CheckoutRequest {
            mode,
            price_id,
            amount_cents,
            currency: input.currency("currency"),
            description: input.text_or("description", DEFAULT_DESCRIPTION),
            customer_email: user
                .and_then(|u| u.email.clone())
                .filter(|e| !e.trim().is_empty()),
        })
    }
}

/// Stripe form body for a validated request
pub fn build_body(
    request: &CheckoutRequest,
    metadata: &CheckoutMetadata,
    current: &Url,
) -> FormBody {
    let mut body = FormBody::new();
    body.push("payment_method_types[0]", "card");
    body.push("mode", request.mode.as_str());

    match request.mode {
        CheckoutMode::Payment => {
            body.push("line_items[0][price_data][currency]", &request.currency);
            body.push("line_items[0][price_data][unit_amount]", request.amount_cents);
            body.push(
                "line_items[0][price_data][product_data][name]",
                &request.description,
            );
        }
        CheckoutMode::Subscription => {
            body.push("line_items[0][price]", &request.price_id);
        }
    }
    body.push("line_items[0][quantity]", 1);

    body.push("success_url", return_url(current, "success"));
    body.push("cancel_url", return_url(current, "canceled"));

    if let Some(email) = &request.customer_email {
        body.push("customer_email", email);
    }
    for (key, value) in metadata.iter() {
        body.push(format!("metadata[{key}]"), value);
    }

    body
}

/// `current` with any previous return-trip parameters and fragment removed
pub fn without_status_params(current: &Url) -> Url {
    let mut url = current.clone();
    url.set_fragment(None);

    let kept: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(k, _)| !matches!(k.as_ref(), STATUS_PARAM | MESSAGE_PARAM | SESSION_ID_PARAM))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// Return URL for Stripe; the session id placeholder must stay unencoded
fn return_url(current: &Url, status: &str) -> String {
    let mut url = current.clone();
    url.query_pairs_mut().append_pair(STATUS_PARAM, status);
    format!("{url}&{SESSION_ID_PARAM}={SESSION_ID_TEMPLATE}")
}

fn error_url(current: &Url, message: &str) -> Url {
    let mut url = current.clone();
    url.query_pairs_mut()
        .append_pair(STATUS_PARAM, "error")
        .append_pair(MESSAGE_PARAM, message);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://shop.test/pay?amount=500").unwrap()
    }

    fn payment_request() -> CheckoutRequest {
        CheckoutRequest {
            mode: CheckoutMode::Payment,
            price_id: String::new(),
            amount_cents: 500,
            currency: "usd".into(),
            description: "Consulting".into(),
            customer_email: Some("buyer@example.com".into()),
        }
    }

    #[test]
    fn test_checkout_mode_parse() {
        assert_eq!(CheckoutMode::parse("payment"), Some(CheckoutMode::Payment));
        assert_eq!(CheckoutMode::parse("subscription"), Some(CheckoutMode::Subscription));
        assert_eq!(CheckoutMode::parse("setup"), None);
        assert_eq!(CheckoutMode::parse(""), None);
    }

    #[test]
    fn test_payment_body() {
        let metadata = CheckoutMetadata::for_user(None);
        let body = build_body(&payment_request(), &metadata, &page());

        assert_eq!(body.get("payment_method_types[0]"), Some("card"));
        assert_eq!(body.get("mode"), Some("payment"));
        assert_eq!(body.get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(body.get("line_items[0][price_data][unit_amount]"), Some("500"));
        assert_eq!(
            body.get("line_items[0][price_data][product_data][name]"),
            Some("Consulting")
        );
        assert_eq!(body.get("line_items[0][quantity]"), Some("1"));
        assert_eq!(body.get("line_items[0][price]"), None);
        assert_eq!(body.get("customer_email"), Some("buyer@example.com"));
        assert_eq!(body.get("metadata[user_id]"), Some(GUEST_USER));
        assert_eq!(
            body.get("success_url"),
            Some("https://shop.test/pay?amount=500&kagg_stripe_status=success&session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(
            body.get("cancel_url"),
            Some("https://shop.test/pay?amount=500&kagg_stripe_status=canceled&session_id={CHECKOUT_SESSION_ID}")
        );
    }

    #[test]
    fn test_subscription_body_references_price() {
        let request = CheckoutRequest {
            mode: CheckoutMode::Subscription,
            price_id: "price_123".into(),
            customer_email: None,
            ..payment_request()
        };
        let user = CurrentUser::new("7", None);
        let body = build_body(&request, &CheckoutMetadata::for_user(Some(&user)), &page());

        assert_eq!(body.get("mode"), Some("subscription"));
        assert_eq!(body.get("line_items[0][price]"), Some("price_123"));
        assert_eq!(body.get("line_items[0][price_data][currency]"), None);
        assert_eq!(body.get("customer_email"), None);
        assert_eq!(body.get("metadata[user_id]"), Some("7"));
    }

    #[test]
    fn test_stale_status_params_stripped() {
        let url = Url::parse(
            "https://shop.test/pay?amount=5&kagg_stripe_status=error&msg=x&session_id=cs_1#top",
        )
        .unwrap();
        assert_eq!(without_status_params(&url).as_str(), "https://shop.test/pay?amount=5");

        let url = Url::parse("https://shop.test/pay?kagg_stripe_status=success").unwrap();
        assert_eq!(without_status_params(&url).as_str(), "https://shop.test/pay");
    }

    #[test]
    fn test_error_url_encodes_message() {
        let url = error_url(&page(), "Amount must be >= 1 cent.");
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[STATUS_PARAM], "error");
        assert_eq!(pairs[MESSAGE_PARAM], "Amount must be >= 1 cent.");
        assert!(!url.as_str().contains(' '));
    }
}
