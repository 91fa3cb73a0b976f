//! # kagg-stripe
//!
//! Stripe Checkout (hosted) button for server-rendered pages.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  POST   ┌──────────────┐  302   ┌─────────────────┐
//! │  Page with   │────────▶│  Checkout::  │───────▶│  Stripe hosted  │
//! │  button form │         │  handle_     │        │  checkout page  │
//! └──────────────┘         │  submission  │        └────────┬────────┘
//!        ▲                 └──────┬───────┘                 │
//!        │    status=error&msg    │                         │
//!        └────────────────────────┘                         │
//!        ▲                                                  │
//!        │  kagg_stripe_status=success|canceled&session_id  │
//!        └──────────────────────────────────────────────────┘
//! ```
//!
//! The host application calls three methods and owns everything else
//! (routing, sessions, templates):
//!
//! - [`Checkout::render_button`] while rendering a page,
//! - [`Checkout::handle_submission`] on form POST,
//! - [`Checkout::render_notice`] on the return visit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kagg_stripe::{ButtonAttributes, Checkout, CheckoutConfig};
//!
//! let checkout = Checkout::from_config(CheckoutConfig::from_env()?)?;
//!
//! let form = checkout.render_button(&ButtonAttributes::default(), "/", None);
//! match checkout.handle_submission(&request).await {
//!     SubmissionOutcome::Ignored => { /* not ours */ }
//!     outcome => { /* redirect to outcome.location() */ }
//! }
//! ```

pub mod button;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod html;
pub mod nonce;
pub mod notice;
pub mod redirect;
pub mod sanitize;
pub mod store;

pub use button::ButtonAttributes;
pub use checkout::{
    Checkout, CheckoutMetadata, CheckoutMode, CheckoutRequest, CurrentUser, SubmissionOutcome,
    SubmissionRequest,
};
pub use client::{FormBody, PaymentProvider, ProviderSession, StripeClient};
pub use config::{CheckoutConfig, Credentials, Environment};
pub use error::{CheckoutError, ProviderError, Result, StoreError};
pub use hooks::{CheckoutHooks, NoHooks};
pub use nonce::{HmacNonce, NonceVerifier};
pub use notice::{ResultReport, StatusOutcome};
pub use redirect::RedirectPolicy;
pub use sanitize::Input;
pub use store::{MemoryTransientStore, PendingSessionRecord, TransientStore};

pub use reqwest::{Method, Url};
