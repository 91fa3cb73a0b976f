//! Return-trip status notice
//!
//! Stripe sends the visitor back with `kagg_stripe_status` and `session_id`.
//! A non-error status is only trusted when a pending record for that exact
//! session id still exists; otherwise it is reported as a wrong payment id.

use tracing::{debug, warn};

use crate::checkout::{Checkout, MESSAGE_PARAM, SESSION_ID_PARAM, STATUS_PARAM};
use crate::error::CheckoutError;
use crate::html;
use crate::sanitize::Input;
use crate::store::{PendingSessionRecord, PendingSessions};

/// Resolved return-trip status
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    Canceled,
    Error(String),
    Unknown,
}

impl StatusOutcome {
    pub fn from_query(status: &str, msg: &str) -> Self {
        match status {
            "success" => Self::Success,
            "canceled" => Self::Canceled,
            "error" => Self::Error(msg.to_string()),
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Canceled => "canceled",
            Self::Error(_) => "error",
            Self::Unknown => "unknown",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success => "Payment succeeded.",
            Self::Canceled => "Payment canceled.",
            Self::Error(msg) => msg,
            Self::Unknown => "Unknown error.",
        }
    }
}

/// Everything known about a return visit, handed to hooks before rendering
#[derive(Clone, Debug, PartialEq)]
pub struct ResultReport {
    /// Pending record for the returned session id, if still stored
    pub record: Option<PendingSessionRecord>,
    pub outcome: StatusOutcome,
    pub session_id: String,
}

impl ResultReport {
    pub fn message(&self) -> &str {
        self.outcome.message()
    }
}

impl Checkout {
    /// Resolve the status carried by a return visit, `None` without a status
    pub async fn report_result(&self, query: &Input) -> Option<ResultReport> {
        if !query.contains(STATUS_PARAM) {
            return None;
        }

        let status = query.text(STATUS_PARAM);
        let msg = query.text(MESSAGE_PARAM);
        let session_id = query.text(SESSION_ID_PARAM);

        let record = match PendingSessions::new(self.store.as_ref()).find(&session_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, session_id = %session_id, "Pending session lookup failed");
                None
            }
        };

        let mut outcome = StatusOutcome::from_query(&status, &msg);
        if !matches!(outcome, StatusOutcome::Error(_)) {
            let matches = record
                .as_ref()
                .is_some_and(|r| r.session.id == session_id);
            if !matches {
                warn!(
                    session_id = %session_id,
                    status = %status,
                    "Return visit without matching session"
                );
                outcome = StatusOutcome::Error(CheckoutError::Integrity.user_message());
            }
        }

        debug!(status = outcome.as_str(), session_id = %session_id, "Resolved checkout result");
        Some(ResultReport {
            record,
            outcome,
            session_id,
        })
    }

    /// Notice markup for a return visit, `None` when the query carries no status
    pub async fn render_notice(&self, query: &Input) -> Option<String> {
        let report = self.report_result(query).await?;
        self.hooks.on_result(&report).await;
        Some(notice_markup(&report.outcome))
    }
}

/// Fixed-position notice box
pub fn notice_markup(outcome: &StatusOutcome) -> String {
    format!(
        concat!(
            r#"<div class="kagg-stripe-notice kagg-stripe-notice-{}" role="status" "#,
            r#"style="position:fixed; bottom:20px; left:20px; padding:10px 14px; "#,
            r#"background:#111; color:#fff; border-radius:6px; z-index:9999;">{}</div>"#,
        ),
        outcome.as_str(),
        html::escape(outcome.message()),
    )
}
