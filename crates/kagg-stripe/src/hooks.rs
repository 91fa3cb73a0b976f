//! Extension points for the host application.

use async_trait::async_trait;

use crate::checkout::{CheckoutMetadata, CheckoutRequest, CurrentUser};
use crate::notice::ResultReport;

/// Host callbacks invoked during checkout. Every method defaults to a no-op.
#[async_trait]
pub trait CheckoutHooks: Send + Sync {
    /// Add or change metadata before the session is created
    fn augment_metadata(
        &self,
        _metadata: &mut CheckoutMetadata,
        _request: &CheckoutRequest,
        _user: Option<&CurrentUser>,
    ) {
    }

    /// Called with the resolved return-trip outcome before the notice renders
    async fn on_result(&self, _report: &ResultReport) {}
}

/// Hooks that do nothing
pub struct NoHooks;

impl CheckoutHooks for NoHooks {}
