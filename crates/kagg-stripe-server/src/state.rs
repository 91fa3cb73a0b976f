//! Application State

use std::sync::Arc;

use kagg_stripe::Checkout;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout service (button, submission, notice)
    pub checkout: Arc<Checkout>,
}

impl AppState {
    pub fn new(checkout: Checkout) -> Self {
        Self {
            checkout: Arc::new(checkout),
        }
    }
}
