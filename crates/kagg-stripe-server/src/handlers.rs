//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;

use kagg_stripe::{ButtonAttributes, Input, SubmissionRequest, Url};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    pub stripe_configured: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.checkout.config();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mode: config.environment.as_str(),
        stripe_configured: config.is_configured(),
    })
}

/// Page with a checkout button built from the query string, plus the
/// return-trip notice when the query carries a status
pub async fn page(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    let query = Input::new(query);
    let attrs = ButtonAttributes::from_input(&query);
    let form_action = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let button = state.checkout.render_button(&attrs, form_action, None);
    let notice = state
        .checkout
        .render_notice(&query)
        .await
        .unwrap_or_default();

    Html(format!(
        concat!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\">",
            "<title>Checkout</title></head>\n<body>\n{}\n{}\n</body></html>\n",
        ),
        button, notice,
    ))
}

/// Checkout form submission
pub async fn submit(
    State(state): State<AppState>,
    uri: Uri,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let request = SubmissionRequest {
        method: Method::POST,
        input: Input::new(fields),
        current_url: current_url(state.checkout.config().home_url.clone(), &uri),
        user: None,
    };

    let outcome = state.checkout.handle_submission(&request).await;
    match outcome.location() {
        Some(location) => Redirect::to(location.as_str()).into_response(),
        None => (StatusCode::BAD_REQUEST, "Unsupported form action").into_response(),
    }
}

/// Absolute URL of the page being served, always on the site's own host
fn current_url(mut home: Url, uri: &Uri) -> Url {
    home.set_path(uri.path());
    home.set_query(uri.query());
    home.set_fragment(None);
    home
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_url_uses_request_path() {
        let home = Url::parse("http://shop.test/").unwrap();
        let uri: Uri = "/pay?amount=500".parse().unwrap();
        assert_eq!(
            current_url(home, &uri).as_str(),
            "http://shop.test/pay?amount=500"
        );
    }

    #[test]
    fn test_current_url_stays_on_site_host() {
        let home = Url::parse("http://shop.test/").unwrap();
        let uri: Uri = "//evil.example/x?a=1".parse().unwrap();
        let url = current_url(home, &uri);
        assert_eq!(url.host_str(), Some("shop.test"));
        assert_eq!(url.query(), Some("a=1"));
    }
}
