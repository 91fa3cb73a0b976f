//! kagg-stripe HTTP Server
//!
//! Axum host for the checkout button: renders pages with the button and
//! return notice, accepts the form POST and redirects to Stripe.

mod handlers;
mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kagg_stripe::{Checkout, CheckoutConfig};

use crate::handlers::{health_check, page, submit};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = CheckoutConfig::from_env()?;
    if config.is_configured() {
        tracing::info!(mode = %config.environment, "Stripe configured");
    } else {
        tracing::warn!(
            mode = %config.environment,
            "Stripe secret key not set - checkouts will fail"
        );
        tracing::warn!(
            "  Set KAGG_STRIPE_{}_SECRET_KEY in .env",
            config.environment.as_str().to_uppercase()
        );
    }
    let home_url = config.home_url.clone();

    let state = AppState::new(Checkout::from_config(config)?);
    let app = app(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("kagg-stripe server listening on http://{} (site {})", addr, home_url);
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  GET  /*      - Page with checkout button and status notice");
    tracing::info!("  POST /*      - Checkout form submission");

    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(page).post(submit))
        .route("/{*path}", get(page).post(submit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use kagg_stripe::{Credentials, Url};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = CheckoutConfig::new(
            Url::parse("http://shop.test/").unwrap(),
            Credentials::default(),
        )
        .with_nonce_secret("nonce-secret");
        app(AppState::new(Checkout::from_config(config).unwrap()))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["mode"], "test");
        assert_eq!(json["stripe_configured"], false);
    }

    #[tokio::test]
    async fn test_page_renders_button_from_query() {
        let response = test_app()
            .oneshot(
                Request::get("/pay?amount=750&custom_amount=true&label=Donate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains(
            r#"<input type="number" min="1" step="1" name="amount" value="750" required />"#
        ));
        assert!(html.contains(r#"<button type="submit">Donate</button>"#));
        assert!(html.contains(r#"name="_wpnonce""#));
        assert!(!html.contains("kagg-stripe-notice"));
    }

    #[tokio::test]
    async fn test_page_rejects_forged_success() {
        let response = test_app()
            .oneshot(
                Request::get("/pay?kagg_stripe_status=success&session_id=cs_999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let html = body_text(response).await;
        assert!(html.contains("Wrong payment id."));
        assert!(!html.contains("Payment succeeded."));
    }

    #[tokio::test]
    async fn test_invalid_nonce_redirects_back_with_error() {
        let response = test_app()
            .oneshot(form_post(
                "/pay?amount=500",
                "action=kagg_create_checkout&_wpnonce=bad&amount=500",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(
            location,
            "http://shop.test/pay?amount=500&kagg_stripe_status=error&msg=Invalid+nonce."
        );
    }

    #[tokio::test]
    async fn test_unrelated_post_is_rejected() {
        let response = test_app()
            .oneshot(form_post("/", "action=something_else"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
