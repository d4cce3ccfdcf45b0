//! HTTP surface: routing, CORS and authentication.

mod auth;
mod handlers;

pub use auth::{authorize, constant_time_eq};
pub use handlers::AppState;

use crate::verify::engine::VerificationEngine;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Header set allowed on cross-origin requests.
const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type, x-api-key";

/// Build the service router.
#[must_use]
pub fn router(engine: VerificationEngine) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/verify-business", post(handlers::verify_business))
        .route("/verify-business-batch", post(handlers::verify_business_batch))
        .route("/healthz", get(handlers::healthz))
        .layer(middleware::from_fn(catch_panics))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Turn handler panics into a generic 500 instead of a dropped connection.
async fn catch_panics(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("request handler panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

/// Reflect the caller's origin and answer preflights.
async fn cors(request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response, origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, origin);
    response
}

fn apply_cors_headers(response: &mut Response, origin: Option<HeaderValue>) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        origin.unwrap_or_else(|| HeaderValue::from_static("*")),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
}
