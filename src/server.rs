//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`]: three lifecycle operations under
//! `/api`, the static download page, and the infrastructure endpoints
//! (`/health`, `/metrics`, `/openapi.json`).

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::errors::generate_request_id;
use crate::handlers::files;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the Fadebox API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fadebox API",
        version = "0.1.0",
        description = "Ephemeral file-sharing backend with self-destructing downloads"
    ),
    paths(
        health_check,
        crate::handlers::files::upload_intent,
        crate::handlers::files::download_info,
        crate::handlers::files::sweep,
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Files", description = "Ephemeral file lifecycle operations"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Infrastructure endpoints.
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_spec))
        // Lifecycle operations.
        .route("/api/upload-intent", post(files::upload_intent))
        .route("/api/download-info/:id", get(files::download_info))
        .route("/api/sweep", post(files::sweep))
        // Static presentation page; not a lifecycle operation.
        .route("/download/:id", get(files::download_page))
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        // common_headers_middleware adds standard response headers.
        .layer(middleware::from_fn(common_headers_middleware))
        // The API is called from static pages and uploads go cross-origin
        // straight to the object store, so CORS stays permissive.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `Fadebox`
async fn common_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Only set x-request-id if not already present (the error renderer may
    // set it).
    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    // Always overwrite Date and Server to ensure consistency.
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("Fadebox"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- OpenAPI endpoint --------------------------------------------------------

/// `GET /openapi.json` -- Serve the OpenAPI document.
async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------
