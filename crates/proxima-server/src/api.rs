//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `devices` - Scanner ingestion, device snapshot and priority flags
//! - `notifications` - Notifier events and the notification log
//! - `system` - Aggregate statistics and diagnostics
//! - `health` - Service health checks
//! - `realtime` - WebSocket channel for viewers
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use std::any::Any;

use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod devices;
pub mod error;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod realtime;
pub mod system;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health            - Health check
/// /status            - Diagnostics
/// /system-stats      - Aggregate statistics
/// /devices           - Scanner submissions (POST) and snapshot (GET)
/// /priority-devices  - Priority addresses
/// /set-priority      - Priority toggle
/// /notifications     - Notifier submissions, history, clear
/// /ws                - Real-time channel
/// /openapi.json      - OpenAPI specification
/// /swagger-ui        - API browser
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(system::router())
        .merge(devices::router())
        .merge(notifications::router())
        .merge(realtime::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi::ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

/// Turn a handler panic into the standard JSON 500 body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::internal(format!("handler panicked: {details}")).into_response()
}
