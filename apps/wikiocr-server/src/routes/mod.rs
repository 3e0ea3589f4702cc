//! Route modules for the WikiOCR server

pub mod health;
pub mod process;

use axum::{http::HeaderValue, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().server.cors_origin);

    Router::new()
        .merge(health::router())
        .merge(process::router(state.config().max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Single credentialed origin; methods and headers are mirrored back
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(AllowOrigin::list([value])),
        Err(e) => {
            tracing::warn!(
                "Invalid CORS origin '{}': {}. Cross-origin requests will be refused",
                origin,
                e
            );
            layer
        }
    }
}
