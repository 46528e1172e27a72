use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::{security::SecurityLayer, static_files};
use crate::infrastructure::settings::Settings;

/// Full application: API routes, health check and static files, wrapped in
/// request tracing and the transport security layer.
pub fn app(settings: &Settings, router: Router) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(router)
        .merge(static_files::router(settings))
        .layer(TraceLayer::new_for_http())
        .layer(SecurityLayer::new(settings))
}
