//! 路由模块

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use common::config::CorsSettings;
use common::middleware::request_id_middleware;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::handlers;
use crate::state::AppState;
use crate::ApiDoc;

/// Builds the complete application router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);
    let favicon = ServeFile::new(state.config.static_dir.join("favicon.ico"));
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health_check))
        .route("/transactions", get(handlers::get_transactions).layer(cors))
        .route_service("/favicon.ico", favicon)
        .nest_service("/static", static_files)
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for `/transactions`.
pub fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if settings.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
