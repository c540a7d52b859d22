//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    // `/` lists; per-key verbs there have no key to act on
    let root: MethodRouter<Arc<AppState>> = get(handlers::list_keys)
        .head(handlers::empty_key)
        .put(handlers::empty_key)
        .post(handlers::empty_key)
        .delete(handlers::empty_key)
        .fallback(handlers::method_not_allowed);

    let object: MethodRouter<Arc<AppState>> = get(handlers::fetch_object)
        .head(handlers::object_exists)
        .put(handlers::store_object)
        .post(handlers::store_object)
        .delete(handlers::delete_object)
        .fallback(handlers::method_not_allowed);

    let router = Router::new()
        .route("/", root)
        .route("/{*key}", object)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let router = if state.config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
