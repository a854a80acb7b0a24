//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (unauthenticated for load balancer probes)
        .route("/v1/health", get(handlers::health_check))
        // Users
        .route("/v1/users/register", post(handlers::register_user))
        .route("/v1/users/login", post(handlers::login))
        .route("/v1/users/me", get(handlers::current_user))
        // Files
        .route(
            "/v1/files",
            put(handlers::upload_file).get(handlers::list_files),
        )
        .route(
            "/v1/files/{hash}",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/v1/files/{hash}/download", get(handlers::download_file))
        .route("/v1/download", get(handlers::download_by_path))
        // Chunks
        .route("/v1/chunks", get(handlers::list_chunks))
        .route("/v1/chunks/{hash}", get(handlers::get_chunk))
        .route("/v1/chunks/{hash}/download", get(handlers::download_chunk))
        // Storage administration
        .route(
            "/v1/storages",
            get(handlers::list_storages).post(handlers::register_storage),
        )
        .route(
            "/v1/storages/{name}/enable",
            post(handlers::enable_storage),
        )
        .route(
            "/v1/storages/{name}/disable",
            post(handlers::disable_storage),
        )
        // Settings
        .route("/v1/config/{key}", put(handlers::set_setting));

    let mut router = Router::new().merge(api_routes);

    // When enabled, restrict /metrics to the scraper at the network level.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let server = &state.config.server;
    let body_limit = usize::try_from(server.max_upload_bytes).unwrap_or(usize::MAX);
    let timeout = server.request_timeout();

    // Layers run outermost first: trace, timeout, body limit, auth, handler.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
