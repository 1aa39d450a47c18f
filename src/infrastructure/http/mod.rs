use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::controllers::{feed::FeedController, health};
use crate::infrastructure::auth::{auth_middleware, request_id_middleware};
use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;

/// Assemble the application router. Split from server startup so tests can
/// serve it on an ephemeral port with their own store behind the service.
pub fn build_router(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    feed_controller: Arc<FeedController>,
) -> Router {
    // Feed routes (require authentication)
    let feed_routes = Router::new()
        .route(
            "/api/feeds/aggregate",
            post(FeedController::aggregate_feeds),
        )
        .with_state(feed_controller)
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(pool)
        .merge(feed_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    feed_controller: Arc<FeedController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(pool, config.clone(), feed_controller);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
