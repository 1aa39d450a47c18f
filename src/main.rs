use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groupfeed_backend::controllers::feed::FeedController;
use groupfeed_backend::domain::feed::FeedService;
use groupfeed_backend::infrastructure::config::{Config, LogFormat};
use groupfeed_backend::infrastructure::db::{check_connection, create_pool};
use groupfeed_backend::infrastructure::http::start_http_server;
use groupfeed_backend::infrastructure::store::PostgresDocumentStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting groupfeed backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Verify database connection
    check_connection(&pool).await?;
    tracing::info!("Database connection verified");

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // 1. Instantiate the document-store adapter (inject db pool)
    let store = Arc::new(PostgresDocumentStore::new(pool.clone()));
    store.ensure_schema().await?;
    tracing::info!("Document store schema ensured");

    // 2. Instantiate services (inject store)
    let feed_service = Arc::new(FeedService::new(store));

    // 3. Instantiate controllers (inject services)
    let feed_controller = Arc::new(FeedController::new(feed_service));

    // Start HTTP server with all routes
    start_http_server(pool, config, feed_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "groupfeed_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "groupfeed_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
