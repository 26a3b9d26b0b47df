use std::sync::Arc;

use squeeze_scanner::config::Config;
use squeeze_scanner::services::{ScanService, ScannerOptions, SqliteStore};
use squeeze_scanner::sources::{EastmoneyClient, ResilientSource};
use squeeze_scanner::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squeeze_scanner=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting squeeze scanner on {}:{}", config.host, config.port);

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Scan history at {}", config.database_path);

    let eastmoney = Arc::new(EastmoneyClient::new(
        config.fetch.quote_url.clone(),
        config.fetch.kline_url.clone(),
        config.fetch.timeout_secs,
    ));
    let source = Arc::new(ResilientSource::new(eastmoney, config.fetch.retry_policy()));

    let scanner = Arc::new(ScanService::new(
        source,
        store,
        ScannerOptions::from_config(&config),
    ));
    info!(
        "Scanner ready: {} workers, {} day lookback",
        config.scan_workers, config.fetch.lookback_days
    );

    let state = AppState {
        config: config.clone(),
        scanner,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = squeeze_scanner::app(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Squeeze scanner listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
