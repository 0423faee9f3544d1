// Keyflow API Server
// Mediates grant/revoke requests against the upstream access-control server
// and keeps the audit log of access sessions.

mod config;
mod handlers;
mod routes;

use config::Config;
use dotenvy::dotenv;
use keyflow_access::{AccessService, UpstreamGateway};
use keyflow_database::AccessLogRepository;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub access_service: AccessService,
    pub access_log: AccessLogRepository,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,keyflow_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("🚀 Starting Keyflow API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env();
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    // Initialize database
    tracing::info!("🗄️  Connecting to database...");
    let database = keyflow_database::Database::new(config.database.clone())
        .await
        .expect("Failed to connect to database");
    database.migrate().await.expect("Database migration failed");
    database.ping().await.expect("Database ping failed");
    tracing::info!("✅ Database connected");

    // Audit-log repository
    let access_log = AccessLogRepository::new(database.pool().clone());

    // Upstream gateway client
    let gateway = UpstreamGateway::new(config.gateway.clone())
        .expect("Failed to initialize upstream gateway");
    tracing::info!("🔑 Upstream gateway initialized: {}", config.gateway.base_url);

    // Access workflow service
    let access_service = AccessService::new(Arc::new(gateway), Arc::new(access_log.clone()));
    tracing::info!("🚪 Access service initialized");

    // Create app state
    let state = Arc::new(AppState {
        access_service,
        access_log,
    });

    // Create router
    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("📡 Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   POST /access_control/grant-access");
    tracing::info!("   POST /access_control/revoke-access");
    tracing::info!("   GET  /access_control/access-log");

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app).await.expect("Server error");

    Ok(())
}
