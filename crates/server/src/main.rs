use std::sync::Arc;

use db::DBService;
use prefect_client::PrefectClient;
use server::{AppState, ServerConfig, config::ConfigError, routes};
use services::services::{StatusSnapshotService, TaskOrchestrator, TaskTileService};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Load environment variables from `.env` if present so local development
    // picks up engine credentials
    dotenv::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},prefect_client={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(&filter_string)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = Arc::new(ServerConfig::from_env()?);

    let db = DBService::new(&config.database_url).await?;

    let engine = Arc::new(PrefectClient::new(
        &config.prefect_api_url,
        config.prefect_api_key.clone(),
    ));

    let state = AppState {
        db: db.clone(),
        orchestrator: TaskOrchestrator::new(db.clone(), engine.clone()),
        snapshots: StatusSnapshotService::new(db.clone(), config.s3_host_url.clone()),
        tiles: TaskTileService::new(db, engine),
        config: config.clone(),
    };

    let app = routes::router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
