use courier_service::{
    config, db, error, logging,
    routes,
    services::file_storage::FileStorage,
    state::AppState,
    websocket::{pubsub, ConnectionRegistry},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Treat migration failures as fatal - the schema must be in sync
    db::run_migrations(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    let redis = redis::Client::open(cfg.redis_url.clone())
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;

    let registry = ConnectionRegistry::new();

    let storage = match cfg.storage.as_ref() {
        Some(storage_cfg) => Some(Arc::new(FileStorage::from_config(storage_cfg).await)),
        None => {
            tracing::warn!("attachment storage not configured; file uploads disabled");
            None
        }
    };

    // Cross-instance change-feed fanout
    let psub_client = redis.clone();
    let psub_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = pubsub::start_psub_listener(psub_client, psub_registry).await {
            tracing::error!(error = %e, "redis pubsub listener failed");
        }
    });

    let state = AppState {
        db,
        registry,
        redis,
        config: cfg.clone(),
        storage,
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting courier-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    axum::serve(listener, routes::build_router(state))
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))
}
