use anyhow::Result;
use axum::Router;
use object_store_fs::{
    config,
    routes,
    services::{storage_service::StorageService, visibility_cache::VisibilityCache},
};
use std::{fs, io::ErrorKind};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting object-store-fs with config: {:?}", cfg);

    // --- Storage root ---
    let storage_dir = &cfg.storage.storage_dir;
    if cfg.create_storage_dir && !storage_dir.exists() {
        fs::create_dir_all(storage_dir)?;
        tracing::info!("Created storage directory at {}", storage_dir.display());
    }

    // --- Initialize core service ---
    let visibility = VisibilityCache::new(
        cfg.storage.visibility_cache_capacity,
        cfg.storage.visibility_cache_ttl,
    );
    let storage = StorageService::new(cfg.storage.clone(), visibility);

    match storage.root_diagnostics() {
        Ok(diag) if diag.is_directory => tracing::info!("Storage root: {}", diag),
        Ok(diag) => tracing::warn!(
            "Storage root unusable, bucket operations will fail: {}",
            diag
        ),
        Err(err) => tracing::warn!("Could not inspect storage root: {}", err),
    }

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(storage);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
