use anyhow::Result;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{s3_client::S3ObjectStore, storage_service::StorageService};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting store-gateway with config: {:?}", cfg);
    if let Some(path) = &cfg.config_file {
        tracing::info!("Loaded settings from {}", path.display());
    }

    // --- Connect to the object store, creating the bucket if needed ---
    let store = S3ObjectStore::connect(&cfg.s3).await?;
    tracing::info!(
        bucket = %cfg.s3.bucket,
        endpoint = %cfg.s3.endpoint,
        static_credentials = cfg.s3.has_static_credentials(),
        "Object store ready"
    );

    // --- Initialize core service ---
    let storage = StorageService::new(Arc::new(store));

    // --- Build router ---
    let app = routes::routes::app(storage);

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
