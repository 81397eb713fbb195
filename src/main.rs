use anyhow::{Context, Result, bail};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, Backend};
use services::{
    local_store::LocalStore, memory_store::MemoryStore, readiness::ReadinessProber,
    signer::UrlSigner, storage::StorageGateway,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_tracing(cfg.verbose)?;
    tracing::info!("Starting object-proxy with config: {:?}", cfg);

    // --- Storage backend ---
    let storage: Arc<dyn StorageGateway> = match cfg.backend {
        Backend::Local => {
            let store = LocalStore::connect(&cfg.database_url, &cfg.storage_dir)
                .await
                .with_context(|| format!("opening local store at {}", cfg.database_url))?;
            store.migrate().await.context("applying database schema")?;
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(());
            }
            for bucket in &cfg.buckets {
                store
                    .ensure_bucket(bucket)
                    .await
                    .with_context(|| format!("creating bucket {}", bucket))?;
            }
            Arc::new(store)
        }
        Backend::Memory => {
            if migrate {
                bail!("--migrate only applies to the local backend");
            }
            let store = MemoryStore::new();
            for bucket in &cfg.buckets {
                store.ensure_bucket(bucket);
            }
            Arc::new(store)
        }
    };
    if !cfg.buckets.is_empty() {
        tracing::info!("Provisioned buckets: {}", cfg.buckets.join(", "));
    }

    // --- Signed URL mode ---
    let signer = if cfg.signed_urls {
        let Some(path) = cfg.credentials.as_ref() else {
            bail!("signed URL mode requires a credentials key file");
        };
        let signer = UrlSigner::from_key_file(path, &cfg.signing_endpoint, cfg.signed_url_ttl)
            .context("loading signing key")?;
        tracing::info!("Signed URL mode enabled: {:?}", signer);
        Some(signer)
    } else {
        None
    };

    // --- Readiness ---
    let prober = ReadinessProber::new(
        Arc::clone(&storage),
        cfg.readiness_buckets.clone(),
        cfg.readiness_timeout,
    );
    if prober.buckets().is_empty() {
        tracing::warn!("No readiness buckets configured; /readiness will report 503");
    }

    // --- Build router ---
    let mut app: Router = routes::routes::routes().with_state(AppState::new(storage, signer, prober));
    if cfg.verbose {
        app = app.layer(TraceLayer::new_for_http());
    }

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

/// `RUST_LOG` wins when set; otherwise `--verbose` turns on debug output and the access log.
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::try_new("object_proxy=debug,tower_http=debug")?
    } else {
        EnvFilter::try_new("object_proxy=info")?
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
