//! Allowlist server - Entry point.

use allowlist_server::{
    api::{create_router, AppState},
    config::{Config, StoreBackend, StoreConfig},
    gate::{AdmissionGate, AdmissionPolicy},
    registry::{MemoryStore, RestStore, Store},
    verification::TargetResolver,
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use social_graph_client::{SocialGraph, SocialGraphClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: Config) -> Result<()> {
    info!(phase = %config.allowlist.phase, cap = config.allowlist.cap, "Starting allowlist server");

    let store = open_store(&config.store).await?;
    info!(backend = store.backend_name(), "Registration store ready");

    let social_graph: Option<Arc<dyn SocialGraph>> = match &config.social_graph.api_key {
        Some(key) => {
            let client = SocialGraphClient::new(
                key.expose_secret().as_str(),
                config.social_graph.api_url.as_str(),
                config.social_graph.timeout,
            )
            .context("Failed to create social graph client")?;
            Some(Arc::new(client))
        }
        None => {
            warn!("SOCIAL_GRAPH__API_KEY not set, verify endpoints will fail");
            None
        }
    };

    let gate = AdmissionGate::new(
        Arc::new(store),
        AdmissionPolicy {
            min_score: config.allowlist.min_score,
            cap: config.allowlist.cap,
            phase: config.allowlist.phase.clone(),
        },
    );

    let targets = TargetResolver::new(
        config.allowlist.target_fid,
        config.allowlist.target_username.clone(),
        config.allowlist.target_cache_ttl,
    );

    let app = create_router(AppState::new(gate, social_graph, targets));

    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")
}

async fn open_store(config: &StoreConfig) -> Result<Store> {
    match config.backend {
        StoreBackend::Memory => match &config.snapshot_path {
            Some(path) => {
                let store = MemoryStore::open(path.clone())
                    .await
                    .with_context(|| format!("Failed to open snapshot {:?}", path))?;
                Ok(Store::Memory(store))
            }
            None => {
                info!("No snapshot path, registrations will not survive restart");
                Ok(Store::memory())
            }
        },
        StoreBackend::Rest => {
            let url = config
                .rest_url
                .as_deref()
                .context("STORE__REST_URL is required for the rest backend")?;
            let key = config
                .service_key
                .clone()
                .context("STORE__SERVICE_KEY is required for the rest backend")?;

            let store = RestStore::new(url, config.table.as_str(), key, config.timeout)
                .context("Failed to create REST store")?;
            Ok(Store::Rest(store))
        }
    }
}
