use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use metastore_api::app::{app, AppState};
use metastore_api::config::{AppConfig, StoreBackend};
use metastore_api::permissions;
use metastore_api::services::ServiceContext;
use metastore_api::store;

#[derive(Parser)]
#[command(name = "metastore-api")]
#[command(about = "Metadata management API for databases, records and files")]
#[command(version)]
struct Args {
    #[arg(long, help = "Address to bind (overrides API_HOST)")]
    host: Option<String>,

    #[arg(long, help = "Port to listen on (overrides API_PORT)")]
    port: Option<u16>,

    #[arg(long, env = "METASTORE_CONFIG", help = "YAML config file layered over the environment preset")]
    config: Option<PathBuf>,

    #[arg(long, value_parser = ["memory", "postgres"], help = "Document store backend")]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    match args.backend.as_deref() {
        Some("memory") => config.store.backend = StoreBackend::Memory,
        Some("postgres") => config.store.backend = StoreBackend::Postgres,
        _ => {}
    }
    tracing::info!("Starting metastore-api in {:?} mode", config.environment);

    let store = store::connect(&config.store)
        .await
        .context("failed to connect to the document store")?;
    let gate = permissions::from_config(&config.permissions);
    let services = ServiceContext::new(store, gate, config.listing.clone());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(AppState::new(services, config)))
        .await
        .context("server error")?;
    Ok(())
}
