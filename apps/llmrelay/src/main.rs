use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use llmrelay_core::{CliArgs, RelayEngine};
use llmrelay_storage::{SeaOrmStorage, StorageBus, StorageBusConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let database_url = args.database_url.clone();
    let loaded = llmrelay_core::load(args).context("loading config")?;

    let storage = SeaOrmStorage::connect(&database_url)
        .await
        .context("connecting to request_log database")?;
    storage.sync().await.context("syncing request_log schema")?;
    let bus = StorageBus::spawn(storage, StorageBusConfig::default());

    let client = llmrelay_core::build_client().context("building upstream http client")?;
    let engine = Arc::new(RelayEngine::new(loaded.providers, bus, client, loaded.global.clone()));

    let app = llmrelay_router::relay_router(engine);

    let listener = tokio::net::TcpListener::bind(&loaded.global.listen_addr)
        .await
        .with_context(|| format!("binding {}", loaded.global.listen_addr))?;
    tracing::info!(addr = %loaded.global.listen_addr, mode = ?loaded.global.mode, "llmrelay listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
