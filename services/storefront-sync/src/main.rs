//! Storefront sync
//!
//! Command-line driver for the storefront session and catalog stack:
//! 1. Restores the persisted session (refreshing it if it has expired)
//! 2. Keeps the token fresh in the background while the command runs
//! 3. Runs one command against the backend or catalog and prints JSON

mod cli;
mod config;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use catalog::CatalogApi;
use clap::Parser;
use serde_json::{Value, json};
use storefront_auth::{FileStore, SessionStore};
use storefront_client::{ApiClient, spawn_refresh_task};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so stdout carries only the command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let prometheus =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        api_url = %config.api.base_url,
        catalog_url = %config.catalog_url(),
        state_dir = %config.session.state_dir.display(),
        "configuration loaded"
    );

    let persisted = FileStore::open(config.session.state_dir.clone())
        .await
        .context("failed to open session state directory")?;
    let store = Arc::new(
        SessionStore::new(Arc::new(persisted)).with_refresh_buffer(config.refresh_buffer()),
    );
    let client = ApiClient::new(&config.api.base_url, store.clone(), config.timeout())
        .context("failed to build API client")?;

    let phase = store.initialize(client.coordinator()).await;
    info!(phase = phase.label(), "session initialized");

    let refresh_task = spawn_refresh_task(
        store.clone(),
        client.coordinator().clone(),
        config.check_interval(),
    );

    let catalog =
        CatalogApi::new(client.clone(), config.catalog_url()).with_cache_ttl(config.cache_ttl());

    let output = run(&cli.command, &client, &catalog).await;
    refresh_task.abort();

    let output = output?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.metrics {
        eprintln!("{}", prometheus.render());
    }
    Ok(())
}

async fn run(command: &Command, client: &ApiClient, catalog: &CatalogApi) -> Result<Value> {
    let output = match command {
        Command::WhoAmI => {
            let session = client.session().snapshot().await;
            json!({
                "phase": client.session().phase().await.label(),
                "user": session.user,
                "display_name": session.user.as_ref().map(|u| u.display_name()),
                "expires_at": session.expires_at,
                "error": session.error,
            })
        }
        Command::Categories => serde_json::to_value(catalog.all_categories().await?)?,
        Command::Subcategories { parent } => {
            serde_json::to_value(catalog.subcategories(*parent).await?)?
        }
        Command::Products { category } => {
            serde_json::to_value(catalog.products_by_category(*category).await?)?
        }
        Command::Product { id } => serde_json::to_value(catalog.product(*id).await?)?,
        Command::Variants { product, .. } => {
            let filter = command.variant_filter();
            serde_json::to_value(catalog.product_variants(*product, &filter).await?)?
        }
        Command::Pricing { id } => serde_json::to_value(catalog.product_pricing(*id).await?)?,
        Command::Logout => {
            client.logout().await;
            json!({ "logged_out": true })
        }
    };
    Ok(output)
}
