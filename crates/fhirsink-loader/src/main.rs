use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fhirsink_db_postgres::{PostgresBundleStore, schema};
use fhirsink_loader::cli::Cli;
use fhirsink_loader::config::AppConfig;
use fhirsink_loader::{BundleSource, Pipeline, observability, reconcile};
use fhirsink_storage::DynBundleStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.source {
        config.source.dir = dir;
    }
    if let Some(policy) = cli.on_error {
        config.pipeline.on_error = policy;
    }
    config
        .validate()
        .map_err(|message| anyhow::anyhow!("Invalid configuration: {message}"))?;

    observability::init_tracing(&config.logging.level);

    info!(
        url = %config.storage.masked_url(),
        source = %config.source.dir.display(),
        "Starting FHIR data load"
    );

    let store = PostgresBundleStore::connect(&config.storage)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if cli.init_schema {
        schema::init_schema(store.pool())
            .await
            .context("Failed to initialize schema")?;
    }
    let store: DynBundleStore = Arc::new(store);

    let bundles = BundleSource::new(config.source.dir.clone());
    let pipeline = Pipeline::new(Arc::clone(&store), config.pipeline.on_error);
    let totals = pipeline.run(&bundles).await?;

    let report = reconcile::reconcile(store.as_ref(), &totals).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Data load completed successfully");
    Ok(())
}
