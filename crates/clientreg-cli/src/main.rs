//! CLI entry point for clientreg.
//!
//! This binary provides the `clientreg` command with subcommands for
//! generating, registering, and looking up client identifiers.

mod cli;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use clientreg_store::{ClientRegistry, Store, StoreError, generate_client_id};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    match cli.command {
        Commands::Generate => cmd_generate(),
        Commands::Register { id } => cmd_register(&load_store(&cli.config, cli.db)?, id).await,
        Commands::Exists { id } => cmd_exists(&load_store(&cli.config, cli.db)?, id).await,
        Commands::List { json } => cmd_list(&load_store(&cli.config, cli.db)?, json).await,
        Commands::Init => cmd_init(&load_store(&cli.config, cli.db)?).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_generate() -> Result<()> {
    println!("{}", generate_client_id());
    Ok(())
}

async fn cmd_register(store: &Store, id: Option<String>) -> Result<()> {
    let id = id.unwrap_or_else(|| generate_client_id().into_inner());
    let create_schema = store.config().create_schema;

    let registered = id.clone();
    store
        .scope(|store| async move {
            if create_schema {
                store.ensure_schema().await?;
            }
            ClientRegistry::new(store).register(&registered).await
        })
        .await
        .with_context(|| format!("failed to register {id}"))?;

    info!(client_id = %id, "client registered");
    println!("{id}");
    Ok(())
}

async fn cmd_exists(store: &Store, id: String) -> Result<()> {
    let create_schema = store.config().create_schema;

    let lookup = id.clone();
    let result = store
        .scope(|store| async move {
            if create_schema {
                store.ensure_schema().await?;
            }
            ClientRegistry::new(store).exists(&lookup).await
        })
        .await;

    match result {
        Ok(_) => {
            println!("registered");
            Ok(())
        }
        Err(StoreError::NotFound { .. }) => bail!("{id} is not registered"),
        Err(e) => Err(e).with_context(|| format!("failed to look up {id}")),
    }
}

async fn cmd_list(store: &Store, json: bool) -> Result<()> {
    let create_schema = store.config().create_schema;

    let records = store
        .scope(|store| async move {
            if create_schema {
                store.ensure_schema().await?;
            }
            ClientRegistry::new(store).list().await
        })
        .await
        .context("failed to list clients")?;

    if json {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        for record in &records {
            println!("{}", record.id);
        }
    }
    Ok(())
}

async fn cmd_init(store: &Store) -> Result<()> {
    store
        .scope(|store| async move { store.ensure_schema().await })
        .await
        .context("failed to create schema")?;

    if let Some(path) = &store.config().path {
        println!("schema ready at {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the store described by the config file and `--db`, creating the
/// database directory if needed. No connection is opened here.
fn load_store(config_path: &Path, db: Option<PathBuf>) -> Result<Store> {
    let config = config::load_store_config(config_path, db)?;
    if let Some(parent) = config.path.as_deref().and_then(|p| p.parent())
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(Store::new(config))
}

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so command output on stdout stays scriptable.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
