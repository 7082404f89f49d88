//! Portage host manager.
//!
//! Usage:
//!   portaged
//!   portaged --config config/manager.toml
//!   portaged --port 15440 --run grep foo in.txt out.txt

use anyhow::{Context, Result};
use clap::Parser;
use portage_migration::{ManagerConfig, MigrationServer, UnitRegistry};
use portage_unit::UnitCatalog;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "portaged")]
#[command(about = "Portage unit manager and migration endpoint")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured bind host
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured migration port
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Start a unit at boot: TYPE ARG... (repeatable)
    #[arg(long = "run", value_name = "TYPE ARG...", num_args = 1.., action = clap::ArgAction::Append, value_parser = clap::value_parser!(String))]
    run: Vec<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => ManagerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_host = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let catalog = UnitCatalog::builtin();
    info!(types = ?catalog.names(), "known unit types");

    let registry = UnitRegistry::new(catalog, config.clone());
    let server = MigrationServer::start(registry.clone(), &config.bind_addr())
        .await
        .with_context(|| format!("failed to start migration server on {}", config.bind_addr()))?;

    for group in &args.run {
        let Some((type_name, unit_args)) = group.split_first() else {
            continue;
        };
        match registry.start_local(type_name, unit_args.to_vec()) {
            Ok(Some(id)) => info!(id, type_name = %type_name, "started unit"),
            Ok(None) => error!(type_name = %type_name, "no such unit type"),
            Err(e) => error!(type_name = %type_name, error = %e, "failed to start unit"),
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C signal handler")?;
    info!("received shutdown signal");

    server.stop().await;
    info!(live_units = registry.unit_count(), "manager stopped");
    Ok(())
}

fn init_logging(args: &Args) {
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();
}
