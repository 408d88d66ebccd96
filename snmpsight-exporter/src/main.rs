//! SNMP exporter: one HTTP request, one SNMP session, one burst of
//! metrics.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use snmpsight_common::{LoggingConfig, init_tracing};
use snmpsight_core::schema::SchemaRegistry;
use snmpsight_exporter::{AppState, ExporterConfig, ExporterStats, ModulesConfig, serve};

#[derive(Parser, Debug)]
#[command(about = "snmpsight SNMP exporter")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "snmpsight.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ExporterConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let log_config = match &args.log_level {
        Some(level) => LoggingConfig {
            level: level.clone(),
            format: config.logging.format,
        },
        None => config.logging.clone(),
    };
    init_tracing(&log_config).map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting snmpsight");

    let modules = ModulesConfig::load(&config.modules_file)
        .with_context(|| format!("loading modules from {}", config.modules_file))?;
    tracing::info!(count = modules.modules.len(), "Loaded modules");

    let mut registry = SchemaRegistry::new();
    if let Some(schema_file) = &config.schema_file {
        registry
            .load_file(schema_file)
            .with_context(|| format!("loading schema from {}", schema_file))?;
        tracing::info!(
            objects = registry.object_count(),
            file = %schema_file,
            "Loaded schema"
        );
    }

    let listen: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.listen))?;

    let state = AppState {
        modules: Arc::new(modules.modules),
        registry: Arc::new(registry),
        stats: Arc::new(ExporterStats::new()),
    };

    serve(state, listen).await
}
