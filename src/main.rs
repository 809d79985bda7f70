//! REST Mock Server - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use rest_mock::config::StoreKind;
use rest_mock::console::Console;
use rest_mock::fixtures::load_fixture_tree;
use rest_mock::{server, Mapper, MappingStore, MockServerConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "rest-mock",
    about = "HTTP mock server - serves canned responses for declared request mappings",
    version
)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8888)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Path to configuration file
    #[arg(short, long, default_value = "mock-server.yaml")]
    config: PathBuf,

    /// Fixture tree with one endpoint directory per mapping
    #[arg(long, value_name = "DIR")]
    responses: Option<PathBuf>,

    /// Mapping store (overrides the configuration file)
    #[arg(long, value_enum)]
    store: Option<StoreKind>,

    /// Directory holding the durable store file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Version tag the durable store file name is derived from
    #[arg(long)]
    store_version: Option<String>,

    /// Interactively add mappings before serving
    #[arg(long)]
    add: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no inline mappings)");
        MockServerConfig::default()
    };

    if let Some(kind) = args.store {
        config.settings.store.kind = kind;
    }
    if let Some(data_dir) = args.data_dir {
        config.settings.store.data_dir = data_dir;
    }
    if let Some(version) = args.store_version {
        config.settings.store.version = version;
    }

    // Validate and exit if requested
    if args.validate {
        config.validate()?;
        config.to_mappings()?;
        println!(
            "Configuration is valid ({} mappings defined)",
            config.mappings.len()
        );
        return Ok(());
    }

    // The server cannot run without an addressable store.
    let store = MappingStore::open(&config.settings.store)
        .context("Failed to open mapping store")?;
    let mapper = Arc::new(Mapper::new(store, &config.settings));

    let added = mapper.add_all(config.to_mappings()?)?;
    info!(added, "Registered inline mappings");

    if let Some(responses) = &args.responses {
        let added = mapper.add_all(load_fixture_tree(responses)?)?;
        info!(added, "Registered fixture mappings");
    }

    if args.add {
        let console_mapper = Arc::clone(&mapper);
        let added = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            Console::new(stdin.lock(), std::io::stdout()).add_mappings(&console_mapper)
        })
        .await??;
        info!(added, "Registered console mappings");
    }

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        address = %addr,
        mappings = mapper.len(),
        "Starting mock server"
    );

    server::run(listener, mapper).await?;

    Ok(())
}
