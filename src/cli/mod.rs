//! Command-line interface parsing and handling
//!
//! The binary loads the config file, applies flag overrides, initializes
//! tracing, and runs the gateway until Ctrl+C or SIGTERM.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::core::config::{data::path_display, Config, ConfigError};
use crate::core::lifespan::{BackgroundResource, HttpClientPool, Lifespan};
use crate::dispatch::Dispatcher;
use crate::mcp::transport::{self, GatewayState};
use crate::ops;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "switchboard", version, long_version = LONG_VERSION)]
#[command(about = "Serve one operation catalog to many credentialed clients")]
#[command(
    long_about = "Switchboard is a tool-dispatch gateway. It advertises a catalog of operations \
and accepts calls over a server-push event stream or stateless HTTP, running every call under \
the credential its caller presented.\n\n\
Transports:\n\
  GET  /sse          Open an event-stream session\n\
  POST /messages/    Submit a call for an open session (?session_id=...)\n\
  POST /mcp          Stateless call, JSON or single-event stream reply\n\n\
Credentials:\n\
  x-auth-data       Base64-encoded JSON object with an access_token field\n\n\
Environment Variables:\n\
  RUST_LOG          Tracing filter (overrides the config file's log_filter)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(short = 'p', long, global = true)]
    pub port: Option<u16>,

    /// Reply to stateless calls with buffered JSON instead of an event stream
    #[arg(long, global = true)]
    pub json_response: bool,

    /// Tracing filter directive, e.g. "debug" or "switchboard=trace"
    #[arg(short = 'l', long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the gateway (default)
    Serve,
    /// Write a config file populated with defaults
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the built-in operation catalog
    ListOperations,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.clone().unwrap_or(Commands::Serve) {
        Commands::InitConfig { force } => {
            let path = config_path(&args)?;
            if path.exists() && !force {
                eprintln!(
                    "⚠️  {} already exists; pass --force to overwrite",
                    path_display(&path)
                );
                std::process::exit(1);
            }
            Config::default().save_to_path(&path)?;
            println!("✅ Wrote {}", path_display(&path));
            Ok(())
        }
        Commands::ListOperations => {
            let catalog = builtin_catalog()?;
            for descriptor in catalog.list() {
                println!("{:<16} {}", descriptor.name(), descriptor.metadata().description);
            }
            Ok(())
        }
        Commands::Serve => {
            let config = load_config(&args)?;
            init_tracing(args.log_level.as_deref(), config.log_filter.as_deref());
            run_server(config).await
        }
    }
}

fn config_path(args: &Args) -> Result<PathBuf, ConfigError> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_config_path(),
    }
}

/// Reads the config file (defaults when absent) and applies flag overrides.
pub fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match config_path(args) {
        Ok(path) => Config::load_from_path(&path)?,
        Err(ConfigError::NoConfigDir) => Config::default(),
        Err(err) => return Err(err),
    };
    apply_overrides(&mut config, args);
    config.validate().map_err(|message| ConfigError::Invalid {
        path: args
            .config
            .as_deref()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        message,
    })?;
    Ok(config)
}

pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.json_response {
        config.transport.json_response = true;
    }
}

fn init_tracing(flag: Option<&str>, configured: Option<&str>) {
    let filter = match flag {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_LOG_FILTER))),
    };
    // A subscriber may already be installed by an embedding host or a test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn builtin_catalog() -> Result<Catalog, Box<dyn Error>> {
    let mut catalog = Catalog::new();
    ops::register_builtin(&mut catalog)?;
    Ok(catalog)
}

async fn run_server(config: Config) -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(HttpClientPool::new(config.lifespan.http_timeout()));
    let resources: Vec<Arc<dyn BackgroundResource>> = vec![pool.clone()];
    let lifespan = Lifespan::new(resources, config.lifespan.shutdown_grace());
    let dispatcher =
        Arc::new(Dispatcher::new(Arc::new(builtin_catalog()?)).with_http_pool(pool));

    if let Err(err) = lifespan.start().await {
        error!(%err, "Startup failed");
        return Err(err.into());
    }

    let listener = match transport::bind(&config.bind_address()).await {
        Ok(listener) => listener,
        Err(err) => {
            lifespan.stop().await;
            return Err(err.into());
        }
    };

    let state = GatewayState::new(dispatcher, lifespan.clone(), config.transport.clone());
    let shutdown = lifespan.shutdown_token();
    let mut server = tokio::spawn(transport::serve(listener, state, async move {
        shutdown.cancelled().await
    }));

    tokio::select! {
        joined = &mut server => {
            lifespan.stop().await;
            return joined?.map_err(Into::into);
        }
        _ = shutdown_signal() => info!("Shutdown requested"),
    }

    lifespan.stop().await;
    server.await?.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(%err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests;
