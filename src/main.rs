//! penpot-mcp: MCP server for AI-assisted design in Penpot
//!
//! Exposes files, shapes, styles, comments and libraries of a Penpot
//! instance as MCP tools over stdio.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use penpot_mcp::config::{self, Config};
use penpot_mcp::mcp::server::McpServer;
use penpot_mcp::mcp::tools::Backend;
use penpot_mcp::penpot::{Credentials, FileCache, HttpPlatform};

/// MCP server for AI-assisted design in Penpot.
///
/// Credentials come from the configuration file or from the
/// `PENPOT_USERNAME` and `PENPOT_PASSWORD` environment variables.
#[derive(Parser, Debug)]
#[command(name = "penpot-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the tool backend from configuration.
fn build_backend(cfg: &Config) -> Result<Backend, penpot_mcp::penpot::PenpotError> {
    let credentials = match (&cfg.penpot.username, &cfg.penpot.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };
    if credentials.is_none() {
        warn!("No Penpot credentials configured; API calls will fail until they are set");
    }

    let api = HttpPlatform::new(
        &cfg.penpot.api_url,
        credentials,
        Duration::from_secs(cfg.http.timeout_seconds),
        &cfg.http.user_agent,
    )?;
    let cache = FileCache::new(
        Duration::from_secs(cfg.cache.ttl_seconds),
        cfg.cache.max_files,
    );
    Ok(Backend::http(Arc::new(api), cache))
}

/// Entry point for the penpot-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %cfg.penpot.api_url,
        "Starting penpot-mcp server"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    // reqwest's client must be built inside the runtime it will run on.
    let backend = match runtime.block_on(async { build_backend(&cfg) }) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to set up the Penpot client");
            return ExitCode::FAILURE;
        }
    };

    let mut server = McpServer::new(backend);
    info!("MCP server ready, waiting for client connection...");

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
