//! Main entry point for the Rally Point matchmaking service
//!
//! Initializes configuration, logging and the application state, runs the
//! status server, and shuts down gracefully on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use rally_point::config::AppConfig;
use rally_point::service::{AppState, HealthServer, HealthServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Rally Point Matchmaking Service - queue-based matchmaking with pluggable strategies
#[derive(Parser)]
#[command(
    name = "rally-point",
    version,
    about = "A matchmaking microservice with pluggable matching strategies",
    long_about = "Rally Point manages named matchmaking queues, each driven by a configurable \
                 strategy: flexible team composition, rating-window expansion, external scoring \
                 over AMQP, or nearest-neighbor similarity search."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Data directory override
    #[arg(long, value_name = "DIR", help = "Override definition data directory")]
    data_dir: Option<PathBuf>,

    /// Enable the AMQP scorer transport
    #[arg(long, help = "Connect to the AMQP broker for external-scorer strategies")]
    amqp: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Rally Point Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Tick interval: {}ms", config.matchmaking.tick_interval_ms);
    info!("   Data dir: {}", config.matchmaking.data_dir);
    info!(
        "   Scorer transport: {}",
        if config.amqp.enabled {
            format!("amqp://{}:{}", config.amqp.host, config.amqp.port)
        } else {
            "disabled".to_string()
        }
    );
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }
    if let Some(data_dir) = &args.data_dir {
        config.matchmaking.data_dir = data_dir.to_string_lossy().into_owned();
    }
    if args.amqp {
        config.amqp.enabled = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Restoring persisted definitions...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {:#}", e);
        std::process::exit(1);
    }

    let health_server = Arc::new(HealthServer::new(
        HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        },
        app_state.clone(),
    ));
    let health_task = {
        let health_server = health_server.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {:#}", e);
            }
        })
    };

    info!("Rally Point Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    health_server.stop();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => error!("Shutdown finished with errors: {:#}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    let _ = health_task.await;

    info!("Rally Point Matchmaking Service stopped");
    Ok(())
}
