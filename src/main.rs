//! Consumer Management Console
//!
//! Server-side proxy for a rate-limited API gateway:
//! - consumer list/create/update/delete with name and limit normalization
//! - usage and per-model token queries against the metering API
//! - health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use gateway_client::{GatewayClient, GatewayConfig};
use metering_client::{MeteringClient, MeteringConfig};
use telemetry::{health, init_tracing, LogConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    gateway: GatewayConfig,

    #[serde(default)]
    metering: MeteringConfig,

    #[serde(default)]
    log: LogConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            gateway: GatewayConfig::default(),
            metering: MeteringConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log).context("Failed to initialize tracing")?;

    info!("Starting Consumer Console v{}", env!("CARGO_PKG_VERSION"));
    info!(gateway = ?config.gateway, metering = ?config.metering, "Loaded configuration");

    let gateway = Arc::new(
        GatewayClient::new(config.gateway.clone()).context("Failed to create gateway client")?,
    );
    let metering = Arc::new(
        MeteringClient::new(config.metering.clone())
            .context("Failed to create metering client")?,
    );

    check_health(&gateway, &metering).await;

    let state = AppState::new(gateway, metering);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("CONSOLE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides; nested parsing mangles underscored field names
    if let Ok(host) = std::env::var("CONSOLE_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("CONSOLE_PORT") {
        config.port = port.parse().context("CONSOLE_PORT must be a port number")?;
    }

    if let Ok(url) = std::env::var("CONSOLE_GATEWAY_BASE_URL") {
        config.gateway.base_url = url;
    }
    if let Ok(key) = std::env::var("CONSOLE_GATEWAY_API_KEY") {
        config.gateway.api_key = Some(key);
    }
    if let Ok(account) = std::env::var("CONSOLE_GATEWAY_ACCOUNT") {
        config.gateway.account = account;
    }
    if let Ok(bucket) = std::env::var("CONSOLE_GATEWAY_BUCKET") {
        config.gateway.bucket = bucket;
    }

    if let Ok(url) = std::env::var("CONSOLE_METERING_BASE_URL") {
        config.metering.base_url = url;
    }
    if let Ok(key) = std::env::var("CONSOLE_METERING_API_KEY") {
        config.metering.api_key = Some(key);
    }

    config.log = config.log.with_env_overrides();

    Ok(config)
}

/// Check upstream health on startup. Never fatal.
async fn check_health(gateway: &GatewayClient, metering: &MeteringClient) {
    if gateway_client::health::check_connection(gateway).await {
        info!("Gateway connection: healthy");
    } else {
        error!("Gateway connection: unhealthy");
    }

    // The metering API has no cheap probe; trust it until a query fails.
    if metering.config().is_configured() {
        health().metering.set_healthy();
        info!("Metering API: configured");
    } else {
        warn!("Metering API key not configured, usage routes will fail");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
