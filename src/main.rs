use anyhow::Result;
use cda::config::{load_config, CdaConfig};
use cda::device::DeviceDataManager;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/cda.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cda=info".into()),
        )
        .init();

    info!("Constrained device agent starting...");

    // Config path: first argument, then CDA_CONFIG, then the default
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CDA_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = match load_config(&config_path) {
        Ok(config) => {
            info!(path = %config_path, "Configuration loaded");
            config
        }
        Err(e) => {
            warn!(error = %e, "Using default configuration");
            CdaConfig::default()
        }
    };
    config.apply_env_overrides();

    let corrections = config.correct();
    if !corrections.is_empty() {
        warn!(count = corrections.len(), "Configuration had invalid values");
    }

    info!(
        location_id = %config.device.location_id,
        poll_cycle_secs = config.device.poll_cycle_secs,
        mqtt_host = %config.mqtt.host,
        mqtt_port = config.mqtt.port,
        "Device configuration"
    );

    let device = DeviceDataManager::from_config(&config);
    device.start().await;

    info!("Device agent running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    device.stop().await;

    info!("Constrained device agent stopped");
    Ok(())
}
