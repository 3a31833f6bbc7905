// Command-line host: runs setup, polls every sensor, tears down on Ctrl-C
use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use previo_reservations::{
    ClientConfig, CoordinatorConfig, Displayable, ReservationRegistry, SetupForm, DEFAULT_ROOMS,
};

#[derive(Debug, Parser)]
#[command(name = "previo-reservations", about = "Room occupancy from the Previo reservation API")]
struct Args {
    #[arg(long, env = "PREVIO_USERNAME")]
    username: String,

    #[arg(long, env = "PREVIO_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, env = "PREVIO_HOTEL_ID")]
    hotel_id: String,

    /// Comma-separated room identifiers
    #[arg(long, env = "PREVIO_ROOMS", default_value = DEFAULT_ROOMS)]
    rooms: String,

    #[arg(long, env = "PREVIO_BASE_URL", default_value = previo_reservations::previo_api::DEFAULT_BASE_URL)]
    base_url: String,

    /// How often sensor states are read and printed
    #[arg(long, env = "PREVIO_POLL_SECS", default_value_t = 60)]
    poll_secs: u64,

    /// Minimum age of the cached reservations before a new fetch
    #[arg(long, env = "PREVIO_MIN_INTERVAL_SECS", default_value_t = 15 * 60)]
    min_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let form = SetupForm {
        username: Some(args.username),
        password: Some(args.password.into()),
        hotel_id: Some(args.hotel_id),
        rooms: Some(args.rooms),
    };
    let min_interval = Duration::from_secs(args.min_interval_secs);
    let config = form
        .validate()
        .context("invalid configuration")?
        .with_client_config(ClientConfig {
            base_url: args.base_url,
            ..ClientConfig::default()
        })
        .with_coordinator_config(CoordinatorConfig {
            min_interval,
            update_interval: min_interval,
            ..CoordinatorConfig::default()
        });

    let registry = ReservationRegistry::setup(config)
        .await
        .context("failed to set up reservation sensors")?;

    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll.tick() => {
                registry.update_all().await;
                if let Some(error) = &registry.coordinator().current().error {
                    warn!(error = %error, "last update failed, showing cached reservations");
                }
                for sensor in registry.sensors() {
                    info!(
                        unique_id = %sensor.unique_id(),
                        name = %sensor.name(),
                        state = %sensor.state(),
                        attributes = %serde_json::Value::Object(sensor.extra_state_attributes()),
                        "sensor"
                    );
                }
            }
        }
    }

    info!("shutting down");
    registry.teardown().await;
    Ok(())
}
