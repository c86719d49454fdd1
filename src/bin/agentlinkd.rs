//! Runs the linking engine as a standalone daemon.
//!
//! Usage:
//!
//! ```text
//! agentlinkd [config-path]
//! ```
//!
//! Without a path the built-in defaults apply. The daemon wires the engine to
//! the in-memory asset store and the simulator driver, feeds store changes and
//! simulator readings into it, records each reading on its stored attribute,
//! and unlinks everything on Ctrl-C. Set
//! `RUST_LOG` to override the default `agentlink=info` filter.

use agentlink::{
    config::{AgentLinkConfig, ConfigError},
    linking::{
        adapters::{
            SimulatorDriver,
            memory::{InMemoryAssetStore, RecordingAssetPipeline},
        },
        ports::Driver,
        services::{AgentService, EventDispatcher},
    },
};
use camino::Utf8PathBuf;
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = load_config()?;
    init_tracing(config.json_logs);

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
    let (asset_store, mut changes) = InMemoryAssetStore::with_change_feed();
    let store = Arc::new(asset_store);
    let pipeline = Arc::new(RecordingAssetPipeline::new());
    let (sensor_tx, mut readings) = mpsc::unbounded_channel();
    let simulator: Arc<dyn Driver> =
        Arc::new(SimulatorDriver::new(Arc::clone(&clock)).with_sensor_feed(sensor_tx));

    let service = Arc::new(
        AgentService::start(
            [simulator],
            Arc::clone(&store),
            pipeline,
            clock,
            config.link_settings(),
        )
        .await?,
    );
    let dispatcher = EventDispatcher::spawn(Arc::clone(&service), config.dispatch_settings());

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                if dispatcher.submit_change(change).await.is_err() {
                    break;
                }
            }
            Some(reading) = readings.recv() => {
                if let Err(err) = store.apply_value(&reading) {
                    tracing::warn!(
                        attribute_ref = %reading.attribute_ref(),
                        error = %err,
                        "simulator reading not recorded"
                    );
                }
                if let Err(err) = service.send_attribute_event(reading).await {
                    tracing::warn!(error = %err, "dropped simulator reading");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    tracing::error!(error = %err, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    tracing::info!("shutting down");
    dispatcher.shutdown().await;
    service.stop().await;
    Ok(())
}

fn load_config() -> Result<AgentLinkConfig, ConfigError> {
    std::env::args()
        .nth(1)
        .map(|path| AgentLinkConfig::load(&Utf8PathBuf::from(path)))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn init_tracing(json_logs: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentlink=info"));

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}
