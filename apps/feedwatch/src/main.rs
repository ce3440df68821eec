use feedwatch::error::FeedwatchError;
use feedwatch::logger::initialize as LoggerInitialize;

use feed_core::DEFAULT_SERVER_URL;
use feed_core::client::FeedClient;
use feed_core::config::ClientConfig;
use feed_core::protocol::Channel;

use common::ErrorLocation;

use std::env::args;
use std::fs::create_dir_all;

use log::info;

/// Directory under the platform config root holding config and logs.
const APP_DIR_NAME: &str = "feedwatch";

/// Channel watched when none is named on the command line.
const DEFAULT_CHANNEL: &str = "test";

#[tokio::main]
async fn main() -> Result<(), FeedwatchError> {
    let app_dir = dirs::config_dir()
        .ok_or_else(|| FeedwatchError::Feedwatch {
            message: "No config directory available on this platform".to_string(),
            location: ErrorLocation::caller(),
        })?
        .join(APP_DIR_NAME);

    // Ensure app directory exists
    create_dir_all(&app_dir).map_err(|e| FeedwatchError::Feedwatch {
        message: format!("Failed to create app directory: {e}"),
        location: ErrorLocation::caller(),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&app_dir)?;

    info!("Feedwatch starting");
    info!("App directory: {}", app_dir.display());

    let config = ClientConfig::load(&app_dir).map_err(|e| FeedwatchError::Feedwatch {
        message: format!("Failed to load config: {e}"),
        location: ErrorLocation::caller(),
    })?;

    let endpoint = config
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let channel_name = args().nth(1).unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

    info!("Feed endpoint: {endpoint}");

    let client = FeedClient::connect_with(&endpoint, config).await?;
    client
        .on_state_change(|state| info!("Feed is now {}", state.status))
        .await?;

    let subscription = client
        .subscribe(vec![(
            Channel::new(channel_name.as_str()),
            Box::new(|data| println!("{data}")),
        )])
        .await?;

    info!("Watching channel '{channel_name}' (Ctrl-C to stop)");
    client.wait_until_connected().await;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| FeedwatchError::Feedwatch {
            message: format!("Failed to listen for shutdown signal: {e}"),
            location: ErrorLocation::caller(),
        })?;

    // Unsubscribe goes out ahead of shutdown on the same command queue.
    info!("Shutting down");
    subscription.unsubscribe().await;
    client.shutdown().await;

    Ok(())
}
