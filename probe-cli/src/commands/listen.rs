use anyhow::{bail, Result};
use probe_callback::CallbackReceiver;
use probe_config::CallbackConfig;
use std::time::Duration;
use tracing::info;

/// Serve the webhook until one delivery arrives under `key`, then print it
pub async fn listen_command(
    mut config: CallbackConfig,
    port: Option<u16>,
    key: &str,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(port) = port {
        config.port = port;
    }
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(config.default_wait);

    let receiver = CallbackReceiver::start(&config).await?;
    println!("Listening for deliveries at {}", receiver.callback_url());
    info!("Waiting up to {:?} for '{}'", timeout, key);

    let Some(record) = receiver.wait_for(key, timeout).await else {
        bail!("No delivery for '{}' within {:?}", key, timeout);
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    receiver.shutdown();
    Ok(())
}
