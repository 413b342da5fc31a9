use anyhow::{anyhow, Context, Result};
use probe_callback::{AsyncSearchClient, CallbackReceiver, LAST_KEY};
use probe_config::ProbeConfig;
use probe_http::{HttpConfig, HttpManager};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Submit an asynchronous search and print the payload delivered for it
pub async fn search_command(config: ProbeConfig, criteria_json: &str, timeout_secs: Option<u64>) -> Result<()> {
    let criteria: Value = serde_json::from_str(criteria_json).context("Invalid --criteria-json")?;
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(config.callback.default_wait);

    let receiver = CallbackReceiver::start(&config.callback).await?;
    let http = HttpManager::with_config(HttpConfig::from(&config.http))?;
    let client = AsyncSearchClient::new(http, config.people);

    let ticket = client.submit(&criteria, receiver.callback_url()).await?;
    info!("Waiting up to {:?} for task {}", timeout, ticket.task_id);

    receiver
        .wait_for(LAST_KEY, timeout)
        .await
        .ok_or_else(|| anyhow!("No delivery arrived within {:?}", timeout))?;
    let record = receiver
        .wait_for(&ticket.task_id, timeout)
        .await
        .ok_or_else(|| anyhow!("No delivery for task {} within {:?}", ticket.task_id, timeout))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    receiver.shutdown();
    Ok(())
}
