use super::read_input;
use crate::error::{CliError, CliResult};
use hookrelay::{DeliveryClient, EventDescriptor, Settings};
use std::path::Path;
use tracing::info;

/// Deliver one descriptor using the emitter configuration
pub async fn run(config_path: Option<&Path>, event_path: &Path) -> CliResult<()> {
    let settings = Settings::load(config_path)?;
    let config = settings.emitter.ok_or(CliError::MissingSection("emitter"))?;
    let descriptor = EventDescriptor::from_slice(&read_input(event_path)?)?;

    let client = DeliveryClient::new(config)?;
    let receipt = client.deliver_configured(&descriptor).await?;

    info!(
        event_id = %receipt.event_id,
        status = receipt.status,
        attempts = receipt.attempts,
        elapsed_ms = receipt.elapsed.as_millis() as u64,
        "event delivered"
    );
    println!(
        "{}",
        serde_json::json!({
            "eventId": receipt.event_id,
            "status": receipt.status,
            "attempts": receipt.attempts,
        })
    );
    Ok(())
}
