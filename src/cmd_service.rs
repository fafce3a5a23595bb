//! Subcommands that talk to the credential service directly.

use ezpass_config::Config;
use ezpass_core::effective_origin;
use ezpass_protocols::CredentialService;
use ezpass_sync::SyncChannel;
use tracing::info;

/// Print the origin key of `address`.
pub(crate) fn normalize(address: &str) {
    println!("{}", effective_origin(address));
}

/// Request credentials for `address` and print the answer as JSON.
pub(crate) async fn fetch(config: &Config, address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let origin = effective_origin(address);
    let channel = SyncChannel::from_config(&config.sync)?;
    info!("Requesting credentials for {} from {}", origin, channel.endpoint());

    let result = channel.request_credentials(&origin).await;
    channel.close().await;

    let answer = result?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
