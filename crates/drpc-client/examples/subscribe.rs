//! Log in to the local desktop client and watch a channel for message
//! updates.
//!
//! ```sh
//! DRPC_CLIENT_ID=... DRPC_ACCESS_TOKEN=... DRPC_CHANNEL_ID=... \
//!     cargo run --example subscribe
//! ```

use anyhow::{Context, Result};
use serde_json::json;

use drpc_client::{ClientConfig, ClientEvent, EventName, RpcClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let client_id = std::env::var("DRPC_CLIENT_ID").context("DRPC_CLIENT_ID not set")?;
    let access_token = std::env::var("DRPC_ACCESS_TOKEN").context("DRPC_ACCESS_TOKEN not set")?;
    let channel_id = std::env::var("DRPC_CHANNEL_ID").context("DRPC_CHANNEL_ID not set")?;

    let (client, mut events) = RpcClient::new(ClientConfig::new(client_id));

    let user = client.login(access_token).await?;
    if let Some(user) = &user {
        tracing::info!(id = %user.id, username = %user.username, "Logged in");
    }

    client
        .subscribe(
            EventName::MessageUpdate,
            Some(json!({ "channel_id": channel_id })),
            |data| tracing::info!(%data, "Message updated"),
        )
        .await?;

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Dispatch { event, data } => {
                tracing::debug!(event = %event, %data, "Dispatch");
            }
            ClientEvent::Error(e) => {
                tracing::warn!(error = %e, "Client error");
            }
            ClientEvent::Disconnected => {
                tracing::info!("Disconnected");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
