use std::time::Duration;

use centrifuge_sse::api::ApiClient;
use centrifuge_sse::client::Client;
use centrifuge_sse::config::Config;
use centrifuge_sse::protocol::EventData;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

const CHANNEL: &str = "facts:devops";
const USER: &str = "1";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Post {
    number: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            Targets::new()
                .with_default(LevelFilter::INFO)
                .with_target("centrifuge_sse", LevelFilter::DEBUG),
        )
        .init();

    let api_key = std::env::var("SSE_API_KEY").unwrap_or_default();
    let jwt_key = std::env::var("SSE_JWT_KEY").ok();

    let mut config = Config::new();
    if let Some(jwt_key) = jwt_key {
        config = config.with_secret(jwt_key);
    }
    let mut client = Client::new("http://localhost:8000/connection/uni_sse", config)?;
    client.on_disconnected(|| {
        log::info!("disconnected");
    });

    let cancel = CancellationToken::new();
    let mut events = client.subscribe(cancel.clone(), CHANNEL, USER)?;

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event.json::<EventData>() {
                Ok(data) => log::info!("received {:?} (event={:?}, id={:?})", data, event.event, event.id),
                Err(err) => log::error!("failed to decode event data: {}", err),
            }
        }
    });

    let api = ApiClient::new("http://localhost:8000/api").with_api_key(api_key);

    let publisher = api.clone();
    tokio::spawn(async move {
        for number in 1.. {
            if let Err(err) = publisher.publish(CHANNEL, &Post { number }, true).await {
                log::error!("failed to publish: {}", err);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    // presence has to be enabled for the namespace, otherwise this fails
    tokio::time::sleep(Duration::from_secs(1)).await;
    match api.get_online_presence(CHANNEL).await {
        Ok(presence) => log::info!("online: {:?}", presence),
        Err(err) => log::error!("failed to get presence: {}", err),
    }

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    Ok(())
}
