//! Run the engine against the mock collaborators and print fleet state.
//!
//! ```bash
//! cargo run -p hydrosync-core --example fleet_monitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use hydrosync_core::{Coordinator, CoordinatorConfig, MockApiClient, MockChannel, PushMessage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api: Arc<dyn hydrosync_core::ApiClient> = Arc::new(MockApiClient::with_plus_defaults());
    let channel: Arc<dyn hydrosync_core::MessageChannel> = Arc::new(MockChannel::new());
    let coordinator = Arc::new(Coordinator::with_config(
        Arc::clone(&api),
        Arc::clone(&channel),
        CoordinatorConfig {
            update_interval: Duration::from_secs(5),
            ..Default::default()
        },
    )?);

    coordinator.add_device("home-1", "kitchen-main", "PP1").await;
    coordinator.add_device("home-1", "basement-sensor", "PW1").await;

    coordinator.async_setup().await?;
    coordinator.refresh().await?;

    for device in coordinator.devices().await {
        println!(
            "{} ({}) online={}",
            device.id(),
            device.family(),
            device.available().await
        );
        if let Some(plus) = device.as_plus() {
            println!(
                "  flow={:?} gpm  pressure={:?} psi  valve_open={:?}",
                plus.current_flow_rate().await,
                plus.current_psi().await,
                plus.valve_open().await,
            );
        }
    }

    // Simulate a push delta arriving over the message channel.
    coordinator
        .push_sender()
        .send(PushMessage {
            device_id: "kitchen-main".to_string(),
            delta: json!({"flow": {"v": 3.2}}),
        })
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let kitchen = coordinator.device("kitchen-main").await.expect("managed");
    println!(
        "after push: flow={:?} gpm",
        kitchen.as_plus().expect("plus device").current_flow_rate().await
    );

    coordinator.shutdown().await?;
    Ok(())
}
