//! Synchronization engine for fleets of networked water-monitoring devices.
//!
//! This crate keeps an in-memory mirror of each device's state current by
//! combining scheduled polling of a vendor cloud API with push deltas from a
//! persistent message channel, and exposes typed accessors and commands on
//! top of that mirror.
//!
//! # Features
//!
//! - **Fleet coordination**: One scheduler fans polls out across the fleet;
//!   one device failing never starves its siblings
//! - **Push deltas**: Per-device topic subscriptions merge fragments into
//!   the same state mirror the poller feeds
//! - **Typed device families**: Shutoff-valve monitors, dual-line classics
//!   and battery leak sensors each expose their own accessor surface
//! - **Observer callbacks**: Subscribe to per-device update notifications
//!   with source attribution (poll or push)
//! - **Commands**: Valve open/close, leak tests, preference and
//!   auto-shutoff writes with optimistic cache updates
//! - **Mock collaborators**: Test without network access using
//!   [`MockApiClient`] and [`MockChannel`]
//!
//! # Device Families
//!
//! | Family | Product codes | Surface |
//! |--------|---------------|---------|
//! | Plus | `PP1`, `PP2` | Flow, pressure, temperature, valve, leak tests |
//! | Classic | `PC1` | Flow, dual pressure/temperature lines, valve |
//! | Water sensor | `PW1` | Battery, humidity, temperature, alert flags |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hydrosync_core::{Coordinator, MockApiClient, MockChannel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(MockApiClient::with_plus_defaults());
//!     let channel = Arc::new(MockChannel::new());
//!     let coordinator = Arc::new(Coordinator::new(api, channel));
//!
//!     // Devices come from the vendor's directory listing.
//!     coordinator.add_device("home-1", "device-1", "PP1").await;
//!
//!     // Connect the channel and subscribe every device's topic.
//!     coordinator.async_setup().await?;
//!
//!     // One refresh cycle, then keep cycling in the background.
//!     coordinator.refresh().await?;
//!     coordinator.spawn_refresh_loop();
//!
//!     if let Some(device) = coordinator.device("device-1").await {
//!         println!("online: {}", device.available().await);
//!     }
//!
//!     coordinator.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod channel;
pub mod coordinator;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod observer;
pub mod preferences;

// Core exports
pub use api::{ApiClient, CommandOutcome, PreferencePair};
pub use channel::{device_topic, MessageChannel, PushMessage};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use device::{ClassicDevice, Device, FirmwareInfo, PlusDevice, WaterSensorDevice};
pub use dispatcher::PushDispatcher;
pub use error::{DeviceFailure, Error, Result};
pub use mock::{MockApiClient, MockChannel};
pub use observer::{DeviceUpdate, SubscriptionHandle, UpdateSource};
pub use preferences::{PREF_AWAY_MODE, PREF_SCHEDULER};

// Re-export from hydrosync-types
pub use hydrosync_types::{DeviceFamily, DeviceState, ValveStatus};
