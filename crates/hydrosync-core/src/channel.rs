//! Persistent message-channel boundary for push deltas.
//!
//! The transport (MQTT or similar) is implemented outside this crate and
//! delivers opaque JSON deltas with no ordering or delivery guarantee beyond
//! the transport's own. Inbound deltas are modeled as a bounded channel of
//! [`PushMessage`] values drained by the
//! [`PushDispatcher`](crate::dispatcher::PushDispatcher).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Topic prefix for per-device subscriptions.
const SUBSCRIPTION_PREFIX: &str = "prd/app_subscriptions";

/// Build the subscription topic for a device.
///
/// # Examples
///
/// ```
/// use hydrosync_core::channel::device_topic;
///
/// assert_eq!(device_topic("dev-1"), "prd/app_subscriptions/dev-1");
/// ```
#[must_use]
pub fn device_topic(device_id: &str) -> String {
    format!("{SUBSCRIPTION_PREFIX}/{device_id}")
}

/// One inbound push delta.
///
/// The transport is not guaranteed to filter by device, so the target id
/// travels with the payload and devices re-check it before merging.
#[derive(Debug, Clone)]
pub struct PushMessage {
    /// Device the delta targets.
    pub device_id: String,
    /// Partial state payload containing only changed fields.
    pub delta: Value,
}

/// Persistent message channel.
///
/// Implementors forward every delivered delta to the `mpsc` sender handed
/// to them at construction; the engine never polls the channel directly.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Open the connection.
    async fn connect(&self) -> Result<()>;

    /// Close the connection and wait for in-flight deliveries to drain.
    async fn disconnect_and_wait(&self) -> Result<()>;

    /// Subscribe to a topic, typically built with [`device_topic`].
    async fn subscribe(&self, topic: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_topic_format() {
        assert_eq!(
            device_topic("test-device-id"),
            "prd/app_subscriptions/test-device-id"
        );
    }
}
