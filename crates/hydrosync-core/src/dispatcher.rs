//! Push-delta dispatch.
//!
//! The message channel delivers deltas for every subscribed device into one
//! bounded inbound queue. A single dispatcher task drains that queue, looks
//! up the target device and invokes its merge-and-notify routine under the
//! device's own exclusion scope. One task is enough: merges are cheap, and
//! a single drain point preserves the transport's delivery order.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::PushMessage;
use crate::device::Device;

/// Handle to the spawned dispatcher task.
///
/// Dropping the handle does not stop the task; call
/// [`shutdown`](PushDispatcher::shutdown) for a clean stop.
#[derive(Debug)]
pub struct PushDispatcher {
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl PushDispatcher {
    /// Spawn the dispatcher over the fleet's device list.
    pub(crate) fn spawn(
        devices: Arc<RwLock<Vec<Arc<Device>>>>,
        mut inbound: mpsc::Receiver<PushMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let task_token = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("push dispatcher cancelled");
                        break;
                    }
                    message = inbound.recv() => {
                        match message {
                            Some(message) => {
                                Self::dispatch(&devices, message).await;
                            }
                            None => {
                                // All senders dropped; the transport is gone.
                                debug!("push channel closed, dispatcher stopping");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { handle, cancel }
    }

    async fn dispatch(devices: &RwLock<Vec<Arc<Device>>>, message: PushMessage) {
        let target = {
            let devices = devices.read().await;
            devices
                .iter()
                .find(|d| d.id() == message.device_id)
                .cloned()
        };
        match target {
            Some(device) => {
                device
                    .on_device_update(&message.device_id, &message.delta)
                    .await;
            }
            None => {
                warn!(device = %message.device_id, "dropping delta for unmanaged device");
            }
        }
    }

    /// Stop the dispatcher and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "push dispatcher task panicked");
        }
    }
}
