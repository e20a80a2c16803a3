//! Fleet membership and the scheduled refresh cycle.
//!
//! The coordinator owns the device list, fans scheduled polls out across
//! it, and converts per-device failures into a single aggregate refresh
//! outcome without losing state already merged by the devices that
//! succeeded. It also owns setup and teardown of the push pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hydrosync_types::DeviceFamily;

use crate::api::{ApiClient, PreferencePair};
use crate::channel::{MessageChannel, PushMessage};
use crate::device::Device;
use crate::dispatcher::PushDispatcher;
use crate::error::{DeviceFailure, Error, Result};

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Interval between scheduled refresh cycles.
    pub update_interval: Duration,
    /// Deadline for one device's whole poll sequence. A device exceeding it
    /// counts as failed for that cycle; siblings are unaffected.
    pub device_timeout: Duration,
    /// Capacity of the inbound push-delta queue.
    pub push_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(60),
            device_timeout: Duration::from_secs(30),
            push_buffer: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Validate the configuration.
    ///
    /// Checks that:
    /// - `update_interval` and `device_timeout` are > 0
    /// - `push_buffer` is > 0
    pub fn validate(&self) -> Result<()> {
        if self.update_interval.is_zero() {
            return Err(Error::invalid_config("update_interval must be > 0"));
        }
        if self.device_timeout.is_zero() {
            return Err(Error::invalid_config("device_timeout must be > 0"));
        }
        if self.push_buffer == 0 {
            return Err(Error::invalid_config("push_buffer must be > 0"));
        }
        Ok(())
    }
}

/// Coordinator for a fleet of water-monitoring devices.
///
/// Collaborators are explicit constructor dependencies; there are no
/// process-wide singletons. The device list is exposed read-only: fleet
/// membership changes only through [`add_device`](Coordinator::add_device).
pub struct Coordinator {
    api: Arc<dyn ApiClient>,
    channel: Arc<dyn MessageChannel>,
    config: CoordinatorConfig,
    devices: Arc<RwLock<Vec<Arc<Device>>>>,
    push_tx: mpsc::Sender<PushMessage>,
    dispatcher: std::sync::Mutex<Option<PushDispatcher>>,
    refresh_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Create a coordinator with the default configuration.
    pub fn new(api: Arc<dyn ApiClient>, channel: Arc<dyn MessageChannel>) -> Self {
        Self::with_config(api, channel, CoordinatorConfig::default())
            .expect("default config is valid")
    }

    /// Create a coordinator with a custom configuration.
    pub fn with_config(
        api: Arc<dyn ApiClient>,
        channel: Arc<dyn MessageChannel>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let devices: Arc<RwLock<Vec<Arc<Device>>>> = Arc::new(RwLock::new(Vec::new()));
        let (push_tx, push_rx) = mpsc::channel(config.push_buffer);
        let cancel = CancellationToken::new();
        let dispatcher =
            PushDispatcher::spawn(Arc::clone(&devices), push_rx, cancel.child_token());

        Ok(Self {
            api,
            channel,
            config,
            devices,
            push_tx,
            dispatcher: std::sync::Mutex::new(Some(dispatcher)),
            refresh_task: std::sync::Mutex::new(None),
            cancel,
        })
    }

    /// The coordinator configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Sender the message-channel transport feeds inbound deltas into.
    pub fn push_sender(&self) -> mpsc::Sender<PushMessage> {
        self.push_tx.clone()
    }

    /// Add a device resolved from the external directory listing.
    ///
    /// Unknown product codes are logged and discarded; fleet membership is
    /// unaffected. Adding an id that is already present is a no-op.
    pub async fn add_device(&self, home_id: &str, device_id: &str, product_code: &str) {
        let Some(family) = DeviceFamily::from_product_code(product_code) else {
            warn!(device = %device_id, product_code, "ignoring device with unknown product code");
            return;
        };

        let mut devices = self.devices.write().await;
        if devices.iter().any(|d| d.id() == device_id) {
            debug!(device = %device_id, "device already managed");
            return;
        }

        devices.push(Arc::new(Device::new(
            home_id,
            device_id,
            family,
            Arc::clone(&self.api),
            Arc::clone(&self.channel),
        )));
        info!(device = %device_id, family = %family, "added device to fleet");
    }

    /// Read-only snapshot of the fleet, in insertion order.
    pub async fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().await.clone()
    }

    /// Look up one device by id.
    pub async fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices
            .read()
            .await
            .iter()
            .find(|d| d.id() == device_id)
            .cloned()
    }

    /// Connect the message channel and set up every device's subscription.
    ///
    /// The first setup failure is propagated; devices that already
    /// succeeded are not rolled back. The caller decides overall success
    /// and owns releasing the channel on failure.
    pub async fn async_setup(&self) -> Result<()> {
        self.channel.connect().await?;

        for device in self.devices().await {
            let initial = device.async_setup().await?;
            debug!(
                device = %device.id(),
                initial_status = initial.as_deref().unwrap_or("unknown"),
                "device setup complete"
            );
        }
        Ok(())
    }

    /// Run one refresh cycle across the whole fleet.
    ///
    /// Every device is attempted: a failure (or deadline overrun) on one
    /// device neither short-circuits the batch nor suppresses updates for
    /// healthy devices. If any device failed, a single aggregate error is
    /// returned after the batch completes, naming each failed device.
    pub async fn refresh(&self) -> Result<()> {
        let devices = self.devices().await;
        let attempted = devices.len();

        let results = join_all(devices.iter().map(|device| {
            let deadline = self.config.device_timeout;
            async move {
                match timeout(deadline, device.async_update_data()).await {
                    Ok(Ok(())) => None,
                    Ok(Err(cause)) => Some(DeviceFailure {
                        device_id: device.id().to_string(),
                        cause,
                    }),
                    Err(_) => Some(DeviceFailure {
                        device_id: device.id().to_string(),
                        cause: Error::timeout(device.id(), "async_update_data", deadline),
                    }),
                }
            }
        }))
        .await;

        let failures: Vec<DeviceFailure> = results.into_iter().flatten().collect();
        if failures.is_empty() {
            debug!(attempted, "refresh cycle complete");
            Ok(())
        } else {
            for failure in &failures {
                warn!(device = %failure.device_id, error = %failure.cause, "device update failed");
            }
            Err(Error::RefreshFailed {
                attempted,
                failures,
            })
        }
    }

    /// Start the scheduled refresh loop.
    ///
    /// Cycles run strictly one after another: the next tick is not serviced
    /// until the previous cycle has drained, and missed ticks are delayed
    /// rather than bursted. Failed cycles are logged and the loop goes on.
    pub fn spawn_refresh_loop(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        let token = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(coordinator.config.update_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("refresh loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = coordinator.refresh().await {
                            warn!(error = %e, "scheduled refresh reported failures");
                        }
                    }
                }
            }
        });

        let mut slot = self.refresh_task.lock().expect("refresh task lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            // A second spawn supersedes the first loop.
            previous.abort();
        }
    }

    /// Stop scheduling, drain the push pipeline and release the channel.
    ///
    /// Safe to call more than once; later calls are no-ops apart from the
    /// channel disconnect.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();

        let refresh = self.refresh_task.lock().expect("refresh task lock poisoned").take();
        if let Some(handle) = refresh {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "refresh loop task panicked");
                }
            }
        }

        let dispatcher = self.dispatcher.lock().expect("dispatcher lock poisoned").take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.shutdown().await;
        }

        self.channel.disconnect_and_wait().await
    }

    /// Trigger a leak test on a device, resolved by id.
    pub async fn run_leak_test(&self, device_id: &str, extended: bool) -> Result<()> {
        let device = self.require_device(device_id).await?;
        match device.as_plus() {
            Some(plus) => plus.run_leak_test(extended).await,
            None => Err(self.unsupported(device_id, "run_leak_test")),
        }
    }

    /// Open a device's shutoff valve.
    pub async fn open_valve(&self, device_id: &str) -> Result<()> {
        let device = self.require_device(device_id).await?;
        match device.as_plus() {
            Some(plus) => plus.open_valve().await,
            None => Err(self.unsupported(device_id, "open_valve")),
        }
    }

    /// Close a device's shutoff valve.
    pub async fn close_valve(&self, device_id: &str) -> Result<()> {
        let device = self.require_device(device_id).await?;
        match device.as_plus() {
            Some(plus) => plus.close_valve().await,
            None => Err(self.unsupported(device_id, "close_valve")),
        }
    }

    /// Write one preference on a device, resolved by id.
    pub async fn set_device_preference(
        &self,
        device_id: &str,
        name: &str,
        value: &str,
    ) -> Result<Option<PreferencePair>> {
        self.require_device(device_id)
            .await?
            .set_device_preference(name, value)
            .await
    }

    /// Toggle away mode on a device, resolved by id.
    pub async fn set_away_mode(
        &self,
        device_id: &str,
        enabled: bool,
    ) -> Result<Option<PreferencePair>> {
        self.require_device(device_id).await?.set_away_mode(enabled).await
    }

    /// Toggle the scheduled leak test on a device, resolved by id.
    pub async fn set_scheduler_enabled(
        &self,
        device_id: &str,
        enabled: bool,
    ) -> Result<Option<PreferencePair>> {
        self.require_device(device_id)
            .await?
            .set_scheduler_enabled(enabled)
            .await
    }

    /// Toggle auto-shutoff on a device, resolved by id.
    pub async fn set_auto_shutoff_enabled(&self, device_id: &str, enabled: bool) -> Result<()> {
        let device = self.require_device(device_id).await?;
        match device.as_plus() {
            Some(plus) => plus.set_auto_shutoff_enabled(enabled).await,
            None => Err(self.unsupported(device_id, "set_auto_shutoff_enabled")),
        }
    }

    async fn require_device(&self, device_id: &str) -> Result<Arc<Device>> {
        self.device(device_id)
            .await
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))
    }

    fn unsupported(&self, device_id: &str, operation: &str) -> Error {
        Error::Unsupported {
            device_id: device_id.to_string(),
            operation: operation.to_string(),
        }
    }
}
