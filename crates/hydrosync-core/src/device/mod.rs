//! Device variants and the shared synchronization core.
//!
//! A device is created once by the coordinator and then mutated in place by
//! two concurrent writers: the scheduled snapshot poll and the push-delta
//! handler. All mutation goes through a per-device async mutex held across
//! "read remote payload → merge into state → notify observers", so the two
//! writers interleave at whole-payload granularity only. Cross-device
//! operations need no coordination.
//!
//! Family-specific behavior (poll sequence, derived accessors) lives in the
//! [`plus`], [`classic`] and [`water_sensor`] submodules; everything the
//! base contract shares lives on [`DeviceCore`].

pub mod classic;
pub mod plus;
pub mod water_sensor;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use hydrosync_types::{version, DeviceFamily, DeviceState, ValveStatus};

use crate::api::{ApiClient, PreferencePair};
use crate::channel::{device_topic, MessageChannel};
use crate::error::{Error, Result};
use crate::observer::{DeviceUpdate, ObserverList, SubscriptionHandle, UpdateSource};
use crate::preferences;

pub use classic::ClassicDevice;
pub use plus::PlusDevice;
pub use water_sensor::WaterSensorDevice;

/// Metadata about the latest published firmware for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// Latest published firmware version token.
    pub version: String,
    /// Release-notes URL, when the vendor publishes one.
    pub release_url: Option<String>,
}

/// Mutable per-device data guarded by the device's exclusion scope.
///
/// The derived caches are independently nullable: `None` means "not yet
/// fetched" or "fetch failed", never "feature unsupported". Callers must
/// treat `None` as unknown, not as false.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    /// The attribute store both update channels merge into.
    pub(crate) state: DeviceState,
    /// Preference name → string-encoded value.
    pub(crate) preferences: Option<HashMap<String, String>>,
    /// Raw auto-shutoff status payload.
    pub(crate) auto_shutoff: Option<Value>,
    /// Latest published firmware metadata.
    pub(crate) firmware_info: Option<FirmwareInfo>,
    /// Most recent health-test summary entry.
    pub(crate) latest_health_test: Option<Value>,
    /// Rolling daily consumption total.
    pub(crate) consumption_today: Option<f64>,
    /// Latest water-statistics entry (water-sensor family).
    pub(crate) latest_statistics: Option<Value>,
    /// Last settled valve position; disambiguates `Partial`.
    pub(crate) last_known_valve_open: bool,
}

impl SharedState {
    /// Re-derive the settled valve bit after a merge.
    ///
    /// Only unambiguous statuses touch the bit; a transition into `Partial`
    /// leaves the last settled position intact.
    fn refresh_valve_bit(&mut self) {
        if let Some(status) = self.state.status("sov_status") {
            if let Some(open) = ValveStatus::parse(status).settled_open() {
                self.last_known_valve_open = open;
            }
        }
    }
}

/// Identity, collaborators and guarded state shared by every family.
pub(crate) struct DeviceCore {
    home_id: String,
    device_id: String,
    family: DeviceFamily,
    pub(crate) api: Arc<dyn ApiClient>,
    channel: Arc<dyn MessageChannel>,
    pub(crate) shared: Mutex<SharedState>,
    observers: ObserverList,
}

impl std::fmt::Debug for DeviceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCore")
            .field("home_id", &self.home_id)
            .field("device_id", &self.device_id)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl DeviceCore {
    pub(crate) fn new(
        home_id: impl Into<String>,
        device_id: impl Into<String>,
        family: DeviceFamily,
        api: Arc<dyn ApiClient>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            home_id: home_id.into(),
            device_id: device_id.into(),
            family,
            api,
            channel,
            shared: Mutex::new(SharedState::default()),
            observers: ObserverList::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.device_id
    }

    pub(crate) fn home_id(&self) -> &str {
        &self.home_id
    }

    pub(crate) fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Open the device's message-channel subscription and report a
    /// best-effort initial valve status for diagnostic logging.
    pub(crate) async fn setup(&self) -> Result<Option<String>> {
        self.channel
            .subscribe(&device_topic(&self.device_id))
            .await
            .map_err(|e| Error::setup(&self.device_id, e.to_string()))?;

        let shared = self.shared.lock().await;
        Ok(shared.state.status("sov_status").map(str::to_string))
    }

    /// Fetch and merge the primary state snapshot.
    ///
    /// The exclusion scope is held across the remote read and the merge, so
    /// a push delta cannot interleave mid-poll. A failure here aborts the
    /// whole update and is surfaced to the coordinator.
    pub(crate) async fn update_state(&self, shared: &mut SharedState) -> Result<()> {
        let payload = self.api.get_state(&self.device_id).await?;
        shared.state.merge(&payload);
        shared.refresh_valve_bit();
        Ok(())
    }

    /// Fetch current preferences; degraded on failure.
    pub(crate) async fn update_preferences(&self, shared: &mut SharedState) {
        match self.api.get_device_preferences(&self.device_id).await {
            Ok(pairs) => {
                shared.preferences =
                    Some(pairs.into_iter().map(|p| (p.name, p.value)).collect());
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "preference fetch failed, keeping previous");
            }
        }
    }

    /// Fetch auto-shutoff status; degraded on failure.
    pub(crate) async fn update_auto_shutoff(&self, shared: &mut SharedState) {
        match self.api.get_auto_shutoff_status(&self.device_id).await {
            Ok(payload) => shared.auto_shutoff = Some(payload),
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "auto-shutoff fetch failed, keeping previous");
            }
        }
    }

    /// Fetch the rolling daily consumption total; degraded on failure.
    pub(crate) async fn update_consumption(&self, shared: &mut SharedState) {
        match self.api.get_consumption(&self.device_id).await {
            Ok(payload) => {
                if let Some(total) = payload.get("water_consumption").and_then(Value::as_f64) {
                    shared.consumption_today = Some(total);
                }
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "consumption fetch failed, keeping previous");
            }
        }
    }

    /// Fetch the health-test history and keep the newest entry; degraded on
    /// failure.
    pub(crate) async fn update_health_tests(&self, shared: &mut SharedState) {
        match self.api.get_health_tests(&self.device_id).await {
            Ok(payload) => {
                shared.latest_health_test = payload
                    .get("data")
                    .and_then(Value::as_array)
                    .and_then(|entries| entries.first())
                    .cloned();
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "health-test fetch failed, keeping previous");
            }
        }
    }

    /// Fetch latest-firmware metadata; degraded on failure.
    pub(crate) async fn update_firmware_info(&self, shared: &mut SharedState) {
        match self.api.get_latest_firmware_info(&self.device_id).await {
            Ok(payload) => {
                let entry = match &payload {
                    Value::Array(entries) => entries.first(),
                    other => Some(other),
                };
                let parsed = entry.and_then(|e| {
                    let version = e.get("fw_version")?.as_str()?.to_string();
                    Some(FirmwareInfo {
                        version,
                        release_url: e
                            .get("release_notes")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                });
                match parsed {
                    Some(info) => shared.firmware_info = Some(info),
                    None => {
                        warn!(device = %self.device_id, "firmware info missing version token, keeping previous");
                    }
                }
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "firmware info fetch failed, keeping previous");
            }
        }
    }

    /// Fetch water statistics and keep the newest entry; degraded on
    /// failure.
    pub(crate) async fn update_water_statistics(&self, shared: &mut SharedState) {
        match self.api.get_water_statistics(&self.device_id).await {
            Ok(payload) => {
                let latest = match payload {
                    Value::Array(mut entries) => {
                        if entries.is_empty() {
                            None
                        } else {
                            Some(entries.swap_remove(0))
                        }
                    }
                    other => Some(other),
                };
                if latest.is_some() {
                    shared.latest_statistics = latest;
                }
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "water statistics fetch failed, keeping previous");
            }
        }
    }

    /// Apply a push delta: identity filter, normalize, merge, notify.
    ///
    /// Observers are notified synchronously, in registration order, while
    /// the exclusion scope is still held.
    pub(crate) async fn on_device_update(&self, target_device_id: &str, delta: &Value) {
        if target_device_id != self.device_id {
            debug!(
                device = %self.device_id,
                target = %target_device_id,
                "ignoring delta for another device"
            );
            return;
        }

        let mut shared = self.shared.lock().await;
        shared.state.merge_delta(delta);
        shared.refresh_valve_bit();
        self.observers.notify(&DeviceUpdate {
            device_id: self.device_id.clone(),
            source: UpdateSource::Push,
        });
    }

    /// Register a real-time observer.
    pub(crate) fn subscribe(
        &self,
        callback: impl Fn(&DeviceUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.observers.subscribe(callback)
    }

    pub(crate) fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.observers.unsubscribe(handle)
    }

    /// True iff the last merged payload reported the device online.
    pub(crate) async fn available(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.state.status("online_status") == Some("online")
    }

    /// Firmware staleness under the three-valued contract.
    ///
    /// `None` until a firmware-info fetch has succeeded; `Some(false)` when
    /// the device's own token is missing; otherwise the comparator verdict.
    pub(crate) async fn firmware_has_update(&self) -> Option<bool> {
        let shared = self.shared.lock().await;
        let info = shared.firmware_info.as_ref()?;
        match shared.state.scalar_str("fw_version") {
            None | Some("") => Some(false),
            Some(current) => Some(version::has_update(current, &info.version)),
        }
    }

    /// Latest published firmware version, once fetched.
    pub(crate) async fn firmware_latest_version(&self) -> Option<String> {
        let shared = self.shared.lock().await;
        shared.firmware_info.as_ref().map(|i| i.version.clone())
    }

    /// Release-notes URL for the latest published firmware.
    pub(crate) async fn firmware_release_url(&self) -> Option<String> {
        let shared = self.shared.lock().await;
        shared.firmware_info.as_ref().and_then(|i| i.release_url.clone())
    }

    /// The device's own firmware version token; empty until a state merge.
    pub(crate) async fn firmware_version(&self) -> String {
        let shared = self.shared.lock().await;
        shared
            .state
            .scalar_str("fw_version")
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) async fn serial_number(&self) -> Option<String> {
        let shared = self.shared.lock().await;
        shared.state.scalar_str("serial_number").map(str::to_string)
    }

    /// Vendor product code as reported in state; empty until merged.
    pub(crate) async fn model(&self) -> String {
        let shared = self.shared.lock().await;
        shared
            .state
            .scalar_str("product_code")
            .unwrap_or_default()
            .to_string()
    }

    /// Signal strength in dBm; absent keys stay absent, never defaulted.
    pub(crate) async fn rssi(&self) -> Option<i64> {
        let shared = self.shared.lock().await;
        shared.state.scalar_i64("signal_strength")
    }

    /// Validate and write a single preference pair.
    ///
    /// Returns `Ok(None)` without any network call when `(name, value)`
    /// fails the family allow-list; this is the documented silent no-op.
    /// On success exactly one remote write is issued and the local cache is
    /// optimistically updated.
    pub(crate) async fn set_device_preference(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<PreferencePair>> {
        if !preferences::validate(self.family, name, value) {
            debug!(
                device = %self.device_id,
                name, value,
                "rejected preference write, not in allow-list"
            );
            return Ok(None);
        }

        let pair = PreferencePair::new(name, value);
        self.api
            .set_device_preferences(&self.device_id, std::slice::from_ref(&pair))
            .await?;

        let mut shared = self.shared.lock().await;
        shared
            .preferences
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value.to_string());
        Ok(Some(pair))
    }

    /// String-encoded preference value from the local cache.
    pub(crate) async fn preference_bool(&self, name: &str) -> Option<bool> {
        let shared = self.shared.lock().await;
        shared
            .preferences
            .as_ref()?
            .get(name)
            .map(|v| v == "true")
    }

    /// Current valve status parsed from state, if any.
    pub(crate) async fn valve_status(&self) -> Option<ValveStatus> {
        let shared = self.shared.lock().await;
        shared.state.status("sov_status").map(ValveStatus::parse)
    }

    /// True iff a leak test is currently in progress.
    pub(crate) async fn leak_test_running(&self) -> bool {
        matches!(self.valve_status().await, Some(ValveStatus::LeakExp))
    }

    /// True iff the valve is physically mid-travel.
    pub(crate) async fn valve_changing(&self) -> bool {
        matches!(self.valve_status().await, Some(ValveStatus::Partial))
    }

    /// Three-state valve view over the two-valued persisted bit.
    ///
    /// Unambiguous statuses report their own position; `Partial` reports the
    /// last settled position so observers see a stable value during a
    /// transition instead of a flicker. `None` when no status has merged.
    pub(crate) async fn valve_open(&self) -> Option<bool> {
        let shared = self.shared.lock().await;
        let status = ValveStatus::parse(shared.state.status("sov_status")?);
        match status.settled_open() {
            Some(open) => Some(open),
            None => Some(shared.last_known_valve_open),
        }
    }
}

/// A monitored device, polymorphic over family.
///
/// Closed variant set: family selection happens once, at
/// [`Coordinator::add_device`](crate::coordinator::Coordinator::add_device),
/// from the static product-code table. The base contract is available on
/// this enum; family-specific accessors live on the concrete types reached
/// through [`as_plus`](Device::as_plus) and friends.
#[derive(Debug)]
pub enum Device {
    /// Mainline shutoff valve device.
    Plus(PlusDevice),
    /// Dual-line monitoring device.
    Classic(ClassicDevice),
    /// Battery-powered leak sensor.
    WaterSensor(WaterSensorDevice),
}

impl Device {
    /// Construct the family-appropriate variant.
    pub(crate) fn new(
        home_id: &str,
        device_id: &str,
        family: DeviceFamily,
        api: Arc<dyn ApiClient>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        let core = DeviceCore::new(home_id, device_id, family, api, channel);
        match family {
            DeviceFamily::Classic => Device::Classic(ClassicDevice::new(core)),
            DeviceFamily::WaterSensor => Device::WaterSensor(WaterSensorDevice::new(core)),
            // Plus is also the fallback for future valve-bearing families.
            _ => Device::Plus(PlusDevice::new(core)),
        }
    }

    fn core(&self) -> &DeviceCore {
        match self {
            Device::Plus(d) => &d.core,
            Device::Classic(d) => &d.core,
            Device::WaterSensor(d) => &d.core,
        }
    }

    /// Device identifier.
    pub fn id(&self) -> &str {
        self.core().id()
    }

    /// Home the device belongs to.
    pub fn home_id(&self) -> &str {
        self.core().home_id()
    }

    /// Product family.
    pub fn family(&self) -> DeviceFamily {
        self.core().family()
    }

    /// Open the message-channel subscription for this device.
    ///
    /// Returns a best-effort initial valve status string for diagnostic
    /// logging. A failure here must not prevent later polls from being
    /// attempted; the coordinator decides what to do with it.
    pub async fn async_setup(&self) -> Result<Option<String>> {
        self.core().setup().await
    }

    /// Execute the family's poll sequence.
    ///
    /// The primary state fetch aborts the update on failure; secondary
    /// fetches degrade individually, leaving their derived field at its
    /// previous value.
    pub async fn async_update_data(&self) -> Result<()> {
        match self {
            Device::Plus(d) => d.update_data().await,
            Device::Classic(d) => d.update_data().await,
            Device::WaterSensor(d) => d.update_data().await,
        }
    }

    /// Merge a push delta and notify observers.
    ///
    /// Deltas for other device ids are ignored; the message channel is not
    /// guaranteed to filter for us.
    pub async fn on_device_update(&self, target_device_id: &str, delta: &Value) {
        self.core().on_device_update(target_device_id, delta).await
    }

    /// Register a real-time observer; fires on push-driven mutation.
    pub fn subscribe(
        &self,
        callback: impl Fn(&DeviceUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.core().subscribe(callback)
    }

    /// Remove a previously registered observer.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.core().unsubscribe(handle)
    }

    /// True iff the last merged payload reported the device online.
    ///
    /// Independent of message-channel connectivity: a payload reporting
    /// offline flips this immediately.
    pub async fn available(&self) -> bool {
        self.core().available().await
    }

    /// Firmware staleness; see [`DeviceCore::firmware_has_update`] rules.
    pub async fn firmware_has_update(&self) -> Option<bool> {
        self.core().firmware_has_update().await
    }

    /// Latest published firmware version, once fetched.
    pub async fn firmware_latest_version(&self) -> Option<String> {
        self.core().firmware_latest_version().await
    }

    /// Release-notes URL for the latest published firmware.
    pub async fn firmware_release_url(&self) -> Option<String> {
        self.core().firmware_release_url().await
    }

    /// The device's own firmware version; empty until a state merge.
    pub async fn firmware_version(&self) -> String {
        self.core().firmware_version().await
    }

    /// Vendor serial number, once merged.
    pub async fn serial_number(&self) -> Option<String> {
        self.core().serial_number().await
    }

    /// Vendor product code, empty until merged.
    pub async fn model(&self) -> String {
        self.core().model().await
    }

    /// Signal strength in dBm, when reported.
    pub async fn rssi(&self) -> Option<i64> {
        self.core().rssi().await
    }

    /// Validate and write a single preference; invalid pairs are a silent
    /// no-op returning `Ok(None)`.
    pub async fn set_device_preference(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<PreferencePair>> {
        self.core().set_device_preference(name, value).await
    }

    /// Convenience wrapper translating a boolean to the away-mode domain.
    pub async fn set_away_mode(&self, enabled: bool) -> Result<Option<PreferencePair>> {
        self.set_device_preference(preferences::PREF_AWAY_MODE, preferences::encode_bool(enabled))
            .await
    }

    /// Convenience wrapper for the scheduled leak test toggle.
    pub async fn set_scheduler_enabled(&self, enabled: bool) -> Result<Option<PreferencePair>> {
        self.set_device_preference(preferences::PREF_SCHEDULER, preferences::encode_bool(enabled))
            .await
    }

    /// Downcast to the Plus variant.
    pub fn as_plus(&self) -> Option<&PlusDevice> {
        match self {
            Device::Plus(d) => Some(d),
            _ => None,
        }
    }

    /// Downcast to the Classic variant.
    pub fn as_classic(&self) -> Option<&ClassicDevice> {
        match self {
            Device::Classic(d) => Some(d),
            _ => None,
        }
    }

    /// Downcast to the water-sensor variant.
    pub fn as_water_sensor(&self) -> Option<&WaterSensorDevice> {
        match self {
            Device::WaterSensor(d) => Some(d),
            _ => None,
        }
    }
}
