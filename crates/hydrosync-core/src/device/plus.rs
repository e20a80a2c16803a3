//! Plus family: mainline shutoff valve with flow, pressure and temperature
//! sensing, preference-gated switches, auto-shutoff and periodic health
//! tests.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::preferences::{self, PREF_AWAY_MODE, PREF_SCHEDULER};

use super::DeviceCore;

/// A Plus-family device.
#[derive(Debug)]
pub struct PlusDevice {
    pub(crate) core: DeviceCore,
}

impl PlusDevice {
    pub(crate) fn new(core: DeviceCore) -> Self {
        Self { core }
    }

    /// Poll sequence: primary state snapshot, then preferences,
    /// auto-shutoff, consumption, health tests and firmware metadata.
    ///
    /// The exclusion scope is held for the whole sequence. Secondary
    /// failures degrade their own field only; the device stays available.
    pub(crate) async fn update_data(&self) -> Result<()> {
        let mut shared = self.core.shared.lock().await;
        self.core.update_state(&mut shared).await?;
        self.core.update_preferences(&mut shared).await;
        self.core.update_auto_shutoff(&mut shared).await;
        self.core.update_consumption(&mut shared).await;
        self.core.update_health_tests(&mut shared).await;
        self.core.update_firmware_info(&mut shared).await;
        Ok(())
    }

    /// Current flow rate, preferring `v` over `mean`.
    pub async fn current_flow_rate(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("flow")
    }

    /// Current line pressure in psi.
    pub async fn current_psi(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("pressure")
    }

    /// Current water temperature.
    pub async fn temperature(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("temperature")
    }

    /// Consumption as last reported through either channel.
    pub async fn consumption(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("consumption")
    }

    /// Rolling daily consumption total from the consumption endpoint.
    pub async fn consumption_today(&self) -> Option<f64> {
        self.core.shared.lock().await.consumption_today
    }

    /// Away-mode leak sensitivity; `None` until preferences are fetched.
    pub async fn away_mode(&self) -> Option<bool> {
        self.core.preference_bool(PREF_AWAY_MODE).await
    }

    /// Scheduled leak test toggle; `None` until preferences are fetched.
    pub async fn scheduled_leak_test_enabled(&self) -> Option<bool> {
        self.core.preference_bool(PREF_SCHEDULER).await
    }

    /// Auto-shutoff toggle; `None` until the status is fetched.
    pub async fn auto_shutoff_enabled(&self) -> Option<bool> {
        let shared = self.core.shared.lock().await;
        shared
            .auto_shutoff
            .as_ref()?
            .get("auto_shutoff_enable")?
            .as_bool()
    }

    /// Most recent health-test summary entry, when one exists.
    pub async fn latest_health_test(&self) -> Option<Value> {
        self.core.shared.lock().await.latest_health_test.clone()
    }

    /// True iff a leak test is currently in progress.
    pub async fn leak_test_running(&self) -> bool {
        self.core.leak_test_running().await
    }

    /// True iff the valve is physically mid-travel.
    pub async fn valve_changing(&self) -> bool {
        self.core.valve_changing().await
    }

    /// Valve position; reports the last settled position during transit.
    pub async fn valve_open(&self) -> Option<bool> {
        self.core.valve_open().await
    }

    /// Enable or disable auto-shutoff; optimistic local update on success.
    pub async fn set_auto_shutoff_enabled(&self, enabled: bool) -> Result<()> {
        self.core.api.set_auto_shutoff(self.core.id(), enabled).await?;
        let mut shared = self.core.shared.lock().await;
        match shared.auto_shutoff.as_mut().and_then(Value::as_object_mut) {
            Some(status) => {
                status.insert("auto_shutoff_enable".to_string(), Value::Bool(enabled));
            }
            None => {
                shared.auto_shutoff = Some(json!({ "auto_shutoff_enable": enabled }));
            }
        }
        Ok(())
    }

    /// Open the shutoff valve. Fire-and-await single call; the settled
    /// position arrives via a later poll or push delta.
    pub async fn open_valve(&self) -> Result<()> {
        self.core.api.open_valve(self.core.id()).await
    }

    /// Close the shutoff valve.
    pub async fn close_valve(&self) -> Result<()> {
        self.core.api.close_valve(self.core.id()).await
    }

    /// Trigger a leak test; `extended` selects the long-running variant.
    ///
    /// A non-success vendor code is surfaced as [`Error::Command`].
    pub async fn run_leak_test(&self, extended: bool) -> Result<()> {
        let outcome = self
            .core
            .api
            .run_leak_test(self.core.id(), preferences::encode_bool(extended))
            .await?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(Error::Command {
                device_id: self.core.id().to_string(),
                command: "leak_test".to_string(),
                code: outcome.code,
                message: outcome.message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use hydrosync_types::DeviceFamily;

    use crate::api::CommandOutcome;
    use crate::device::Device;
    use crate::mock::{MockApiClient, MockChannel};

    fn plus_device(api: Arc<MockApiClient>) -> Device {
        Device::new(
            "test-home-id",
            "test-device-id",
            DeviceFamily::Plus,
            api,
            Arc::new(MockChannel::new()),
        )
    }

    #[tokio::test]
    async fn test_update_data_merges_state_and_derived_fields() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));

        device.async_update_data().await.unwrap();

        let plus = device.as_plus().unwrap();
        assert_eq!(plus.current_flow_rate().await, Some(1.5));
        assert_eq!(plus.current_psi().await, Some(45.5));
        assert_eq!(plus.temperature().await, Some(72.0));
        assert_eq!(plus.valve_open().await, Some(true));
        assert_eq!(plus.auto_shutoff_enabled().await, Some(true));
        assert_eq!(plus.scheduled_leak_test_enabled().await, Some(true));
        assert_eq!(plus.away_mode().await, Some(false));
        assert_eq!(plus.consumption_today().await, Some(150.5));
        assert!(device.available().await);
    }

    #[tokio::test]
    async fn test_primary_state_failure_aborts_update() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.fail_endpoint("get_state");
        let device = plus_device(Arc::clone(&api));

        assert!(device.async_update_data().await.is_err());
        // No secondary call should have been attempted.
        assert_eq!(api.call_count("get_device_preferences"), 0);
    }

    #[tokio::test]
    async fn test_secondary_failure_degrades_field_only() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.fail_endpoint("get_health_tests");
        let device = plus_device(Arc::clone(&api));

        device.async_update_data().await.unwrap();

        let plus = device.as_plus().unwrap();
        assert_eq!(plus.latest_health_test().await, None);
        // The device itself stays available.
        assert!(device.available().await);
        assert_eq!(plus.current_psi().await, Some(45.5));
    }

    #[tokio::test]
    async fn test_offline_payload_marks_unavailable() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"online_status": {"v": "offline"}}));
        let device = plus_device(api);

        device.async_update_data().await.unwrap();
        assert!(!device.available().await);
    }

    #[tokio::test]
    async fn test_partial_status_reports_last_settled_position() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));
        device.async_update_data().await.unwrap();

        let plus = device.as_plus().unwrap();
        assert_eq!(plus.valve_open().await, Some(true));

        device
            .on_device_update("test-device-id", &json!({"sov_state": "Partial"}))
            .await;
        assert!(plus.valve_changing().await);
        // Mid-travel keeps reporting the last settled position.
        assert_eq!(plus.valve_open().await, Some(true));

        device
            .on_device_update("test-device-id", &json!({"sov_state": "Closed"}))
            .await;
        assert_eq!(plus.valve_open().await, Some(false));

        device
            .on_device_update("test-device-id", &json!({"sov_state": "Partial"}))
            .await;
        assert_eq!(plus.valve_open().await, Some(false));
    }

    #[tokio::test]
    async fn test_leak_test_status() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"sov_status": {"v": "LeakExp"}}));
        let device = plus_device(api);
        device.async_update_data().await.unwrap();

        let plus = device.as_plus().unwrap();
        assert!(plus.leak_test_running().await);
        assert!(!plus.valve_changing().await);
    }

    #[tokio::test]
    async fn test_push_delta_updates_state_and_notifies() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(api);
        device.async_update_data().await.unwrap();

        let notified = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        device.subscribe(move |update| {
            assert_eq!(update.device_id, "test-device-id");
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        device
            .on_device_update(
                "test-device-id",
                &json!({
                    "consumption": {"v": 123.45},
                    "flow": {"v": 2.5},
                    "sov_state": "Partial",
                    "sensor_data": {
                        "pressure": {"v": 50.0},
                        "temperature": {"v": 75.0},
                    }
                }),
            )
            .await;

        let plus = device.as_plus().unwrap();
        assert_eq!(plus.consumption().await, Some(123.45));
        assert_eq!(plus.current_flow_rate().await, Some(2.5));
        assert_eq!(plus.current_psi().await, Some(50.0));
        assert_eq!(plus.temperature().await, Some(75.0));
        assert_eq!(notified.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delta_for_other_device_is_ignored() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(api);
        device.async_update_data().await.unwrap();

        let plus = device.as_plus().unwrap();
        let before = plus.current_flow_rate().await;

        device
            .on_device_update("other-device-id", &json!({"flow": {"v": 999.0}}))
            .await;

        assert_eq!(plus.current_flow_rate().await, before);
    }

    #[tokio::test]
    async fn test_set_device_preference_valid_pair_issues_one_write() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));

        let written = device
            .set_device_preference("scheduler_enable", "true")
            .await
            .unwrap();

        assert!(written.is_some());
        let writes = api.preference_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "test-device-id");
        assert_eq!(writes[0].1.len(), 1);
        assert_eq!(writes[0].1[0].name, "scheduler_enable");
        assert_eq!(writes[0].1[0].value, "true");
    }

    #[tokio::test]
    async fn test_set_device_preference_invalid_is_silent_noop() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));

        assert!(device
            .set_device_preference("bogus", "x")
            .await
            .unwrap()
            .is_none());
        assert!(device
            .set_device_preference("leak_sensitivity_away_mode", "invalid")
            .await
            .unwrap()
            .is_none());
        assert!(api.preference_writes().is_empty());
    }

    #[tokio::test]
    async fn test_set_away_mode_translates_boolean() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));

        device.set_away_mode(true).await.unwrap();

        let writes = api.preference_writes();
        assert_eq!(writes[0].1[0].name, "leak_sensitivity_away_mode");
        assert_eq!(writes[0].1[0].value, "true");

        // Optimistic local update is visible before the next poll.
        assert_eq!(device.as_plus().unwrap().away_mode().await, Some(true));
    }

    #[tokio::test]
    async fn test_firmware_update_detection() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({
            "online_status": {"v": "online"},
            "fw_version": "100",
        }));
        api.set_firmware_info(json!([{
            "fw_version": "200",
            "release_notes": "http://example.com/release-notes",
        }]));
        let device = plus_device(api);

        assert_eq!(device.firmware_has_update().await, None);
        device.async_update_data().await.unwrap();

        assert_eq!(device.firmware_has_update().await, Some(true));
        assert_eq!(
            device.firmware_latest_version().await,
            Some("200".to_string())
        );
        assert_eq!(
            device.firmware_release_url().await,
            Some("http://example.com/release-notes".to_string())
        );
    }

    #[tokio::test]
    async fn test_firmware_update_false_when_device_token_missing() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"online_status": {"v": "online"}}));
        api.set_firmware_info(json!([{"fw_version": "200"}]));
        let device = plus_device(api);

        device.async_update_data().await.unwrap();
        assert_eq!(device.firmware_has_update().await, Some(false));
    }

    #[tokio::test]
    async fn test_run_leak_test_surfaces_rejection() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_leak_test_outcome(CommandOutcome {
            code: "error".to_string(),
            message: Some("Test failed".to_string()),
        });
        let device = plus_device(Arc::clone(&api));

        let err = device.as_plus().unwrap().run_leak_test(false).await;
        assert!(err.is_err());
        assert_eq!(api.leak_test_calls(), vec![("test-device-id".to_string(), "false".to_string())]);
    }

    #[tokio::test]
    async fn test_run_leak_test_extended_flag_is_string_encoded() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = plus_device(Arc::clone(&api));

        device.as_plus().unwrap().run_leak_test(true).await.unwrap();
        assert_eq!(api.leak_test_calls()[0].1, "true");
    }

    #[tokio::test]
    async fn test_setup_subscribes_device_topic() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let channel = Arc::new(MockChannel::new());
        let device = Device::new(
            "test-home-id",
            "test-device-id",
            DeviceFamily::Plus,
            api,
            Arc::clone(&channel) as Arc<dyn crate::channel::MessageChannel>,
        );

        device.async_setup().await.unwrap();
        assert_eq!(
            channel.subscriptions(),
            vec!["prd/app_subscriptions/test-device-id".to_string()]
        );
    }
}
