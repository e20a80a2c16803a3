//! Classic family: dual-line variant with two independent pressure and
//! temperature readings plus hot/cold line assignments.

use crate::error::Result;

use super::DeviceCore;

/// A Classic-family device.
#[derive(Debug)]
pub struct ClassicDevice {
    pub(crate) core: DeviceCore,
}

impl ClassicDevice {
    pub(crate) fn new(core: DeviceCore) -> Self {
        Self { core }
    }

    /// Poll sequence: primary state snapshot, then consumption and firmware
    /// metadata.
    pub(crate) async fn update_data(&self) -> Result<()> {
        let mut shared = self.core.shared.lock().await;
        self.core.update_state(&mut shared).await?;
        self.core.update_consumption(&mut shared).await;
        self.core.update_firmware_info(&mut shared).await;
        Ok(())
    }

    /// Current flow rate, preferring `v` over `mean`.
    pub async fn current_flow_rate(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("flow")
    }

    /// Line 1 pressure in psi.
    pub async fn current_psi1(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("pressure1")
    }

    /// Line 2 pressure in psi.
    pub async fn current_psi2(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("pressure2")
    }

    /// Line 1 water temperature.
    pub async fn temperature1(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("temperature1")
    }

    /// Line 2 water temperature.
    pub async fn temperature2(&self) -> Option<f64> {
        self.core.shared.lock().await.state.reading("temperature2")
    }

    /// Which line is hot; `None` when unreported, never defaulted to zero.
    pub async fn hot_line_num(&self) -> Option<i64> {
        self.core.shared.lock().await.state.scalar_i64("hot_line_num")
    }

    /// Which line is cold; `None` when unreported, never defaulted to zero.
    pub async fn cold_line_num(&self) -> Option<i64> {
        self.core.shared.lock().await.state.scalar_i64("cold_line_num")
    }

    /// Rolling daily consumption total from the consumption endpoint.
    pub async fn consumption_today(&self) -> Option<f64> {
        self.core.shared.lock().await.consumption_today
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
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use hydrosync_types::DeviceFamily;

    use crate::device::Device;
    use crate::mock::{MockApiClient, MockChannel};

    fn classic_device(api: Arc<MockApiClient>) -> Device {
        Device::new(
            "test-home-id",
            "test-device-id",
            DeviceFamily::Classic,
            api,
            Arc::new(MockChannel::new()),
        )
    }

    #[tokio::test]
    async fn test_dual_line_accessors_with_fallback() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({
            "online_status": {"v": "online"},
            "hot_line_num": 1,
            "cold_line_num": 2,
            "pressure1": {"v": 50.5},
            "pressure2": {"mean": 45.3},
            "temperature1": {"v": 75.2},
            "temperature2": {"mean": 70.8},
            "flow": {"v": 2.5},
        }));
        let device = classic_device(api);
        device.async_update_data().await.unwrap();

        let classic = device.as_classic().unwrap();
        assert_eq!(classic.hot_line_num().await, Some(1));
        assert_eq!(classic.cold_line_num().await, Some(2));
        assert_eq!(classic.current_psi1().await, Some(50.5));
        assert_eq!(classic.current_psi2().await, Some(45.3));
        assert_eq!(classic.temperature1().await, Some(75.2));
        assert_eq!(classic.temperature2().await, Some(70.8));
        assert_eq!(classic.current_flow_rate().await, Some(2.5));
    }

    #[tokio::test]
    async fn test_line_numbers_absent_are_none() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"online_status": {"v": "online"}}));
        let device = classic_device(api);
        device.async_update_data().await.unwrap();

        let classic = device.as_classic().unwrap();
        assert_eq!(classic.hot_line_num().await, None);
        assert_eq!(classic.cold_line_num().await, None);
    }

    #[tokio::test]
    async fn test_empty_flow_record_is_none() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"flow": {}}));
        let device = classic_device(api);
        device.async_update_data().await.unwrap();

        assert_eq!(device.as_classic().unwrap().current_flow_rate().await, None);
    }

    #[tokio::test]
    async fn test_leak_test_running() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        api.set_state(json!({"sov_status": {"v": "LeakExp"}}));
        let device = classic_device(api);
        device.async_update_data().await.unwrap();

        assert!(device.as_classic().unwrap().leak_test_running().await);
    }

    #[tokio::test]
    async fn test_poll_sequence_calls() {
        let api = Arc::new(MockApiClient::with_plus_defaults());
        let device = classic_device(Arc::clone(&api));
        device.async_update_data().await.unwrap();

        assert_eq!(api.call_count("get_state"), 1);
        assert_eq!(api.call_count("get_consumption"), 1);
        // Classic devices have no preference or auto-shutoff endpoints.
        assert_eq!(api.call_count("get_device_preferences"), 0);
        assert_eq!(api.call_count("get_auto_shutoff_status"), 0);
    }
}
