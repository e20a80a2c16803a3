//! Water-sensor family: battery-powered leak sensor reporting humidity,
//! temperature and alert flags through a statistics time series.

use serde_json::Value;

use hydrosync_types::family::MANUFACTURER;

use crate::error::Result;

use super::DeviceCore;

/// A water-sensor device.
#[derive(Debug)]
pub struct WaterSensorDevice {
    pub(crate) core: DeviceCore,
}

impl WaterSensorDevice {
    pub(crate) fn new(core: DeviceCore) -> Self {
        Self { core }
    }

    /// Poll sequence: primary state snapshot, then the statistics series
    /// and firmware metadata.
    pub(crate) async fn update_data(&self) -> Result<()> {
        let mut shared = self.core.shared.lock().await;
        self.core.update_state(&mut shared).await?;
        self.core.update_water_statistics(&mut shared).await;
        self.core.update_firmware_info(&mut shared).await;
        Ok(())
    }

    /// User-assigned name, falling back to a generic manufacturer-prefixed
    /// name when none has been set.
    pub async fn device_name(&self) -> String {
        let shared = self.core.shared.lock().await;
        match shared.state.scalar_str("name") {
            Some(name) => name.to_string(),
            None => format!("{MANUFACTURER} {}", self.core.family().name()),
        }
    }

    /// Battery level percentage from the latest statistics entry.
    pub async fn battery(&self) -> Option<i64> {
        let shared = self.core.shared.lock().await;
        shared
            .latest_statistics
            .as_ref()?
            .get("battery_level")?
            .as_i64()
    }

    /// Relative humidity from the first element of the humidity series.
    pub async fn humidity(&self) -> Option<f64> {
        self.series_value("humidity").await
    }

    /// Ambient temperature from the first element of the temperature series.
    pub async fn temperature(&self) -> Option<f64> {
        self.series_value("temperature").await
    }

    /// High-humidity alert from the latest statistics entry.
    pub async fn high_humidity(&self) -> Option<bool> {
        self.alert_flag("high_humidity").await
    }

    /// Low-humidity alert from the latest statistics entry.
    pub async fn low_humidity(&self) -> Option<bool> {
        self.alert_flag("low_humidity").await
    }

    /// Low-temperature alert from the latest statistics entry.
    pub async fn low_temperature(&self) -> Option<bool> {
        self.alert_flag("low_temperature").await
    }

    /// Water-detected alert from the latest statistics entry.
    pub async fn water_detected(&self) -> Option<bool> {
        self.alert_flag("water").await
    }

    async fn series_value(&self, key: &str) -> Option<f64> {
        let shared = self.core.shared.lock().await;
        shared
            .latest_statistics
            .as_ref()?
            .get(key)?
            .as_array()?
            .first()?
            .get("value")?
            .as_f64()
    }

    async fn alert_flag(&self, name: &str) -> Option<bool> {
        let shared = self.core.shared.lock().await;
        shared
            .latest_statistics
            .as_ref()?
            .get("alerts")?
            .get(name)
            .and_then(Value::as_bool)
    }
}
