//! Device family codes.

use serde::{Deserialize, Serialize};

/// Manufacturer name used for generic device naming.
pub const MANUFACTURER: &str = "HydroSync";

/// Product class of a monitored device.
///
/// Each family carries its own attribute schema and derived accessor set.
/// Family selection is a static table keyed by the vendor product code; the
/// code arrives already resolved from the external directory listing.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new families
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DeviceFamily {
    /// Mainline shutoff valve with flow, pressure and temperature sensing.
    Plus,
    /// Dual-line variant with two independent pressure/temperature readings.
    Classic,
    /// Battery-powered leak/humidity sensor.
    WaterSensor,
}

impl DeviceFamily {
    /// Resolve a family from a vendor product code.
    ///
    /// Unknown codes resolve to `None`; the caller logs and discards them.
    ///
    /// # Examples
    ///
    /// ```
    /// use hydrosync_types::DeviceFamily;
    ///
    /// assert_eq!(DeviceFamily::from_product_code("PP1"), Some(DeviceFamily::Plus));
    /// assert_eq!(DeviceFamily::from_product_code("PP2"), Some(DeviceFamily::Plus));
    /// assert_eq!(DeviceFamily::from_product_code("PC1"), Some(DeviceFamily::Classic));
    /// assert_eq!(DeviceFamily::from_product_code("PW1"), Some(DeviceFamily::WaterSensor));
    /// assert_eq!(DeviceFamily::from_product_code("UNKNOWN"), None);
    /// ```
    #[must_use]
    pub fn from_product_code(code: &str) -> Option<Self> {
        match code {
            "PP1" | "PP2" => Some(DeviceFamily::Plus),
            "PC1" => Some(DeviceFamily::Classic),
            "PW1" => Some(DeviceFamily::WaterSensor),
            _ => None,
        }
    }

    /// Human-readable family name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DeviceFamily::Plus => "Plus",
            DeviceFamily::Classic => "Classic",
            DeviceFamily::WaterSensor => "Water Sensor",
        }
    }

    /// True for families with a controllable shutoff valve.
    #[must_use]
    pub fn has_valve(&self) -> bool {
        matches!(self, DeviceFamily::Plus | DeviceFamily::Classic)
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_code_table() {
        assert_eq!(
            DeviceFamily::from_product_code("PP1"),
            Some(DeviceFamily::Plus)
        );
        assert_eq!(
            DeviceFamily::from_product_code("PC1"),
            Some(DeviceFamily::Classic)
        );
        assert_eq!(
            DeviceFamily::from_product_code("PW1"),
            Some(DeviceFamily::WaterSensor)
        );
        assert_eq!(DeviceFamily::from_product_code(""), None);
        assert_eq!(DeviceFamily::from_product_code("pp1"), None);
    }

    #[test]
    fn test_valve_capability() {
        assert!(DeviceFamily::Plus.has_valve());
        assert!(DeviceFamily::Classic.has_valve());
        assert!(!DeviceFamily::WaterSensor.has_valve());
    }
}
