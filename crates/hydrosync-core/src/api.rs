//! Vendor cloud API boundary.
//!
//! The HTTP client itself lives outside this crate; the engine only depends
//! on the narrow surface below. Each call is an independent asynchronous
//! request that may fail with a transport error. There is no atomicity
//! across calls, and retry policy (if any) belongs to the implementor.
//!
//! Payloads are opaque JSON: the vendor wire format is not modeled beyond
//! what the merge logic depends on, and unknown fields must survive a
//! round trip through [`DeviceState`](hydrosync_types::DeviceState).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One `(name, value)` preference pair, as written to the vendor API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePair {
    /// Preference name, e.g. `scheduler_enable`.
    pub name: String,
    /// String-encoded value, e.g. `"true"`.
    pub value: String,
}

impl PreferencePair {
    /// Create a preference pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Result of a device command such as a leak test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Vendor result code; `"success"` indicates acceptance.
    pub code: String,
    /// Optional human-readable detail.
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandOutcome {
    /// True iff the device accepted the command.
    pub fn is_success(&self) -> bool {
        self.code == "success"
    }
}

/// Asynchronous vendor API client.
///
/// Implemented outside this crate for the real cloud service and by
/// [`MockApiClient`](crate::mock::MockApiClient) for tests. All methods take
/// the target device id; home scoping is handled by the implementor.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetch the full device state snapshot.
    async fn get_state(&self, device_id: &str) -> Result<Value>;

    /// Fetch the rolling daily consumption summary.
    async fn get_consumption(&self, device_id: &str) -> Result<Value>;

    /// Fetch current device preferences.
    async fn get_device_preferences(&self, device_id: &str) -> Result<Vec<PreferencePair>>;

    /// Write device preferences. The engine always sends exactly one pair.
    async fn set_device_preferences(&self, device_id: &str, pairs: &[PreferencePair])
        -> Result<()>;

    /// Fetch the auto-shutoff feature status.
    async fn get_auto_shutoff_status(&self, device_id: &str) -> Result<Value>;

    /// Enable or disable the auto-shutoff feature.
    async fn set_auto_shutoff(&self, device_id: &str, enabled: bool) -> Result<()>;

    /// Fetch the health-test history, newest first.
    async fn get_health_tests(&self, device_id: &str) -> Result<Value>;

    /// Fetch metadata about the latest published firmware.
    async fn get_latest_firmware_info(&self, device_id: &str) -> Result<Value>;

    /// Fetch water-sensor statistics entries, newest first.
    async fn get_water_statistics(&self, device_id: &str) -> Result<Value>;

    /// Start a leak test. `extended` selects the long-running variant and is
    /// string-encoded on the wire (`"true"` / `"false"`).
    async fn run_leak_test(&self, device_id: &str, extended: &str) -> Result<CommandOutcome>;

    /// Open the shutoff valve.
    async fn open_valve(&self, device_id: &str) -> Result<()>;

    /// Close the shutoff valve.
    async fn close_valve(&self, device_id: &str) -> Result<()>;
}
