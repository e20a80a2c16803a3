//! Mock collaborators for testing.
//!
//! This module provides a mock vendor API client and message channel so the
//! engine can be exercised without network access.
//!
//! # Features
//!
//! - **Failure injection**: fail specific endpoints, globally or per device
//! - **Latency simulation**: add artificial delays to simulate slow calls
//! - **Call recording**: counters per endpoint plus full write capture

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiClient, CommandOutcome, PreferencePair};
use crate::channel::MessageChannel;
use crate::error::{Error, Result};

/// A mock vendor API client.
///
/// Responses are canned JSON payloads set per endpoint; every call is
/// recorded. Use [`MockApiClient::with_plus_defaults`] for a payload set
/// matching a healthy Plus device.
pub struct MockApiClient {
    responses: RwLock<HashMap<&'static str, Value>>,
    preferences: RwLock<Vec<PreferencePair>>,
    leak_test_outcome: RwLock<CommandOutcome>,
    /// Endpoints set to fail: `(endpoint, None)` fails for every device,
    /// `(endpoint, Some(id))` for one.
    failing: RwLock<HashSet<(String, Option<String>)>>,
    call_counts: RwLock<HashMap<String, usize>>,
    preference_writes: RwLock<Vec<(String, Vec<PreferencePair>)>>,
    auto_shutoff_writes: RwLock<Vec<(String, bool)>>,
    valve_calls: RwLock<Vec<(String, &'static str)>>,
    leak_test_calls: RwLock<Vec<(String, String)>>,
    latency_ms: AtomicU64,
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockApiClient")
            .field("latency_ms", &self.latency_ms.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockApiClient {
    /// Create a mock with empty responses.
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            preferences: RwLock::new(Vec::new()),
            leak_test_outcome: RwLock::new(CommandOutcome {
                code: "success".to_string(),
                message: None,
            }),
            failing: RwLock::new(HashSet::new()),
            call_counts: RwLock::new(HashMap::new()),
            preference_writes: RwLock::new(Vec::new()),
            auto_shutoff_writes: RwLock::new(Vec::new()),
            valve_calls: RwLock::new(Vec::new()),
            leak_test_calls: RwLock::new(Vec::new()),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Create a mock answering like a healthy Plus device.
    pub fn with_plus_defaults() -> Self {
        let mock = Self::new();
        mock.set_state(json!({
            "product_code": "PP1",
            "serial_number": "test-serial",
            "fw_version": "1.0.0",
            "online_status": {"v": "online"},
            "sov_status": {"v": "Open"},
            "flow": {"v": 1.5},
            "pressure": {"v": 45.5},
            "temperature": {"v": 72.0},
        }));
        mock.set_consumption(json!({"water_consumption": 150.5}));
        mock.set_auto_shutoff(json!({"auto_shutoff_enable": true}));
        mock.set_health_tests(json!({"data": []}));
        mock.set_firmware_info(json!([{
            "fw_version": "2.0.0",
            "release_notes": "http://example.com/release-notes",
        }]));
        mock.set_water_statistics(json!([]));
        mock.set_preferences(vec![
            PreferencePair::new("leak_sensitivity_away_mode", "false"),
            PreferencePair::new("scheduler_enable", "true"),
        ]);
        mock
    }

    /// Replace the `get_state` payload.
    pub fn set_state(&self, payload: Value) {
        self.responses.write().unwrap().insert("get_state", payload);
    }

    /// Replace the `get_consumption` payload.
    pub fn set_consumption(&self, payload: Value) {
        self.responses
            .write()
            .unwrap()
            .insert("get_consumption", payload);
    }

    /// Replace the `get_auto_shutoff_status` payload.
    pub fn set_auto_shutoff(&self, payload: Value) {
        self.responses
            .write()
            .unwrap()
            .insert("get_auto_shutoff_status", payload);
    }

    /// Replace the `get_health_tests` payload.
    pub fn set_health_tests(&self, payload: Value) {
        self.responses
            .write()
            .unwrap()
            .insert("get_health_tests", payload);
    }

    /// Replace the `get_latest_firmware_info` payload.
    pub fn set_firmware_info(&self, payload: Value) {
        self.responses
            .write()
            .unwrap()
            .insert("get_latest_firmware_info", payload);
    }

    /// Replace the `get_water_statistics` payload.
    pub fn set_water_statistics(&self, payload: Value) {
        self.responses
            .write()
            .unwrap()
            .insert("get_water_statistics", payload);
    }

    /// Replace the preference list returned by `get_device_preferences`.
    pub fn set_preferences(&self, pairs: Vec<PreferencePair>) {
        *self.preferences.write().unwrap() = pairs;
    }

    /// Replace the leak-test outcome.
    pub fn set_leak_test_outcome(&self, outcome: CommandOutcome) {
        *self.leak_test_outcome.write().unwrap() = outcome;
    }

    /// Fail `endpoint` for every device until cleared.
    pub fn fail_endpoint(&self, endpoint: &str) {
        self.failing
            .write()
            .unwrap()
            .insert((endpoint.to_string(), None));
    }

    /// Fail `endpoint` for one device only.
    pub fn fail_endpoint_for(&self, endpoint: &str, device_id: &str) {
        self.failing
            .write()
            .unwrap()
            .insert((endpoint.to_string(), Some(device_id.to_string())));
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing.write().unwrap().clear();
    }

    /// Simulate per-call latency.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of calls made to `endpoint`, across all devices.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.call_counts
            .read()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Every `set_device_preferences` call: `(device_id, pairs)`.
    pub fn preference_writes(&self) -> Vec<(String, Vec<PreferencePair>)> {
        self.preference_writes.read().unwrap().clone()
    }

    /// Every `set_auto_shutoff` call: `(device_id, enabled)`.
    pub fn auto_shutoff_writes(&self) -> Vec<(String, bool)> {
        self.auto_shutoff_writes.read().unwrap().clone()
    }

    /// Every valve command: `(device_id, "open" | "close")`.
    pub fn valve_calls(&self) -> Vec<(String, &'static str)> {
        self.valve_calls.read().unwrap().clone()
    }

    /// Every `run_leak_test` call: `(device_id, extended)`.
    pub fn leak_test_calls(&self) -> Vec<(String, String)> {
        self.leak_test_calls.read().unwrap().clone()
    }

    /// Record a call, apply latency, then fail if injected to.
    async fn record(&self, endpoint: &'static str, device_id: &str) -> Result<()> {
        *self
            .call_counts
            .write()
            .unwrap()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;

        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let failing = self.failing.read().unwrap();
        if failing.contains(&(endpoint.to_string(), None))
            || failing.contains(&(endpoint.to_string(), Some(device_id.to_string())))
        {
            return Err(Error::transport(device_id, format!("mock {endpoint} failure")));
        }
        Ok(())
    }

    fn response(&self, endpoint: &str) -> Value {
        self.responses
            .read()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn get_state(&self, device_id: &str) -> Result<Value> {
        self.record("get_state", device_id).await?;
        Ok(self.response("get_state"))
    }

    async fn get_consumption(&self, device_id: &str) -> Result<Value> {
        self.record("get_consumption", device_id).await?;
        Ok(self.response("get_consumption"))
    }

    async fn get_device_preferences(&self, device_id: &str) -> Result<Vec<PreferencePair>> {
        self.record("get_device_preferences", device_id).await?;
        Ok(self.preferences.read().unwrap().clone())
    }

    async fn set_device_preferences(
        &self,
        device_id: &str,
        pairs: &[PreferencePair],
    ) -> Result<()> {
        self.record("set_device_preferences", device_id).await?;
        self.preference_writes
            .write()
            .unwrap()
            .push((device_id.to_string(), pairs.to_vec()));
        Ok(())
    }

    async fn get_auto_shutoff_status(&self, device_id: &str) -> Result<Value> {
        self.record("get_auto_shutoff_status", device_id).await?;
        Ok(self.response("get_auto_shutoff_status"))
    }

    async fn set_auto_shutoff(&self, device_id: &str, enabled: bool) -> Result<()> {
        self.record("set_auto_shutoff", device_id).await?;
        self.auto_shutoff_writes
            .write()
            .unwrap()
            .push((device_id.to_string(), enabled));
        Ok(())
    }

    async fn get_health_tests(&self, device_id: &str) -> Result<Value> {
        self.record("get_health_tests", device_id).await?;
        Ok(self.response("get_health_tests"))
    }

    async fn get_latest_firmware_info(&self, device_id: &str) -> Result<Value> {
        self.record("get_latest_firmware_info", device_id).await?;
        Ok(self.response("get_latest_firmware_info"))
    }

    async fn get_water_statistics(&self, device_id: &str) -> Result<Value> {
        self.record("get_water_statistics", device_id).await?;
        Ok(self.response("get_water_statistics"))
    }

    async fn run_leak_test(&self, device_id: &str, extended: &str) -> Result<CommandOutcome> {
        self.record("run_leak_test", device_id).await?;
        self.leak_test_calls
            .write()
            .unwrap()
            .push((device_id.to_string(), extended.to_string()));
        Ok(self.leak_test_outcome.read().unwrap().clone())
    }

    async fn open_valve(&self, device_id: &str) -> Result<()> {
        self.record("open_valve", device_id).await?;
        self.valve_calls
            .write()
            .unwrap()
            .push((device_id.to_string(), "open"));
        Ok(())
    }

    async fn close_valve(&self, device_id: &str) -> Result<()> {
        self.record("close_valve", device_id).await?;
        self.valve_calls
            .write()
            .unwrap()
            .push((device_id.to_string(), "close"));
        Ok(())
    }
}

/// A mock message channel that records connections and subscriptions.
#[derive(Debug, Default)]
pub struct MockChannel {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_subscribe: AtomicBool,
    subscriptions: RwLock<Vec<String>>,
    disconnect_count: AtomicU64,
}

impl MockChannel {
    /// Create a disconnected mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` call fail.
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::Relaxed);
    }

    /// Make `subscribe` calls fail.
    pub fn fail_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::Relaxed);
    }

    /// True once `connect` has succeeded and no disconnect followed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Topics subscribed so far, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().unwrap().clone()
    }

    /// Number of `disconnect_and_wait` calls.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    async fn connect(&self) -> Result<()> {
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::transport_anonymous("mock connect failure"));
        }
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect_and_wait(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(Error::transport_anonymous(format!(
                "mock subscribe failure for {topic}"
            )));
        }
        self.subscriptions.write().unwrap().push(topic.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_injection_per_device() {
        let mock = MockApiClient::with_plus_defaults();
        mock.fail_endpoint_for("get_state", "dev-2");

        assert!(mock.get_state("dev-1").await.is_ok());
        assert!(mock.get_state("dev-2").await.is_err());
        assert_eq!(mock.call_count("get_state"), 2);

        mock.clear_failures();
        assert!(mock.get_state("dev-2").await.is_ok());
    }

    #[tokio::test]
    async fn test_latency_simulation() {
        let mock = MockApiClient::with_plus_defaults();
        mock.set_latency(Duration::from_millis(20));

        let start = tokio::time::Instant::now();
        mock.get_state("dev-1").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_channel_records_lifecycle() {
        let channel = MockChannel::new();
        channel.connect().await.unwrap();
        assert!(channel.is_connected());

        channel.subscribe("prd/app_subscriptions/dev-1").await.unwrap();
        assert_eq!(channel.subscriptions().len(), 1);

        channel.disconnect_and_wait().await.unwrap();
        assert!(!channel.is_connected());
        assert_eq!(channel.disconnect_count(), 1);
    }
}
