//! Per-device attribute store and merge rules.
//!
//! A [`DeviceState`] maps attribute names to JSON values. Values are either
//! scalars or small records carrying at least one of `v` (instant value) and
//! `mean` (windowed value). Readers treat `mean` strictly as a fallback when
//! `v` is absent; the two are never combined.
//!
//! Both update channels flow through the same merge path: a snapshot poll
//! overwrites every key it returns, a push delta overwrites only the keys it
//! carries. Keys absent from a payload keep their previous value, and no key
//! is ever deleted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mutable attribute store for a single device.
///
/// Owned exclusively by one device; callers synchronize access externally
/// (the engine holds a per-device lock across merge and notification).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    attrs: Map<String, Value>,
}

impl DeviceState {
    /// Create an empty state map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes currently held.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if no attribute has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Raw access to an attribute value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Merge a snapshot or delta payload.
    ///
    /// Every key present in `payload` replaces the stored value wholesale;
    /// keys absent from the payload are left untouched. Non-object payloads
    /// are ignored.
    pub fn merge(&mut self, payload: &Value) {
        if let Value::Object(map) = payload {
            for (key, value) in map {
                self.attrs.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge a push delta after normalizing vendor quirks.
    ///
    /// Deltas differ from snapshots in a few ways:
    /// - `sov_state` arrives as a bare string and is stored as
    ///   `sov_status: {"v": ...}` so readers see one shape.
    /// - `sensor_data` nests pressure/temperature records one level down;
    ///   its members are hoisted to top level.
    /// - `consumption` arrives as `{"v": ...}` but is stored as a scalar,
    ///   matching the snapshot shape.
    pub fn merge_delta(&mut self, delta: &Value) {
        let Value::Object(map) = delta else {
            return;
        };
        for (key, value) in map {
            match key.as_str() {
                "sov_state" => {
                    let mut record = Map::new();
                    record.insert("v".to_string(), value.clone());
                    self.attrs
                        .insert("sov_status".to_string(), Value::Object(record));
                }
                "sensor_data" => {
                    if let Value::Object(nested) = value {
                        for (k, v) in nested {
                            self.attrs.insert(k.clone(), v.clone());
                        }
                    }
                }
                "consumption" => {
                    let scalar = value.get("v").cloned().unwrap_or_else(|| value.clone());
                    self.attrs.insert(key.clone(), scalar);
                }
                _ => {
                    self.attrs.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Read a measurement, preferring `v` and falling back to `mean`.
    ///
    /// Returns `None` when the key is absent or neither field carries a
    /// number. A bare numeric scalar is accepted as-is.
    pub fn reading(&self, key: &str) -> Option<f64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::Object(record) => record
                .get("v")
                .and_then(Value::as_f64)
                .or_else(|| record.get("mean").and_then(Value::as_f64)),
            _ => None,
        }
    }

    /// Read the `v` field of a string-valued record, e.g. `online_status`.
    pub fn status(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)?.get("v")?.as_str()
    }

    /// Read a bare floating-point scalar.
    pub fn scalar_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key)?.as_f64()
    }

    /// Read a bare integer scalar. Absent keys are `None`, never zero.
    pub fn scalar_i64(&self, key: &str) -> Option<i64> {
        self.attrs.get(key)?.as_i64()
    }

    /// Read a bare string attribute, e.g. `serial_number`.
    pub fn scalar_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)?.as_str()
    }

    /// Read a bare boolean scalar.
    pub fn scalar_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key)?.as_bool()
    }
}
