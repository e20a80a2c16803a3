//! Error types for hydrosync-core.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Transport`] | Wait for next cycle | The vendor client owns retry policy |
//! | [`Error::Timeout`] | Wait for next cycle | One slow device must not stall the fleet |
//! | [`Error::RefreshFailed`] | Inspect per-device causes | Healthy devices already merged fresh state |
//! | [`Error::Setup`] | Release acquired resources, retry setup | Channel may already be connected |
//! | [`Error::Command`] | Report to user | Device rejected the command |
//! | [`Error::UnknownDevice`] | Do not retry | Delta targeted a device we do not own |
//! | [`Error::InvalidConfig`] | Fix configuration and restart | Programming error |
//!
//! Validation failures on preference writes are deliberately not errors:
//! they are signaled by a `None` return and never reach this enum.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the synchronization engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport-level failure from the vendor API client.
    #[error("transport error{}: {message}", device_context(.device_id))]
    Transport {
        /// Device the call was issued for, when known.
        device_id: Option<String>,
        /// Description from the underlying client.
        message: String,
    },

    /// A per-device operation exceeded its deadline.
    #[error("operation '{operation}' for device {device_id} timed out after {duration:?}")]
    Timeout {
        /// The device being updated.
        device_id: String,
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// One refresh cycle finished with at least one device failing its
    /// primary state fetch. Devices that succeeded keep their merged state.
    #[error("refresh failed for {} of {attempted} device(s): {}", .failures.len(), summarize(.failures))]
    RefreshFailed {
        /// Devices attempted this cycle.
        attempted: usize,
        /// Identity and cause for every failed device.
        failures: Vec<DeviceFailure>,
    },

    /// Message-channel subscription or connection failed during setup.
    #[error("setup failed for device {device_id}: {message}")]
    Setup {
        /// The device being set up.
        device_id: String,
        /// Description of the failure.
        message: String,
    },

    /// The device rejected a command (leak test, valve operation).
    #[error("command '{command}' rejected by device {device_id}: {code}{}", message_context(.message))]
    Command {
        /// The device the command targeted.
        device_id: String,
        /// The command that was rejected.
        command: String,
        /// Vendor result code.
        code: String,
        /// Optional vendor message.
        message: Option<String>,
    },

    /// A command targeted a device id not present in the fleet.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// A command targeted a device family that does not support it.
    #[error("operation '{operation}' not supported by device {device_id}")]
    Unsupported {
        /// The device the command targeted.
        device_id: String,
        /// The unsupported operation.
        operation: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Identity and cause of one device's failure within a refresh cycle.
#[derive(Debug)]
pub struct DeviceFailure {
    /// The failing device.
    pub device_id: String,
    /// What went wrong.
    pub cause: Error,
}

fn device_context(device_id: &Option<String>) -> String {
    match device_id {
        Some(id) => format!(" for device {id}"),
        None => String::new(),
    }
}

fn message_context(message: &Option<String>) -> String {
    match message {
        Some(msg) => format!(" ({msg})"),
        None => String::new(),
    }
}

fn summarize(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(|f| f.device_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a transport error with device context.
    pub fn transport(device_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            device_id: Some(device_id.into()),
            message: message.into(),
        }
    }

    /// Create a transport error without device context.
    pub fn transport_anonymous(message: impl Into<String>) -> Self {
        Self::Transport {
            device_id: None,
            message: message.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(
        device_id: impl Into<String>,
        operation: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self::Timeout {
            device_id: device_id.into(),
            operation: operation.into(),
            duration,
        }
    }

    /// Create a setup error.
    pub fn setup(device_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            device_id: device_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using hydrosync-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport("dev-1", "connection reset");
        assert!(err.to_string().contains("dev-1"));
        assert!(err.to_string().contains("connection reset"));

        let err = Error::transport_anonymous("dns failure");
        assert_eq!(err.to_string(), "transport error: dns failure");

        let err = Error::timeout("dev-2", "get_state", Duration::from_secs(10));
        assert!(err.to_string().contains("get_state"));
        assert!(err.to_string().contains("10s"));

        let err = Error::UnknownDevice("dev-9".to_string());
        assert_eq!(err.to_string(), "unknown device: dev-9");
    }

    #[test]
    fn test_refresh_failed_names_devices() {
        let err = Error::RefreshFailed {
            attempted: 3,
            failures: vec![DeviceFailure {
                device_id: "dev-2".to_string(),
                cause: Error::transport("dev-2", "boom"),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("1 of 3"));
        assert!(text.contains("dev-2"));
    }

    #[test]
    fn test_command_error_with_message() {
        let err = Error::Command {
            device_id: "dev-1".to_string(),
            command: "leak_test".to_string(),
            code: "error".to_string(),
            message: Some("Test failed".to_string()),
        };
        assert!(err.to_string().contains("Test failed"));
    }
}
