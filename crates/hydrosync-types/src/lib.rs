//! Platform-agnostic types for HydroSync water-monitoring devices.
//!
//! This crate provides the shared data model used by the synchronization
//! engine in `hydrosync-core`:
//!
//! - The per-device attribute store ([`DeviceState`]) with its merge rules
//! - Device family codes ([`DeviceFamily`])
//! - The vendor valve status enum ([`ValveStatus`])
//! - Firmware version comparison ([`version::has_update`])
//!
//! Everything here is pure data manipulation: no async, no I/O.

pub mod family;
pub mod state;
pub mod valve;
pub mod version;

pub use family::DeviceFamily;
pub use state::DeviceState;
pub use valve::ValveStatus;
