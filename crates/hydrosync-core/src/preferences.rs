//! Per-family preference allow-lists.
//!
//! A preference write is attempted only if both the name and the value pass
//! validation for the device's family; anything else is a silent no-op at
//! the device layer. The registry is static: the vendor API rejects unknown
//! names with an opaque 500, so filtering here keeps bad writes off the
//! wire entirely.

use hydrosync_types::DeviceFamily;

/// Away-mode leak sensitivity toggle.
pub const PREF_AWAY_MODE: &str = "leak_sensitivity_away_mode";

/// Scheduled (nightly) leak test toggle.
pub const PREF_SCHEDULER: &str = "scheduler_enable";

/// Boolean value domain as string-encoded on the wire.
const BOOL_VALUES: &[&str] = &["true", "false"];

/// Allowed preference names and their value domains for a family.
///
/// Classic and water-sensor devices currently expose no writable
/// preferences; their table is empty rather than absent so callers get a
/// uniform lookup.
fn family_table(family: DeviceFamily) -> &'static [(&'static str, &'static [&'static str])] {
    match family {
        DeviceFamily::Plus => &[(PREF_AWAY_MODE, BOOL_VALUES), (PREF_SCHEDULER, BOOL_VALUES)],
        DeviceFamily::Classic | DeviceFamily::WaterSensor => &[],
        // Future families start locked down until their schema is known.
        _ => &[],
    }
}

/// True iff `name` is a writable preference for `family`.
#[must_use]
pub fn is_known_name(family: DeviceFamily, name: &str) -> bool {
    family_table(family).iter().any(|(n, _)| *n == name)
}

/// Validate a `(name, value)` pair against the family's allow-list.
///
/// # Examples
///
/// ```
/// use hydrosync_core::preferences::validate;
/// use hydrosync_types::DeviceFamily;
///
/// assert!(validate(DeviceFamily::Plus, "scheduler_enable", "true"));
/// assert!(!validate(DeviceFamily::Plus, "scheduler_enable", "yes"));
/// assert!(!validate(DeviceFamily::Plus, "bogus", "true"));
/// ```
#[must_use]
pub fn validate(family: DeviceFamily, name: &str, value: &str) -> bool {
    family_table(family)
        .iter()
        .find(|(n, _)| *n == name)
        .is_some_and(|(_, domain)| domain.contains(&value))
}

/// String-encode a boolean for the vendor wire format.
#[must_use]
pub fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
