//! Vendor shutoff-valve status.

use serde::{Deserialize, Serialize};

/// Status reported by the shutoff valve.
///
/// The vendor enum is small but ambiguous: `Partial` means the valve is
/// physically mid-travel and says nothing about where it will settle. The
/// engine layers a three-state view (open / closed / transitioning) over a
/// remembered last-settled bit; see the device module in `hydrosync-core`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValveStatus {
    /// Valve fully open.
    Open,
    /// Valve fully closed.
    Closed,
    /// Valve in transition between open and closed.
    Partial,
    /// Leak test in progress.
    LeakExp,
    /// Unrecognized vendor string, preserved verbatim.
    Unknown(String),
}

impl ValveStatus {
    /// Parse a vendor status string.
    ///
    /// Unrecognized strings are preserved rather than rejected; the vendor
    /// has shipped new statuses before.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Open" => ValveStatus::Open,
            "Closed" => ValveStatus::Closed,
            "Partial" => ValveStatus::Partial,
            "LeakExp" => ValveStatus::LeakExp,
            other => ValveStatus::Unknown(other.to_string()),
        }
    }

    /// The settled boolean position, if the status is unambiguous.
    #[must_use]
    pub fn settled_open(&self) -> Option<bool> {
        match self {
            ValveStatus::Open => Some(true),
            ValveStatus::Closed => Some(false),
            _ => None,
        }
    }

    /// Vendor string for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ValveStatus::Open => "Open",
            ValveStatus::Closed => "Closed",
            ValveStatus::Partial => "Partial",
            ValveStatus::LeakExp => "LeakExp",
            ValveStatus::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for ValveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(ValveStatus::parse("Open"), ValveStatus::Open);
        assert_eq!(ValveStatus::parse("Closed"), ValveStatus::Closed);
        assert_eq!(ValveStatus::parse("Partial"), ValveStatus::Partial);
        assert_eq!(ValveStatus::parse("LeakExp"), ValveStatus::LeakExp);
    }

    #[test]
    fn test_parse_preserves_unknown() {
        let status = ValveStatus::parse("Maintenance");
        assert_eq!(status, ValveStatus::Unknown("Maintenance".to_string()));
        assert_eq!(status.as_str(), "Maintenance");
    }

    #[test]
    fn test_settled_open() {
        assert_eq!(ValveStatus::Open.settled_open(), Some(true));
        assert_eq!(ValveStatus::Closed.settled_open(), Some(false));
        assert_eq!(ValveStatus::Partial.settled_open(), None);
        assert_eq!(ValveStatus::LeakExp.settled_open(), None);
    }
}
