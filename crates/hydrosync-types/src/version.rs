//! Firmware version comparison.
//!
//! Vendor firmware versions have been observed as bare integers (`"100"`,
//! `"200"`) as well as dotted strings. Comparison is numeric when both
//! tokens parse as decimals and lexicographic otherwise, so `"90"` is not
//! considered newer than `"200"`.

/// True iff `latest` is strictly newer than `current`.
///
/// Equal tokens are never an update. Missing tokens are handled by the
/// caller (a device without firmware metadata reports "unknown", not
/// "stale"); this function only compares what it is given.
///
/// # Examples
///
/// ```
/// use hydrosync_types::version::has_update;
///
/// assert!(has_update("100", "200"));
/// assert!(!has_update("200", "100"));
/// assert!(!has_update("150", "150"));
/// ```
#[must_use]
pub fn has_update(current: &str, latest: &str) -> bool {
    let current = current.trim();
    let latest = latest.trim();
    match (current.parse::<f64>(), latest.parse::<f64>()) {
        (Ok(cur), Ok(new)) => new > cur,
        _ => latest > current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_numeric_comparison() {
        assert!(has_update("100", "200"));
        assert!(!has_update("200", "100"));
        assert!(!has_update("150", "150"));
        // Lexicographic comparison would get this one wrong.
        assert!(has_update("90", "200"));
    }

    #[test]
    fn test_decimal_comparison() {
        // "1.10" parses as 1.1, which is older than 1.5.
        assert!(!has_update("1.5", "1.10"));
        assert!(has_update("1.5", "2.0"));
    }

    #[test]
    fn test_lexicographic_fallback() {
        assert!(has_update("1.0.0", "2.0.0"));
        assert!(!has_update("2.0.0", "1.0.0"));
        assert!(!has_update("1.0.0", "1.0.0"));
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert!(has_update(" 100", "200 "));
    }

    proptest! {
        #[test]
        fn prop_equal_tokens_never_update(token in "[0-9]{1,6}") {
            prop_assert!(!has_update(&token, &token));
        }

        #[test]
        fn prop_numeric_ordering(a in 0u32..1_000_000, b in 0u32..1_000_000) {
            let result = has_update(&a.to_string(), &b.to_string());
            prop_assert_eq!(result, b > a);
        }

        #[test]
        fn prop_antisymmetric(a in 0u32..1_000_000, b in 0u32..1_000_000) {
            if a != b {
                let forward = has_update(&a.to_string(), &b.to_string());
                let backward = has_update(&b.to_string(), &a.to_string());
                prop_assert_ne!(forward, backward);
            }
        }
    }
}
