//! Numeric formatting for table cells.

/// Magnitudes below this threshold are displayed as a plain `0`.
pub const ZERO_THRESHOLD: f64 = 1e-12;

/// Number of decimal digits kept before trimming.
pub const DECIMALS: usize = 6;

/// Formats a value for display in the report.
///
/// Values with a magnitude below [`ZERO_THRESHOLD`] render as `"0"`.  Everything else is rounded
/// to [`DECIMALS`] places and stripped of trailing zeros and a dangling decimal point, so `1.5`
/// renders as `"1.5"` and `-2.0` as `"-2"`.
pub fn format_number(value: f64) -> String {
    if value.abs() < ZERO_THRESHOLD {
        return "0".to_owned();
    }

    let mut text = format!("{:.*}", DECIMALS, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    // Tiny negatives round to "-0.000000".
    if text == "-0" {
        text.remove(0);
    }
    text
}

/// Formats an optional value, rendering `None` as an empty cell.
pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_reference_values() {
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(1e-13), "0");
        assert_eq!(format_number(-2.0), "-2");
    }

    #[test]
    fn keeps_integral_digits() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-2500.25), "-2500.25");
    }

    #[test]
    fn rounds_to_six_places() {
        assert_eq!(format_number(0.123_456_789), "0.123457");
        assert_eq!(format_number(2.000_000_4), "2");
    }

    #[test]
    fn tiny_negative_is_plain_zero() {
        assert_eq!(format_number(-1e-13), "0");
        assert_eq!(format_number(-1e-8), "0");
    }

    #[test]
    fn optional_none_is_empty() {
        assert_eq!(format_optional(None), "");
        assert_eq!(format_optional(Some(0.25)), "0.25");
    }

    proptest! {
        #[test]
        fn near_zero_renders_zero(x in -ZERO_THRESHOLD..ZERO_THRESHOLD) {
            prop_assume!(x.abs() < ZERO_THRESHOLD);
            prop_assert_eq!(format_number(x), "0");
        }

        #[test]
        fn output_is_trimmed_and_close(x in prop_oneof![-1e9..-ZERO_THRESHOLD, ZERO_THRESHOLD..1e9]) {
            let text = format_number(x);
            if text.contains('.') {
                prop_assert!(!text.ends_with('0'), "trailing zero in {}", text);
            }
            prop_assert!(!text.ends_with('.'), "trailing point in {}", text);
            let parsed: f64 = text.parse().unwrap();
            prop_assert!((parsed - x).abs() <= 1e-6, "{} parsed as {}", x, parsed);
        }
    }
}
