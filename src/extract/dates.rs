//! Sale date parsing.
//!
//! Exactly two formats are accepted: ISO `YYYY-MM-DD` and `Mon D, YYYY`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

const ISO_FORMAT: &str = "%Y-%m-%d";
const MONTH_NAME_FORMAT: &str = "%b %d, %Y";

// chrono lets a format space match zero whitespace; the separators are required here.
static MONTH_NAME_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z]{3}\s+\d{1,2},\s+\d{4}$").expect("date shape regex is valid") // Static pattern, safe to panic
});

/// Parses a sale date cell.
///
/// ```
/// use chrono::NaiveDate;
/// use pricewatch_core::extract::parse_sale_date;
///
/// let iso = parse_sale_date("2024-11-03");
/// assert_eq!(iso, NaiveDate::from_ymd_opt(2024, 11, 3));
/// assert_eq!(parse_sale_date("Nov 3, 2024"), iso);
/// assert_eq!(parse_sale_date("11/03/2024"), None);
/// ```
#[must_use]
pub fn parse_sale_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, ISO_FORMAT) {
        return Some(date);
    }
    if !MONTH_NAME_SHAPE.is_match(text) {
        return None;
    }
    NaiveDate::parse_from_str(text, MONTH_NAME_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_formats_normalize_to_same_iso_date() {
        let iso = parse_sale_date("2024-11-03");
        let named = parse_sale_date("Nov 3, 2024");
        assert!(iso.is_some());
        assert_eq!(iso, named);
        assert_eq!(
            named.map(|d| d.format("%Y-%m-%d").to_string()).as_deref(),
            Some("2024-11-03")
        );
    }

    #[test]
    fn test_zero_padded_day_and_surrounding_whitespace() {
        assert_eq!(
            parse_sale_date("  Jan 05, 2025 \n"),
            NaiveDate::from_ymd_opt(2025, 1, 5)
        );
    }

    #[test]
    fn test_month_name_accepts_wider_whitespace() {
        assert_eq!(
            parse_sale_date("Nov  3,  2024"),
            NaiveDate::from_ymd_opt(2024, 11, 3)
        );
    }

    #[test]
    fn test_other_formats_rejected() {
        for text in [
            "",
            "11/03/2024",
            "03.11.2024",
            "2024-11-03T10:00:00",
            "3 Nov 2024",
            "Nov 3,2024",
            "Nov3, 2024",
            "Nov 3 , 2024",
            "November 3, 2024",
            "2024-13-01",
            "yesterday",
        ] {
            assert_eq!(parse_sale_date(text), None, "should reject {text:?}");
        }
    }
}
