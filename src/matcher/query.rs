//! Search query construction from catalog fields.

use std::sync::LazyLock;

use regex::Regex;

/// Name suffixes (` - variant`, ` (1st edition)`) that the source search does not index.
static NAME_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\s+-|\s+\(").expect("name suffix regex is valid") // Static pattern, safe to panic
});

/// Display name up to the first ` -` or ` (`.
///
/// ```
/// use pricewatch_core::matcher::clean_card_name;
///
/// assert_eq!(clean_card_name("Charizard - Holo (Shadowless)"), "Charizard");
/// ```
#[must_use]
pub fn clean_card_name(name: &str) -> &str {
    NAME_SUFFIX
        .split(name)
        .next()
        .unwrap_or_default()
        .trim()
}

/// Serial number up to `/`, without leading zeros (`"004/102"` → `"4"`).
///
/// An all-zero number collapses to `"0"`.
#[must_use]
pub fn clean_card_number(number: &str) -> String {
    let head = number.split('/').next().unwrap_or_default().trim();
    if head.is_empty() {
        return String::new();
    }
    let stripped = head.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Search query for an item: clean name, then clean number if any.
#[must_use]
pub fn build_query(name: &str, number: Option<&str>) -> String {
    let name = clean_card_name(name);
    match number.map(clean_card_number).filter(|n| !n.is_empty()) {
        Some(number) => format!("{name} {number}").trim().to_string(),
        None => name.to_string(),
    }
}

/// Set label up to the first `:` (`"Base Set: Shadowless"` → `"Base Set"`).
#[must_use]
pub fn clean_set_label(label: &str) -> &str {
    label.split(':').next().unwrap_or_default().trim()
}
