//! Turning source documents into typed records.
//!
//! - [`sales`] - grade-segmented sale tables on a product page
//! - [`population`] - the optional grading census row
//! - [`listing`] - set listing pages (cursor pagination) and set discovery links
//! - [`grades`] - the section identifier → grade label table
//! - [`dates`] - the two accepted sale date formats
//!
//! Page-structure variance is expected: missing panels, tables and cells
//! degrade to empty results. Only a product page with none of the expected
//! structure at all is an error ([`ParseError::UnrecognizedPage`]).

pub mod dates;
mod error;
pub mod grades;
pub mod listing;
pub mod population;
pub mod sales;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use dates::parse_sale_date;
pub use error::ParseError;
pub use grades::{DEFAULT_GRADE_TIERS, GradeTier, default_grade_tiers};
pub use listing::{ListingPage, ListingRow, SetLink, parse_listing_page, parse_set_links};
pub use population::{PopulationReport, extract_population};
pub use sales::{GradeSales, SaleRecord, extract_sales};

static NON_PRICE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^\d.]").expect("price regex is valid") // Static pattern, safe to panic
});

/// Compiles a selector written into the source as a literal.
#[allow(clippy::expect_used)]
pub(crate) fn static_selector(selector: &'static str) -> Selector {
    Selector::parse(selector).expect("static selector is valid") // Static pattern, safe to panic
}

/// Strips everything but digits and `.` from a price text and parses it.
///
/// Returns `None` for text without a positive, finite number.
///
/// ```
/// use pricewatch_core::extract::clean_price;
///
/// assert_eq!(clean_price("$1,234.50"), Some(1234.5));
/// assert_eq!(clean_price("N/A"), None);
/// ```
#[must_use]
pub fn clean_price(text: &str) -> Option<f64> {
    let cleaned = NON_PRICE_CHARS.replace_all(text, "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
}

/// Collapsed, trimmed text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves `href` against `base`; absolute links pass through unchanged.
pub(crate) fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|url| url.to_string())
}

/// A parsed product page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPage {
    /// Sales per grade tier, in tier order. Tiers without a panel are empty.
    pub grades: Vec<GradeSales>,
    /// Census counts; empty when the page has no population table.
    pub population: PopulationReport,
}

impl ProductPage {
    /// Total number of sale records across all grades.
    #[must_use]
    pub fn total_sales(&self) -> usize {
        self.grades.iter().map(|grade| grade.sales.len()).sum()
    }
}

/// Parses a product detail page.
///
/// # Errors
///
/// Returns [`ParseError::UnrecognizedPage`] when the document contains no
/// grade tier element (tab or panel) and no population table.
pub fn parse_product_page(
    url: &str,
    body: &str,
    tiers: &[GradeTier],
) -> Result<ProductPage, ParseError> {
    let document = Html::parse_document(body);

    if !sales::has_any_tier(&document, tiers) && !population::has_population_table(&document) {
        return Err(ParseError::unrecognized_page(url));
    }

    Ok(ProductPage {
        grades: extract_sales(&document, tiers),
        population: extract_population(&document),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_price_strips_currency_and_separators() {
        assert_eq!(clean_price("$100.00"), Some(100.0));
        assert_eq!(clean_price(" $2,500 "), Some(2500.0));
    }

    #[test]
    fn test_clean_price_rejects_empty_and_zero() {
        assert_eq!(clean_price(""), None);
        assert_eq!(clean_price("$0.00"), None);
        assert_eq!(clean_price("1.2.3"), None);
    }

    #[test]
    fn test_absolutize_relative_and_absolute() {
        let base = Url::parse("https://www.pricecharting.com/search-products?q=x").unwrap();
        assert_eq!(
            absolutize(&base, "/game/pokemon-base-set/charizard-4").as_deref(),
            Some("https://www.pricecharting.com/game/pokemon-base-set/charizard-4")
        );
        assert_eq!(
            absolutize(&base, "https://www.ebay.com/itm/123").as_deref(),
            Some("https://www.ebay.com/itm/123")
        );
        assert_eq!(absolutize(&base, "  "), None);
    }

    #[test]
    fn test_parse_product_page_rejects_unrecognized_document() {
        let result = parse_product_page(
            "https://example.com/game/x",
            "<html><body><h1>Access denied</h1></body></html>",
            &default_grade_tiers(),
        );
        assert!(matches!(result, Err(ParseError::UnrecognizedPage { .. })));
    }

    #[test]
    fn test_parse_product_page_accepts_population_only_page() {
        let body = r#"<table class="population"><tbody><tr>
            <td class="numeric">1,024</td><td class="numeric">12</td>
        </tr></tbody></table>"#;
        let page =
            parse_product_page("https://example.com/game/x", body, &default_grade_tiers()).unwrap();
        assert_eq!(page.total_sales(), 0);
        assert_eq!(page.population.len(), 2);
        assert_eq!(page.grades.len(), default_grade_tiers().len());
    }
}
