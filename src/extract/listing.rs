//! Set listing pages and set discovery links.
//!
//! Listing pages use the same result table layout as search results
//! (`table#games_table`, falling back to `table.hover_table`). Further pages
//! are requested by POSTing the opaque token from the hidden
//! `input[name=cursor]` field; a page without that field is the last one.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{absolutize, clean_price, element_text, static_selector};

static PRIMARY_TABLE: LazyLock<Selector> = LazyLock::new(|| static_selector("table#games_table"));
static FALLBACK_TABLE: LazyLock<Selector> = LazyLock::new(|| static_selector("table.hover_table"));
static TABLE_ROW: LazyLock<Selector> = LazyLock::new(|| static_selector("tr"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| static_selector("td.title a"));
static USED_PRICE: LazyLock<Selector> =
    LazyLock::new(|| static_selector("td.used_price .js-price"));
static CURSOR_INPUT: LazyLock<Selector> = LazyLock::new(|| static_selector("input[name=cursor]"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| static_selector("a[href]"));

const PRODUCT_ROW_ID_PREFIX: &str = "product-";

/// One product row of a set listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    /// Source product id (`data-product` or the `product-N` row id).
    pub product_id: String,
    /// Card name with the `#number` suffix removed.
    pub name: String,
    /// Card number after the last `#`, if any.
    pub number: Option<String>,
    /// Absolute detail page URL.
    pub detail_url: String,
    /// Ungraded reference price.
    pub price: Option<f64>,
}

/// One parsed listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Product rows in page order.
    pub rows: Vec<ListingRow>,
    /// Token for the next page, if there is one.
    pub cursor: Option<String>,
}

/// A set linked from the category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLink {
    /// Display name of the set.
    pub name: String,
    /// Absolute listing URL.
    pub url: String,
}

/// The result table: primary layout first, then the alternate layout.
pub(crate) fn result_table(document: &Html) -> Option<ElementRef<'_>> {
    document
        .select(&PRIMARY_TABLE)
        .next()
        .or_else(|| document.select(&FALLBACK_TABLE).next())
}

/// Splits `"Charizard #4"` into `("Charizard", Some("4"))` at the last `#`.
#[must_use]
pub fn split_name_number(title: &str) -> (String, Option<String>) {
    match title.rsplit_once('#') {
        Some((name, number)) => {
            let number = number.trim();
            (
                name.trim().to_string(),
                (!number.is_empty()).then(|| number.to_string()),
            )
        }
        None => (title.trim().to_string(), None),
    }
}

fn row_product_id(row: ElementRef<'_>) -> Option<String> {
    let element = row.value();
    element
        .attr("data-product")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| {
            element
                .id()
                .and_then(|id| id.strip_prefix(PRODUCT_ROW_ID_PREFIX))
                .filter(|id| !id.is_empty())
        })
        .map(str::to_string)
}

/// Parses one page of a set listing.
#[must_use]
pub fn parse_listing_page(body: &str, base: &Url) -> ListingPage {
    let document = Html::parse_document(body);

    let Some(table) = result_table(&document) else {
        debug!("no listing table on page");
        return ListingPage::default();
    };

    let rows = table
        .select(&TABLE_ROW)
        .filter_map(|row| {
            let product_id = row_product_id(row)?;
            let link = row.select(&TITLE_LINK).next()?;
            let detail_url = absolutize(base, link.value().attr("href")?)?;
            let (name, number) = split_name_number(&element_text(link));
            let price = row
                .select(&USED_PRICE)
                .next()
                .and_then(|cell| clean_price(&element_text(cell)));
            Some(ListingRow {
                product_id,
                name,
                number,
                detail_url,
                price,
            })
        })
        .collect();

    let cursor = document
        .select(&CURSOR_INPUT)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    ListingPage { rows, cursor }
}

/// Collects set links under `path_prefix`, deduplicated by name.
///
/// Links named `skip_label` (the aggregate category page) are ignored.
#[must_use]
pub fn parse_set_links(body: &str, base: &Url, path_prefix: &str, skip_label: &str) -> Vec<SetLink> {
    let document = Html::parse_document(body);
    let mut seen = HashSet::new();

    document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            let path = Url::parse(href)
                .map(|url| url.path().to_string())
                .unwrap_or_else(|_| href.to_string());
            if !path.starts_with(path_prefix) {
                return None;
            }
            let name = element_text(anchor);
            if name.is_empty() || name == skip_label || !seen.insert(name.clone()) {
                return None;
            }
            Some(SetLink {
                name,
                url: absolutize(base, href)?,
            })
        })
        .collect()
}
