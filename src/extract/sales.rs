//! Grade-segmented sale tables on a product page.
//!
//! Each grade tier has a tab control and a content panel that share one
//! class. The tab also carries the `tab` class and is skipped. Inside the
//! panel every `tbody tr[id^='ebay-']` row is one completed sale.

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GradeTier, clean_price, element_text, parse_sale_date, static_selector};

const TAB_CLASS: &str = "tab";

static DIV: LazyLock<Selector> = LazyLock::new(|| static_selector("div"));
static SALE_ROW: LazyLock<Selector> = LazyLock::new(|| static_selector("tbody tr[id^='ebay-']"));
static DATE_CELL: LazyLock<Selector> = LazyLock::new(|| static_selector("td.date"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| static_selector("td.title a"));
static PRICE_CELL: LazyLock<Selector> = LazyLock::new(|| static_selector("td.numeric .js-price"));

/// One completed sale as listed on the product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Sale date, normalized from either accepted format.
    pub date: NaiveDate,
    /// Price cell text as shown.
    pub price_text: String,
    /// Numeric price parsed from `price_text`.
    pub price: f64,
    /// Marketplace listing URL.
    pub listing_url: String,
    /// Listing title.
    pub title: String,
}

/// Sales found for one grade tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSales {
    /// Grade label of the tier.
    pub grade: String,
    /// Sales in page order.
    pub sales: Vec<SaleRecord>,
}

#[derive(Debug, Clone, Copy)]
enum RowDefect {
    MissingDate,
    MissingPrice,
    MissingUrl,
    UnparseableDate,
}

/// Extracts sales for every tier, in tier order.
///
/// A tier whose content panel is absent yields an empty list.
#[must_use]
pub fn extract_sales(document: &Html, tiers: &[GradeTier]) -> Vec<GradeSales> {
    tiers
        .iter()
        .map(|tier| GradeSales {
            grade: tier.grade.clone(),
            sales: find_panel(document, &tier.section)
                .map(|panel| parse_panel(panel, &tier.grade))
                .unwrap_or_default(),
        })
        .collect()
}

/// True when any tier's tab or panel is present.
pub(crate) fn has_any_tier(document: &Html, tiers: &[GradeTier]) -> bool {
    document.select(&DIV).any(|div| {
        div.value()
            .classes()
            .any(|class| tiers.iter().any(|tier| tier.section == class))
    })
}

/// The first `div` carrying `section` but not the tab marker.
fn find_panel<'a>(document: &'a Html, section: &str) -> Option<ElementRef<'a>> {
    document.select(&DIV).find(|div| {
        let mut has_section = false;
        for class in div.value().classes() {
            if class == TAB_CLASS {
                return false;
            }
            if class == section {
                has_section = true;
            }
        }
        has_section
    })
}

fn parse_panel(panel: ElementRef<'_>, grade: &str) -> Vec<SaleRecord> {
    let mut sales = Vec::new();
    for row in panel.select(&SALE_ROW) {
        match parse_row(row) {
            Ok(sale) => sales.push(sale),
            Err(defect) => {
                debug!(
                    grade,
                    row_id = row.value().id().unwrap_or_default(),
                    ?defect,
                    "dropping sale row"
                );
            }
        }
    }
    sales
}

fn parse_row(row: ElementRef<'_>) -> Result<SaleRecord, RowDefect> {
    let date_text = row
        .select(&DATE_CELL)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .ok_or(RowDefect::MissingDate)?;

    let price_text = row
        .select(&PRICE_CELL)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .ok_or(RowDefect::MissingPrice)?;
    let price = clean_price(&price_text).ok_or(RowDefect::MissingPrice)?;

    let link = row.select(&TITLE_LINK).next().ok_or(RowDefect::MissingUrl)?;
    let listing_url = link
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or(RowDefect::MissingUrl)?
        .to_string();

    let date = parse_sale_date(&date_text).ok_or(RowDefect::UnparseableDate)?;

    Ok(SaleRecord {
        date,
        price_text,
        price,
        listing_url,
        title: element_text(link),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(id: &str, date: &str, price: &str, href: &str, title: &str) -> String {
        format!(
            r#"<tr id="{id}">
                <td class="date">{date}</td>
                <td class="title"><a href="{href}">{title}</a></td>
                <td class="numeric"><span class="js-price">{price}</span></td>
            </tr>"#
        )
    }

    fn page(panels: &str) -> Html {
        Html::parse_document(&format!("<html><body>{panels}</body></html>"))
    }

    fn tiers() -> Vec<GradeTier> {
        vec![
            GradeTier::new("completed-auctions-manual-only", "PSA 10"),
            GradeTier::new("completed-auctions-graded", "PSA 9"),
        ]
    }

    #[test]
    fn test_tab_control_is_skipped_in_favor_of_content_panel() {
        let html = page(&format!(
            r#"<div class="tab completed-auctions-manual-only">PSA 10</div>
               <div class="completed-auctions-manual-only"><table><tbody>{}</tbody></table></div>"#,
            row("ebay-1", "2024-11-03", "$100.00", "https://www.ebay.com/itm/1", "Charizard PSA 10")
        ));

        let grades = extract_sales(&html, &tiers());
        assert_eq!(grades[0].grade, "PSA 10");
        assert_eq!(grades[0].sales.len(), 1);
        let sale = &grades[0].sales[0];
        assert_eq!(sale.price, 100.0);
        assert_eq!(sale.price_text, "$100.00");
        assert_eq!(sale.listing_url, "https://www.ebay.com/itm/1");
        assert_eq!(sale.title, "Charizard PSA 10");
        assert_eq!(sale.date, NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
    }

    #[test]
    fn test_only_tab_present_yields_empty_tier() {
        let html = page(r#"<div class="tab completed-auctions-graded">PSA 9</div>"#);
        let grades = extract_sales(&html, &tiers());
        assert!(grades.iter().all(|g| g.sales.is_empty()));
        assert!(has_any_tier(&html, &tiers()));
    }

    #[test]
    fn test_absent_panel_yields_empty_list_not_error() {
        let html = page("<p>nothing here</p>");
        let grades = extract_sales(&html, &tiers());
        assert_eq!(grades.len(), 2);
        assert!(grades.iter().all(|g| g.sales.is_empty()));
        assert!(!has_any_tier(&html, &tiers()));
    }

    #[test]
    fn test_defective_rows_are_dropped() {
        let rows = [
            row("ebay-1", "Nov 3, 2024", "$50.00", "https://www.ebay.com/itm/1", "ok"),
            row("ebay-2", "03/11/2024", "$50.00", "https://www.ebay.com/itm/2", "bad date"),
            row("ebay-3", "", "$50.00", "https://www.ebay.com/itm/3", "no date"),
            row("ebay-4", "2024-11-04", "", "https://www.ebay.com/itm/4", "no price"),
            row("ebay-5", "2024-11-04", "$60.00", "", "no url"),
            row("other-6", "2024-11-04", "$60.00", "https://www.ebay.com/itm/6", "not a sale row"),
        ]
        .concat();
        let html = page(&format!(
            r#"<div class="completed-auctions-graded"><table><tbody>{rows}</tbody></table></div>"#
        ));

        let grades = extract_sales(&html, &tiers());
        let psa9 = &grades[1];
        assert_eq!(psa9.sales.len(), 1);
        assert_eq!(psa9.sales[0].title, "ok");
        assert_eq!(
            psa9.sales[0].date,
            NaiveDate::from_ymd_opt(2024, 11, 3).unwrap()
        );
    }

    #[test]
    fn test_rows_outside_tbody_are_ignored() {
        let html = page(&format!(
            r#"<div class="completed-auctions-graded"><table><thead>{}</thead></table></div>"#,
            row("ebay-1", "2024-11-03", "$10", "https://www.ebay.com/itm/1", "head")
        ));
        let grades = extract_sales(&html, &tiers());
        assert!(grades[1].sales.is_empty());
    }
}
