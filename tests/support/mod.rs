//! Shared fixtures for integration tests: an in-memory page source and
//! builders for the source site's page shapes.
//!
//! Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pricewatch_core::Database;
use pricewatch_core::fetch::{FetchError, FetchedPage, PageSource};
use pricewatch_core::matcher::Matcher;
use pricewatch_core::store::Store;
use pricewatch_core::sync::{ItemScraper, ProgressQueue, ScrapeSettings};
use tempfile::TempDir;

pub const BASE_URL: &str = "https://www.pricecharting.com";

/// Serves canned pages by URL and records every request.
///
/// Unknown URLs answer with [`FetchError::NotFound`].
#[derive(Debug, Default)]
pub struct FixturePages {
    gets: HashMap<String, FetchedPage>,
    posts: HashMap<(String, String), String>,
    requests: Mutex<Vec<String>>,
}

impl FixturePages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for a GET of `url`.
    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.redirect(url, url, body)
    }

    /// Serves `body` for a GET of `url`, reporting `final_url` as the address.
    pub fn redirect(mut self, url: &str, final_url: &str, body: impl Into<String>) -> Self {
        self.gets.insert(
            url.to_string(),
            FetchedPage {
                url: final_url.to_string(),
                body: body.into(),
            },
        );
        self
    }

    /// Serves `body` for a POST of `url` with `cursor=token`.
    pub fn cursor_page(mut self, url: &str, token: &str, body: impl Into<String>) -> Self {
        self.posts
            .insert((url.to_string(), token.to_string()), body.into());
        self
    }

    /// Every request so far, as `"GET url"` or `"POST url cursor=token"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    fn record(&self, line: String) {
        self.requests.lock().expect("request log poisoned").push(line);
    }
}

#[async_trait]
impl PageSource for FixturePages {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.record(format!("GET {url}"));
        self.gets
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::not_found(url))
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<FetchedPage, FetchError> {
        let token = fields
            .iter()
            .find(|(key, _)| *key == "cursor")
            .map(|(_, value)| (*value).to_string())
            .unwrap_or_default();
        self.record(format!("POST {url} cursor={token}"));
        self.posts
            .get(&(url.to_string(), token))
            .map(|body| FetchedPage {
                url: url.to_string(),
                body: body.clone(),
            })
            .ok_or_else(|| FetchError::not_found(url))
    }
}

/// A migrated database in a temp dir; keep the `TempDir` alive.
pub async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.db"))
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// A scraper over `db` reading pages from `pages`.
pub fn scraper(db: &Database, pages: Arc<FixturePages>) -> ItemScraper {
    let source: Arc<dyn PageSource> = pages;
    let matcher = Matcher::new(Arc::clone(&source), BASE_URL).expect("valid base URL");
    ItemScraper::new(
        Store::new(db.clone()),
        ProgressQueue::new(db.clone()),
        source,
        matcher,
        ScrapeSettings::default(),
    )
}

// ==================== Page builders ====================

/// Absolute URL under the fixture site.
pub fn site(path: &str) -> String {
    format!("{BASE_URL}{path}")
}

/// One grade tier's sales: section class plus `(date, price text)` pairs.
pub type Panel<'a> = (&'a str, &'a [(&'a str, &'a str)]);

pub fn panel<'a>(section: &'a str, sales: &'a [(&'a str, &'a str)]) -> Panel<'a> {
    (section, sales)
}

/// A product page with one sales panel per entry and an optional census row.
///
/// Each sale row links to a distinct listing.
pub fn product_page(panels: &[Panel<'_>], population: &[&str]) -> String {
    let mut html = String::from("<html><body>");
    let mut row_id = 0;
    for (section, sales) in panels {
        html.push_str(&format!(r#"<div class="tab {section}">tab</div>"#));
        html.push_str(&format!(r#"<div class="{section}"><table><tbody>"#));
        for (date, price) in *sales {
            row_id += 1;
            html.push_str(&format!(
                r#"<tr id="ebay-{row_id}">
                    <td class="date">{date}</td>
                    <td class="title"><a href="https://www.ebay.com/itm/{section}-{row_id}">Listing {row_id}</a></td>
                    <td class="numeric"><span class="js-price">{price}</span></td>
                </tr>"#
            ));
        }
        html.push_str("</tbody></table></div>");
    }
    if !population.is_empty() {
        html.push_str(r#"<table class="population"><tbody><tr>"#);
        for count in population {
            html.push_str(&format!(r#"<td class="numeric">{count}</td>"#));
        }
        html.push_str("</tr></tbody></table>");
    }
    html.push_str("</body></html>");
    html
}

/// A search results page; rows are `(title, href, set label)`.
pub fn search_page(rows: &[(&str, &str, &str)]) -> String {
    let mut html = String::from(r#"<table id="games_table"><tr><th>Name</th></tr>"#);
    for (index, (title, href, label)) in rows.iter().enumerate() {
        html.push_str(&format!(
            r#"<tr data-product="{index}">
                <td class="title"><a href="{href}">{title}</a></td>
                <td class="console">{label}</td>
            </tr>"#
        ));
    }
    html.push_str("</table>");
    html
}

/// A set listing page; rows are `(product id, title, href, price text)`.
pub fn listing_page(rows: &[(&str, &str, &str, &str)], cursor: Option<&str>) -> String {
    let mut html = String::new();
    if let Some(token) = cursor {
        html.push_str(&format!(
            r#"<form method="post"><input type="hidden" name="cursor" value="{token}"></form>"#
        ));
    }
    html.push_str(r#"<table id="games_table">"#);
    for (id, title, href, price) in rows {
        html.push_str(&format!(
            r#"<tr id="product-{id}">
                <td class="title"><a href="{href}">{title}</a></td>
                <td class="used_price"><span class="js-price">{price}</span></td>
            </tr>"#
        ));
    }
    html.push_str("</table>");
    html
}
