//! Resolving an item to its canonical product page.
//!
//! The source search either redirects straight to a detail page or returns a
//! result table. In the table case, the same card is often listed in several
//! sets, so candidates are scored by the similarity of their set label to the
//! item's set name.

mod error;
mod query;

use std::sync::{Arc, LazyLock};

use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::extract::listing::result_table;
use crate::extract::{absolutize, element_text, static_selector};
use crate::fetch::PageSource;

pub use error::MatchError;
pub use query::{build_query, clean_card_name, clean_card_number, clean_set_label};

/// Path fragment that identifies a product detail page.
pub const DEFAULT_DETAIL_MARKER: &str = "/game/";

/// Minimum set-label similarity a candidate needs to beat the first row.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

const SEARCH_PATH: &str = "search-products";

static CANDIDATE_ROW: LazyLock<Selector> = LazyLock::new(|| static_selector("tr[data-product]"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| static_selector("td.title a"));
static SET_LABEL: LazyLock<Selector> = LazyLock::new(|| static_selector("td.console"));

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Link text of the product.
    pub title: String,
    /// Absolute detail page URL.
    pub detail_url: String,
    /// Set label shown for the row, if any.
    pub set_label: Option<String>,
}

/// Strips the query string and fragment from a URL.
///
/// Unparseable input is cut at the first `?` instead.
///
/// ```
/// use pricewatch_core::matcher::canonicalize_url;
///
/// assert_eq!(
///     canonicalize_url("https://www.pricecharting.com/game/pokemon-base-set/charizard-4?q=charizard"),
///     "https://www.pricecharting.com/game/pokemon-base-set/charizard-4"
/// );
/// ```
#[must_use]
pub fn canonicalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Normalized similarity of two labels in `[0, 1]`, case- and padding-insensitive.
#[must_use]
pub fn label_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

/// Parses result rows from a search page.
#[must_use]
pub fn parse_candidates(body: &str, base: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(body);
    let Some(table) = result_table(&document) else {
        return Vec::new();
    };

    table
        .select(&CANDIDATE_ROW)
        .filter_map(|row| {
            let link = row.select(&TITLE_LINK).next()?;
            let detail_url = absolutize(base, link.value().attr("href")?)?;
            let set_label = row
                .select(&SET_LABEL)
                .next()
                .map(element_text)
                .filter(|label| !label.is_empty());
            Some(Candidate {
                title: element_text(link),
                detail_url,
                set_label,
            })
        })
        .collect()
}

/// Picks the best candidate for `target_set`.
///
/// The highest-scoring label wins when its score exceeds
/// [`SIMILARITY_THRESHOLD`]; ties keep the earlier row. Without a target, or
/// when nothing clears the threshold, the first row is returned.
#[must_use]
pub fn select_candidate<'a>(
    candidates: &'a [Candidate],
    target_set: Option<&str>,
) -> Option<&'a Candidate> {
    let first = candidates.first()?;
    let Some(target) = target_set else {
        return Some(first);
    };

    let mut best: Option<(&Candidate, f64)> = None;
    for candidate in candidates {
        let Some(label) = candidate.set_label.as_deref() else {
            continue;
        };
        let score = label_similarity(label, target);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((candidate, score)) if score > SIMILARITY_THRESHOLD => {
            debug!(label = ?candidate.set_label, score, "matched set label");
            Some(candidate)
        }
        _ => Some(first),
    }
}

/// Resolves search queries to canonical product URLs.
#[derive(Clone)]
pub struct Matcher {
    source: Arc<dyn PageSource>,
    base_url: Url,
    detail_marker: String,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("base_url", &self.base_url.as_str())
            .field("detail_marker", &self.detail_marker)
            .finish_non_exhaustive()
    }
}

impl Matcher {
    /// Creates a matcher searching under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidBaseUrl`] if `base_url` is not an absolute URL.
    pub fn new(source: Arc<dyn PageSource>, base_url: &str) -> Result<Self, MatchError> {
        let mut base = Url::parse(base_url).map_err(|_| MatchError::InvalidBaseUrl {
            url: base_url.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(MatchError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            source,
            base_url: base,
            detail_marker: DEFAULT_DETAIL_MARKER.to_string(),
        })
    }

    /// Overrides the detail page path marker.
    #[must_use]
    pub fn with_detail_marker(mut self, marker: impl Into<String>) -> Self {
        self.detail_marker = marker.into();
        self
    }

    /// Search URL for `query`.
    #[must_use]
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}{SEARCH_PATH}?type=prices&q={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// True when `url` points at a product detail page.
    #[must_use]
    pub fn is_detail_url(&self, url: &str) -> bool {
        Url::parse(url).map_or_else(
            |_| url.contains(&self.detail_marker),
            |parsed| parsed.path().contains(&self.detail_marker),
        )
    }

    /// Resolves `query` to one canonical product URL.
    ///
    /// # Errors
    ///
    /// - [`MatchError::Fetch`] when the search request fails
    /// - [`MatchError::NoCandidates`] when the search yields nothing
    #[instrument(skip(self), fields(target_set = ?target_set))]
    pub async fn resolve(&self, query: &str, target_set: Option<&str>) -> Result<String, MatchError> {
        let page = self.source.get(&self.search_url(query)).await?;

        if self.is_detail_url(&page.url) {
            debug!(url = %page.url, "search redirected to detail page");
            return Ok(canonicalize_url(&page.url));
        }

        let base = Url::parse(&page.url).unwrap_or_else(|_| self.base_url.clone());
        let candidates = parse_candidates(&page.body, &base);
        debug!(count = candidates.len(), "search candidates");

        let target = target_set
            .map(clean_set_label)
            .filter(|label| !label.is_empty());
        select_candidate(&candidates, target)
            .map(|candidate| canonicalize_url(&candidate.detail_url))
            .ok_or_else(|| MatchError::NoCandidates {
                query: query.to_string(),
            })
    }

    /// Resolves a catalog item from its display name, serial number and set name.
    ///
    /// # Errors
    ///
    /// Same as [`Matcher::resolve`].
    pub async fn resolve_item(
        &self,
        name: &str,
        number: Option<&str>,
        set_name: Option<&str>,
    ) -> Result<String, MatchError> {
        let query = build_query(name, number);
        self.resolve(&query, set_name).await
    }
}
