//! Error types for product matching.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors from resolving a query to a product URL.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The search returned neither a redirect nor any candidate row.
    #[error(
        "no product found for query '{query}'\n  Suggestion: Check the item name and number, or set its source URL directly"
    )]
    NoCandidates {
        /// The search query that was issued.
        query: String,
    },

    /// The configured base URL cannot be used to build a search URL.
    #[error("invalid source base URL: {url}")]
    InvalidBaseUrl {
        /// The rejected base URL.
        url: String,
    },

    /// The search request itself failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
